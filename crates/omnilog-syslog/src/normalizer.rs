use chrono::{DateTime, Datelike, Duration, NaiveDateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use omnilog_types::NewRecord;

/// RFC 5424: `<PRI>VERSION TIMESTAMP HOST APP PROCID MSGID [SD|-] MESSAGE`
static RFC5424: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^<(\d{1,3})>(\d+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(?:\[.*?\]|-)\s*(.*)$",
    )
    .expect("RFC 5424 pattern must compile")
});

/// RFC 3164: `<PRI>MMM DD HH:MM:SS HOSTNAME REST`
static RFC3164: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<(\d{1,3})>(\w{3}\s+\d{1,2}\s+\d{2}:\d{2}:\d{2})\s+(\S+)\s+(.*)$")
        .expect("RFC 3164 pattern must compile")
});

/// RFC 3164 content sub-parse: `APP[PID]: MESSAGE`
static APP_PID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(\S+?)(?:\[(\d+)\])?:\s*(.*)$").expect("app/pid pattern must compile")
});

/// Bare priority: `<PRI>TEXT`
static BARE_PRI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<(\d{1,3})>(.*)$").expect("bare priority pattern must compile"));

/// Largest valid PRI value (facility 23, severity 7).
const MAX_PRI: u16 = 191;

/// Normalize an incoming datagram into a [`NewRecord`].
///
/// Tries syslog grammars in order of specificity and falls back to treating
/// the payload as plain text. Never fails: every input yields a record.
pub fn normalize(data: &[u8], source_ip: &str, source_port: u16) -> NewRecord {
    normalize_at(data, source_ip, source_port, Utc::now())
}

/// [`normalize`] with an explicit reference clock, for receive-time-dependent
/// fields (missing timestamps, RFC 3164 year re-derivation).
pub fn normalize_at(
    data: &[u8],
    source_ip: &str,
    source_port: u16,
    now: DateTime<Utc>,
) -> NewRecord {
    let text = decode_text(data);
    let text = text.trim().to_string();
    let text = if text.is_empty() {
        "(empty message)".to_string()
    } else {
        text
    };

    let now_str = now.to_rfc3339_opts(SecondsFormat::Micros, true);
    let mut rec = NewRecord::raw(text.clone(), source_ip, source_port, now_str.clone());

    // Most specific grammar first
    if try_rfc5424(&text, &mut rec, &now_str) {
        return rec;
    }
    if try_rfc3164(&text, &mut rec, now) {
        return rec;
    }
    if try_bare_priority(&text, &mut rec) {
        return rec;
    }

    rec
}

/// Decode as UTF-8, falling back to a permissive single-byte decode so that
/// no input is ever rejected.
fn decode_text(data: &[u8]) -> String {
    match std::str::from_utf8(data) {
        Ok(s) => s.to_string(),
        // Latin-1: every byte maps directly to the same Unicode scalar
        Err(_) => data.iter().map(|&b| b as char).collect(),
    }
}

fn decode_priority(pri: u16) -> (u8, u8) {
    ((pri >> 3) as u8, (pri & 0x07) as u8)
}

fn try_rfc5424(text: &str, rec: &mut NewRecord, now_str: &str) -> bool {
    let Some(caps) = RFC5424.captures(text) else {
        return false;
    };
    let Some(pri) = parse_pri(&caps[1]) else {
        return false;
    };
    let (facility, severity) = decode_priority(pri);

    let ts = &caps[3];
    rec.timestamp = if ts != "-" {
        // ISO 8601 with a trailing Z; normalize to an explicit offset
        ts.replace('Z', "+00:00")
    } else {
        now_str.to_string()
    };

    rec.is_syslog = true;
    rec.priority = Some(pri as u8);
    rec.facility = Some(facility);
    rec.severity = Some(severity);
    rec.hostname = dash_to_none(&caps[4]);
    rec.app_name = dash_to_none(&caps[5]);
    rec.proc_id = dash_to_none(&caps[6]);
    rec.msg_id = dash_to_none(&caps[7]);
    rec.message = caps[8].to_string();
    true
}

fn try_rfc3164(text: &str, rec: &mut NewRecord, now: DateTime<Utc>) -> bool {
    let Some(caps) = RFC3164.captures(text) else {
        return false;
    };
    let Some(pri) = parse_pri(&caps[1]) else {
        return false;
    };
    let (facility, severity) = decode_priority(pri);

    if let Some(ts) = parse_rfc3164_timestamp(&caps[2], now) {
        rec.timestamp = ts;
    }

    rec.is_syslog = true;
    rec.priority = Some(pri as u8);
    rec.facility = Some(facility);
    rec.severity = Some(severity);
    rec.hostname = Some(caps[3].to_string());

    // REST is either `APP[PID]: MESSAGE` or just the message
    let rest = &caps[4];
    match APP_PID.captures(rest) {
        Some(app) => {
            rec.app_name = Some(app[1].to_string());
            rec.proc_id = app.get(2).map(|m| m.as_str().to_string());
            rec.message = app[3].to_string();
        }
        None => {
            rec.message = rest.to_string();
        }
    }
    true
}

fn try_bare_priority(text: &str, rec: &mut NewRecord) -> bool {
    let Some(caps) = BARE_PRI.captures(text) else {
        return false;
    };
    // Out-of-range values are unrelated bracketed text, not syslog
    let Some(pri) = parse_pri(&caps[1]) else {
        return false;
    };
    let (facility, severity) = decode_priority(pri);

    let message = caps[2].trim();
    rec.is_syslog = true;
    rec.priority = Some(pri as u8);
    rec.facility = Some(facility);
    rec.severity = Some(severity);
    rec.message = if message.is_empty() {
        "(empty)".to_string()
    } else {
        message.to_string()
    };
    true
}

fn parse_pri(digits: &str) -> Option<u16> {
    let pri: u16 = digits.parse().ok()?;
    (pri <= MAX_PRI).then_some(pri)
}

fn dash_to_none(field: &str) -> Option<String> {
    if field == "-" {
        None
    } else {
        Some(field.to_string())
    }
}

/// Parse an RFC 3164 timestamp (`Oct 11 22:14:15`) into ISO-8601, assuming the
/// current year. A result more than one day in the future belongs to the
/// previous year (year-boundary wraparound without an explicit year field).
fn parse_rfc3164_timestamp(ts_str: &str, now: DateTime<Utc>) -> Option<String> {
    let parts: Vec<&str> = ts_str.split_whitespace().collect();
    if parts.len() != 3 {
        return None;
    }

    let with_year = |year: i32| -> Option<DateTime<Utc>> {
        let composed = format!("{year} {} {} {}", parts[0], parts[1], parts[2]);
        NaiveDateTime::parse_from_str(&composed, "%Y %b %d %H:%M:%S")
            .ok()
            .map(|dt| dt.and_utc())
    };

    let mut parsed = with_year(now.year())?;
    if parsed > now && parsed - now > Duration::days(1) {
        parsed = with_year(now.year() - 1)?;
    }
    Some(parsed.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn parse(text: &str) -> NewRecord {
        normalize_at(text.as_bytes(), "10.0.0.5", 9001, fixed_now())
    }

    #[test]
    fn test_rfc5424_full_message() {
        let entry = parse(
            "<165>1 2003-10-11T22:14:15.003Z mymachine.example.com evntslog 1234 ID47 \
             [exampleSDID@32473 iut=\"3\"] An application event",
        );
        assert!(entry.is_syslog);
        assert_eq!(entry.priority, Some(165));
        assert_eq!(entry.facility, Some(20));
        assert_eq!(entry.severity, Some(5));
        assert_eq!(entry.hostname.as_deref(), Some("mymachine.example.com"));
        assert_eq!(entry.app_name.as_deref(), Some("evntslog"));
        assert_eq!(entry.proc_id.as_deref(), Some("1234"));
        assert_eq!(entry.msg_id.as_deref(), Some("ID47"));
        assert_eq!(entry.message, "An application event");
        assert_eq!(entry.timestamp, "2003-10-11T22:14:15.003+00:00");
    }

    #[test]
    fn test_rfc5424_dash_fields_absent() {
        let entry = parse("<34>1 - - - - - - hello");
        assert!(entry.is_syslog);
        assert_eq!(entry.hostname, None);
        assert_eq!(entry.app_name, None);
        assert_eq!(entry.proc_id, None);
        assert_eq!(entry.msg_id, None);
        assert_eq!(entry.message, "hello");
        // Missing timestamp falls back to receive time
        assert!(entry.timestamp.starts_with("2024-06-15T12:00:00"));
    }

    #[test]
    fn test_rfc5424_priority_decomposition() {
        for pri in [0u16, 7, 34, 165, 191] {
            let entry = parse(&format!("<{pri}>1 - host app - - - msg"));
            assert!(entry.is_syslog);
            assert_eq!(entry.facility, Some((pri >> 3) as u8), "pri {pri}");
            assert_eq!(entry.severity, Some((pri & 7) as u8), "pri {pri}");
        }
    }

    #[test]
    fn test_rfc3164_su_example() {
        let entry = parse("<34>Oct 11 22:14:15 mymachine su: 'su root' failed");
        assert!(entry.is_syslog);
        assert_eq!(entry.priority, Some(34));
        assert_eq!(entry.facility, Some(4));
        assert_eq!(entry.severity, Some(2));
        assert_eq!(entry.hostname.as_deref(), Some("mymachine"));
        assert_eq!(entry.app_name.as_deref(), Some("su"));
        assert_eq!(entry.proc_id, None);
        assert_eq!(entry.message, "'su root' failed");
    }

    #[test]
    fn test_rfc3164_app_with_pid() {
        let entry = parse("<13>Feb  5 17:32:18 webhost nginx[4321]: request handled");
        assert_eq!(entry.app_name.as_deref(), Some("nginx"));
        assert_eq!(entry.proc_id.as_deref(), Some("4321"));
        assert_eq!(entry.message, "request handled");
        assert!(entry.timestamp.starts_with("2024-02-05T17:32:18"));
    }

    #[test]
    fn test_rfc3164_rest_without_app() {
        let entry = parse("<13>Oct 11 22:14:15 host message with no app header");
        assert!(entry.is_syslog);
        assert_eq!(entry.app_name, None);
        assert_eq!(entry.message, "message with no app header");
    }

    #[test]
    fn test_rfc3164_year_wraparound() {
        // Reference clock in mid-June; December dates can only be last year
        let entry = parse("<13>Dec 30 23:59:59 host late message");
        assert!(entry.timestamp.starts_with("2023-12-30T23:59:59"));
    }

    #[test]
    fn test_rfc3164_near_future_keeps_current_year() {
        // Less than a day ahead of the reference clock: clock skew, not wraparound
        let entry = parse("<13>Jun 16 08:00:00 host slightly ahead");
        assert!(entry.timestamp.starts_with("2024-06-16T08:00:00"));
    }

    #[test]
    fn test_bare_priority() {
        let entry = parse("<7>debug text");
        assert!(entry.is_syslog);
        assert_eq!(entry.facility, Some(0));
        assert_eq!(entry.severity, Some(7));
        assert_eq!(entry.message, "debug text");
    }

    #[test]
    fn test_bare_priority_empty_message() {
        let entry = parse("<5>");
        assert!(entry.is_syslog);
        assert_eq!(entry.message, "(empty)");
    }

    #[test]
    fn test_priority_out_of_range_is_not_syslog() {
        for text in ["<192>too big", "<999>way too big"] {
            let entry = parse(text);
            assert!(!entry.is_syslog, "{text}");
            assert_eq!(entry.severity, None);
            assert_eq!(entry.message, text);
        }
    }

    #[test]
    fn test_raw_text_fallback() {
        let entry = parse("hello");
        assert!(!entry.is_syslog);
        assert_eq!(entry.message, "hello");
        assert_eq!(entry.raw_message, "hello");
        assert_eq!(entry.source_ip, "10.0.0.5");
        assert_eq!(entry.source_port, Some(9001));
        assert_eq!(entry.facility, None);
        assert_eq!(entry.severity, None);
        assert_eq!(entry.priority, None);
    }

    #[test]
    fn test_empty_input_placeholder() {
        let entry = parse("");
        assert!(!entry.is_syslog);
        assert_eq!(entry.message, "(empty message)");
        assert_eq!(entry.raw_message, "(empty message)");
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        let entry = parse("  hello world \n");
        assert_eq!(entry.raw_message, "hello world");
    }

    #[test]
    fn test_invalid_utf8_decoded_permissively() {
        // 0xC3 followed by '(' is not valid UTF-8
        let entry = normalize_at(&[0xC3, 0x28, b'o', b'k'], "10.0.0.5", 9001, fixed_now());
        assert!(!entry.is_syslog);
        assert!(entry.raw_message.ends_with("ok"));
    }

    #[test]
    fn test_normalization_is_deterministic() {
        let data = b"<34>Oct 11 22:14:15 mymachine su: 'su root' failed";
        let a = normalize_at(data, "10.0.0.5", 9001, fixed_now());
        let b = normalize_at(data, "10.0.0.5", 9001, fixed_now());
        assert_eq!(a, b);
    }
}
