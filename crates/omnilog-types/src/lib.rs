//! Shared types for omnilog
//!
//! This crate contains the data structures used across the ingestion,
//! storage, and distribution crates.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Well-Known Source Values
// ============================================================================

/// Source IP used for user-inserted annotation records.
pub const MARKER_SOURCE: &str = "marker";

/// Source IP used when address resolution fails.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Hostname stored on marker records.
pub const MARKER_HOSTNAME: &str = "MARKER";

/// Prefix prepended to a marker label to form its raw message.
pub const MARKER_PREFIX: &str = "[MARKER] ";

/// Current wall-clock time as a stored timestamp string.
///
/// All timestamps in the pipeline are ISO-8601 UTC strings, so range filters
/// can compare them lexicographically.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ============================================================================
// Facility / Severity Names
// ============================================================================

/// Human-readable name for a syslog facility code.
///
/// Codes outside the standard 0..=23 table render as `unknown(<code>)`.
pub fn facility_name(code: u8) -> String {
    let name = match code {
        0 => "kern",
        1 => "user",
        2 => "mail",
        3 => "daemon",
        4 => "auth",
        5 => "syslog",
        6 => "lpr",
        7 => "news",
        8 => "uucp",
        9 => "cron",
        10 => "authpriv",
        11 => "ftp",
        12 => "ntp",
        13 => "security",
        14 => "console",
        15 => "solaris-cron",
        16 => "local0",
        17 => "local1",
        18 => "local2",
        19 => "local3",
        20 => "local4",
        21 => "local5",
        22 => "local6",
        23 => "local7",
        _ => return format!("unknown({code})"),
    };
    name.to_string()
}

/// Human-readable name for a syslog severity code.
pub fn severity_name(code: u8) -> String {
    let name = match code {
        0 => "Emergency",
        1 => "Alert",
        2 => "Critical",
        3 => "Error",
        4 => "Warning",
        5 => "Notice",
        6 => "Informational",
        7 => "Debug",
        _ => return format!("unknown({code})"),
    };
    name.to_string()
}

// ============================================================================
// Log Records
// ============================================================================

/// A normalized message that has not yet been persisted.
///
/// The store assigns `id` and `received_at` at insert time; everything else is
/// populated by the normalizer (or by the marker constructor).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewRecord {
    /// Event time claimed by the source, ISO-8601.
    pub timestamp: String,
    /// Network origin of the datagram.
    pub source_ip: String,
    pub source_port: Option<u16>,
    /// Structured fields, present only when the message parsed as syslog.
    pub hostname: Option<String>,
    pub app_name: Option<String>,
    pub proc_id: Option<String>,
    pub msg_id: Option<String>,
    pub facility: Option<u8>,
    pub severity: Option<u8>,
    pub priority: Option<u8>,
    /// Payload after syslog-header stripping.
    pub message: String,
    /// The untouched original text.
    pub raw_message: String,
    /// True iff any syslog grammar matched.
    pub is_syslog: bool,
    pub is_marker: bool,
    pub marker_style: Option<String>,
}

impl NewRecord {
    /// A plain-text record with no syslog structure.
    pub fn raw(text: String, source_ip: &str, source_port: u16, timestamp: String) -> Self {
        Self {
            timestamp,
            source_ip: source_ip.to_string(),
            source_port: Some(source_port),
            hostname: None,
            app_name: None,
            proc_id: None,
            msg_id: None,
            facility: None,
            severity: None,
            priority: None,
            message: text.clone(),
            raw_message: text,
            is_syslog: false,
            is_marker: false,
            marker_style: None,
        }
    }

    /// A user-inserted annotation record.
    pub fn marker(label: &str, timestamp: Option<String>, style: &str) -> Self {
        Self {
            timestamp: timestamp.unwrap_or_else(now_timestamp),
            source_ip: MARKER_SOURCE.to_string(),
            source_port: None,
            hostname: Some(MARKER_HOSTNAME.to_string()),
            app_name: None,
            proc_id: None,
            msg_id: None,
            facility: None,
            severity: None,
            priority: None,
            message: label.to_string(),
            raw_message: format!("{MARKER_PREFIX}{label}"),
            is_syslog: false,
            is_marker: true,
            marker_style: Some(style.to_string()),
        }
    }
}

/// A stored log record.
///
/// `id` is assigned by the store, monotonically increasing and never reused.
/// `received_at` is always store-assigned, never client-supplied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: i64,
    pub timestamp: String,
    pub received_at: String,
    pub source_ip: String,
    pub source_port: Option<u16>,
    pub hostname: Option<String>,
    pub app_name: Option<String>,
    pub proc_id: Option<String>,
    pub msg_id: Option<String>,
    pub facility: Option<u8>,
    pub severity: Option<u8>,
    pub priority: Option<u8>,
    pub message: String,
    pub raw_message: String,
    pub is_syslog: bool,
    pub is_marker: bool,
    pub marker_style: Option<String>,
}

// ============================================================================
// Known Hosts
// ============================================================================

/// Derived aggregate: one row per distinct non-marker source IP ever seen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KnownHost {
    pub ip: String,
    /// Last non-null hostname seen from this IP.
    pub hostname: Option<String>,
    /// User-editable override, defaults to the hostname.
    pub display_name: Option<String>,
    pub first_seen: String,
    pub last_seen: String,
    pub message_count: i64,
}

// ============================================================================
// Query Filter
// ============================================================================

/// Column a query may be sorted by.
///
/// Parsing falls back to [`SortKey::ReceivedAt`] on unrecognized input so
/// malformed client parameters degrade instead of erroring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    ReceivedAt,
    Timestamp,
    Severity,
    SourceIp,
    Hostname,
}

impl SortKey {
    pub fn parse(s: &str) -> Self {
        match s {
            "received_at" => Self::ReceivedAt,
            "timestamp" => Self::Timestamp,
            "severity" => Self::Severity,
            "source_ip" => Self::SourceIp,
            "hostname" => Self::Hostname,
            _ => Self::ReceivedAt,
        }
    }

    /// Column name in the store's schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReceivedAt => "received_at",
            Self::Timestamp => "timestamp",
            Self::Severity => "severity",
            Self::SourceIp => "source_ip",
            Self::Hostname => "hostname",
        }
    }
}

/// Sort direction; parsing falls back to descending.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Self::Asc,
            "DESC" => Self::Desc,
            _ => Self::Desc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Filter, sort, and pagination parameters shared by queries and counts.
#[derive(Clone, Debug, PartialEq)]
pub struct LogFilter {
    /// Exact source IP match.
    pub source_ip: Option<String>,
    /// Substring match against the record hostname or the known-host
    /// display name for that IP.
    pub hostname: Option<String>,
    /// Inclusive upper bound: records at least this urgent (severity <= n).
    pub severity: Option<u8>,
    /// Substring match against the message payload.
    pub search: Option<String>,
    /// Inclusive timestamp bounds, ISO-8601 strings.
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub include_markers: bool,
    pub sort_by: SortKey,
    pub sort_order: SortDir,
    pub limit: u32,
    pub offset: u32,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            source_ip: None,
            hostname: None,
            severity: None,
            search: None,
            start_time: None,
            end_time: None,
            include_markers: true,
            sort_by: SortKey::default(),
            sort_order: SortDir::default(),
            limit: 200,
            offset: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facility_names() {
        assert_eq!(facility_name(0), "kern");
        assert_eq!(facility_name(4), "auth");
        assert_eq!(facility_name(23), "local7");
        assert_eq!(facility_name(99), "unknown(99)");
    }

    #[test]
    fn test_severity_names() {
        assert_eq!(severity_name(0), "Emergency");
        assert_eq!(severity_name(2), "Critical");
        assert_eq!(severity_name(7), "Debug");
        assert_eq!(severity_name(42), "unknown(42)");
    }

    #[test]
    fn test_sort_key_fallback() {
        assert_eq!(SortKey::parse("severity"), SortKey::Severity);
        assert_eq!(SortKey::parse("id; DROP TABLE"), SortKey::ReceivedAt);
        assert_eq!(SortDir::parse("asc"), SortDir::Asc);
        assert_eq!(SortDir::parse("sideways"), SortDir::Desc);
    }

    #[test]
    fn test_marker_record_shape() {
        let rec = NewRecord::marker("deploy v2", None, "default");
        assert_eq!(rec.source_ip, MARKER_SOURCE);
        assert_eq!(rec.hostname.as_deref(), Some(MARKER_HOSTNAME));
        assert_eq!(rec.raw_message, "[MARKER] deploy v2");
        assert_eq!(rec.message, "deploy v2");
        assert!(rec.is_marker);
        assert!(!rec.is_syslog);
    }

    #[test]
    fn test_filter_defaults() {
        let f = LogFilter::default();
        assert!(f.include_markers);
        assert_eq!(f.limit, 200);
        assert_eq!(f.sort_by, SortKey::ReceivedAt);
        assert_eq!(f.sort_order, SortDir::Desc);
    }
}
