use rusqlite::params_from_iter;
use rusqlite::types::Value;

use omnilog_types::{LogFilter, LogRecord};

use crate::store::{map_record, LogStore, StoreError, RECORD_COLUMNS};

/// Build the WHERE clause shared by `query` and `count`, so the total
/// reported alongside a page always agrees with what paging enumerates.
fn where_clause(filter: &LogFilter) -> (String, Vec<Value>) {
    let mut conds: Vec<&'static str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(ip) = &filter.source_ip {
        conds.push("source_ip = ?");
        values.push(ip.clone().into());
    }
    if let Some(host) = &filter.hostname {
        // A display-name match pulls in every record from that IP
        conds.push(
            "(hostname LIKE ? OR source_ip IN \
             (SELECT ip FROM known_hosts WHERE display_name LIKE ?))",
        );
        let pattern = format!("%{host}%");
        values.push(pattern.clone().into());
        values.push(pattern.into());
    }
    if let Some(severity) = filter.severity {
        // "At least this urgent"; NULL severities (non-syslog) never match
        conds.push("severity <= ?");
        values.push(Value::from(i64::from(severity.min(7))));
    }
    if let Some(search) = &filter.search {
        conds.push("message LIKE ?");
        values.push(format!("%{search}%").into());
    }
    if let Some(start) = &filter.start_time {
        conds.push("timestamp >= ?");
        values.push(start.clone().into());
    }
    if let Some(end) = &filter.end_time {
        conds.push("timestamp <= ?");
        values.push(end.clone().into());
    }
    if !filter.include_markers {
        conds.push("is_marker = 0");
    }

    let where_sql = if conds.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conds.join(" AND "))
    };
    (where_sql, values)
}

impl LogStore {
    /// Run a filtered, sorted, paginated query.
    ///
    /// Sort column and direction come from a fixed allow-list (enforced by the
    /// filter types); ties in the sort key break by `id` in the same
    /// direction, so pagination over a static dataset is a stable partition.
    pub fn query(&self, filter: &LogFilter) -> Result<Vec<LogRecord>, StoreError> {
        let (where_sql, mut values) = where_clause(filter);
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM log_entries {where_sql} \
             ORDER BY {col} {dir}, id {dir} LIMIT ? OFFSET ?",
            col = filter.sort_by.as_str(),
            dir = filter.sort_order.as_str(),
        );
        values.push(Value::from(i64::from(filter.limit)));
        values.push(Value::from(i64::from(filter.offset)));

        let conn = self.reader()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), map_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Count the records matching a filter, ignoring its pagination.
    pub fn count(&self, filter: &LogFilter) -> Result<i64, StoreError> {
        let (where_sql, values) = where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM log_entries {where_sql}");

        let conn = self.reader()?;
        let n = conn.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(n)
    }
}
