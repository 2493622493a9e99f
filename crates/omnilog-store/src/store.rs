use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use thiserror::Error;

use omnilog_types::{
    now_timestamp, KnownHost, LogRecord, NewRecord, MARKER_SOURCE, UNKNOWN_SOURCE,
};

use crate::pool::ConnectionPool;

/// Storage-layer failure. Callers decide whether to absorb it (datagram
/// ingestion) or surface it (queries, marker creation).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Totals reported alongside the record tables.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StoreStats {
    pub total_entries: i64,
    pub known_hosts: i64,
    pub latest_id: i64,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS log_entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    received_at TEXT NOT NULL,
    source_ip TEXT NOT NULL,
    source_port INTEGER,
    hostname TEXT,
    app_name TEXT,
    proc_id TEXT,
    msg_id TEXT,
    facility INTEGER,
    severity INTEGER,
    priority INTEGER,
    message TEXT NOT NULL,
    raw_message TEXT NOT NULL,
    is_syslog INTEGER NOT NULL DEFAULT 0,
    is_marker INTEGER NOT NULL DEFAULT 0,
    marker_style TEXT
);

CREATE INDEX IF NOT EXISTS idx_timestamp ON log_entries(timestamp);
CREATE INDEX IF NOT EXISTS idx_received_at ON log_entries(received_at);
CREATE INDEX IF NOT EXISTS idx_source_ip ON log_entries(source_ip);
CREATE INDEX IF NOT EXISTS idx_hostname ON log_entries(hostname);
CREATE INDEX IF NOT EXISTS idx_severity ON log_entries(severity);
CREATE INDEX IF NOT EXISTS idx_is_marker ON log_entries(is_marker);

CREATE TABLE IF NOT EXISTS known_hosts (
    ip TEXT PRIMARY KEY,
    hostname TEXT,
    display_name TEXT,
    first_seen TEXT NOT NULL,
    last_seen TEXT NOT NULL,
    message_count INTEGER DEFAULT 0
);
"#;

pub(crate) const RECORD_COLUMNS: &str = "id, timestamp, received_at, source_ip, source_port, \
     hostname, app_name, proc_id, msg_id, facility, severity, priority, \
     message, raw_message, is_syslog, is_marker, marker_style";

/// SQLite-backed log store.
///
/// All inserts serialize through one writer connection; each insert and its
/// host-summary update commit as a single transaction, so a caller that
/// receives an id can rely on the record being durable. Reads go through a
/// connection pool and see committed snapshots (WAL).
pub struct LogStore {
    writer: Mutex<Connection>,
    readers: ConnectionPool,
}

impl LogStore {
    /// Open or create the store at the given path and run schema setup.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(5000))?;
        // WAL keeps readers unblocked while the writer commits
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(SCHEMA)?;
        tracing::info!(path = %path.display(), "log store opened");
        Ok(Self {
            writer: Mutex::new(conn),
            readers: ConnectionPool::new(path),
        })
    }

    /// Persist a record, updating the host summary for its source in the same
    /// transaction. Assigns `received_at` and returns the assigned id.
    pub fn insert(&self, rec: &NewRecord) -> Result<i64, StoreError> {
        let received_at = now_timestamp();
        let mut conn = self.writer.lock();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO log_entries
                 (timestamp, received_at, source_ip, source_port, hostname,
                  app_name, proc_id, msg_id, facility, severity, priority,
                  message, raw_message, is_syslog, is_marker, marker_style)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                rec.timestamp,
                received_at,
                rec.source_ip,
                rec.source_port,
                rec.hostname,
                rec.app_name,
                rec.proc_id,
                rec.msg_id,
                rec.facility,
                rec.severity,
                rec.priority,
                rec.message,
                rec.raw_message,
                rec.is_syslog,
                rec.is_marker,
                rec.marker_style,
            ],
        )?;
        let id = tx.last_insert_rowid();

        if rec.source_ip != MARKER_SOURCE && rec.source_ip != UNKNOWN_SOURCE {
            tx.execute(
                "INSERT INTO known_hosts (ip, hostname, display_name, first_seen, last_seen, message_count)
                 VALUES (?1, ?2, ?2, ?3, ?3, 1)
                 ON CONFLICT(ip) DO UPDATE SET
                     hostname = COALESCE(excluded.hostname, known_hosts.hostname),
                     last_seen = excluded.last_seen,
                     message_count = known_hosts.message_count + 1",
                params![rec.source_ip, rec.hostname, received_at],
            )?;
        }

        tx.commit()?;
        Ok(id)
    }

    /// Build and persist a user-inserted annotation record.
    pub fn insert_marker(
        &self,
        label: &str,
        timestamp: Option<&str>,
        style: &str,
    ) -> Result<i64, StoreError> {
        self.insert(&NewRecord::marker(
            label,
            timestamp.map(str::to_string),
            style,
        ))
    }

    /// Fetch a single record by id.
    pub fn record(&self, id: i64) -> Result<Option<LogRecord>, StoreError> {
        let conn = self.readers.get()?;
        let sql = format!("SELECT {RECORD_COLUMNS} FROM log_entries WHERE id = ?1");
        let rec = conn
            .query_row(&sql, params![id], map_record)
            .optional()?;
        Ok(rec)
    }

    /// All known hosts, most recently seen first.
    pub fn known_hosts(&self) -> Result<Vec<KnownHost>, StoreError> {
        let conn = self.readers.get()?;
        let mut stmt = conn.prepare(
            "SELECT ip, hostname, display_name, first_seen, last_seen, message_count
             FROM known_hosts ORDER BY last_seen DESC",
        )?;
        let hosts = stmt
            .query_map([], |row| {
                Ok(KnownHost {
                    ip: row.get(0)?,
                    hostname: row.get(1)?,
                    display_name: row.get(2)?,
                    first_seen: row.get(3)?,
                    last_seen: row.get(4)?,
                    message_count: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(hosts)
    }

    /// Set the user-editable display name for a host.
    pub fn set_display_name(&self, ip: &str, name: &str) -> Result<(), StoreError> {
        let conn = self.writer.lock();
        conn.execute(
            "UPDATE known_hosts SET display_name = ?1 WHERE ip = ?2",
            params![name, ip],
        )?;
        Ok(())
    }

    /// Highest assigned record id, 0 when the store is empty.
    pub fn latest_id(&self) -> Result<i64, StoreError> {
        let conn = self.readers.get()?;
        let id = conn.query_row(
            "SELECT COALESCE(MAX(id), 0) FROM log_entries",
            [],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Records with id strictly greater than `after_id`, ascending.
    pub fn entries_after(&self, after_id: i64, limit: u32) -> Result<Vec<LogRecord>, StoreError> {
        let conn = self.readers.get()?;
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM log_entries WHERE id > ?1 ORDER BY id ASC LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![after_id, limit], map_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Aggregate totals for operational visibility.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.readers.get()?;
        let total_entries =
            conn.query_row("SELECT COUNT(*) FROM log_entries", [], |row| row.get(0))?;
        let known_hosts =
            conn.query_row("SELECT COUNT(*) FROM known_hosts", [], |row| row.get(0))?;
        let latest_id = conn.query_row(
            "SELECT COALESCE(MAX(id), 0) FROM log_entries",
            [],
            |row| row.get(0),
        )?;
        Ok(StoreStats {
            total_entries,
            known_hosts,
            latest_id,
        })
    }

    pub(crate) fn reader(&self) -> Result<crate::pool::PooledConnection<'_>, StoreError> {
        self.readers.get()
    }
}

pub(crate) fn map_record(row: &Row<'_>) -> rusqlite::Result<LogRecord> {
    Ok(LogRecord {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        received_at: row.get(2)?,
        source_ip: row.get(3)?,
        source_port: row.get(4)?,
        hostname: row.get(5)?,
        app_name: row.get(6)?,
        proc_id: row.get(7)?,
        msg_id: row.get(8)?,
        facility: row.get(9)?,
        severity: row.get(10)?,
        priority: row.get(11)?,
        message: row.get(12)?,
        raw_message: row.get(13)?,
        is_syslog: row.get(14)?,
        is_marker: row.get(15)?,
        marker_style: row.get(16)?,
    })
}
