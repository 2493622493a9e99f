//! Durable log store and query engine for omnilog
//!
//! SQLite-backed append-only record table plus a derived host-summary table.
//! One writer connection serializes all inserts; readers check connections out
//! of a pool and never block behind the writer (WAL journal mode).

mod pool;
mod query;
mod store;

pub use store::{LogStore, StoreError, StoreStats};

// Re-export types used in our public API
pub use omnilog_types::{KnownHost, LogFilter, LogRecord, NewRecord};
