//! Syslog message normalizer for omnilog
//!
//! Turns raw UDP datagrams into structured [`NewRecord`]s. Handles RFC 5424,
//! RFC 3164 (BSD), bare `<PRI>` messages, and plain text from non-syslog
//! sources.

mod normalizer;

pub use normalizer::{normalize, normalize_at};

// Re-export the record type produced by normalization
pub use omnilog_types::NewRecord;
