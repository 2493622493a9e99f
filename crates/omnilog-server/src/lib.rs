//! UDP ingestion, routing, and live fan-out for omnilog
//!
//! This crate wires the pipeline together: the UDP receive loop hands
//! datagrams to the ingestion router, which normalizes, persists, and then
//! publishes each record to live subscribers through the distribution hub.

mod config;
mod hub;
mod router;
mod udp;

pub use config::ServerConfig;
pub use hub::{LiveRecord, RecordHub, Subscription};
pub use router::{IngestError, IngestRouter};
pub use udp::UdpReceiver;
