use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;

use omnilog_store::{LogStore, StoreError};
use omnilog_syslog::normalize;

use crate::hub::RecordHub;

/// Failure surfaced by a direct request through the router (marker creation).
///
/// Datagram ingestion never returns these: storage trouble there is logged and
/// the message dropped, so one bad datagram cannot halt the pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Storage(#[from] StoreError),
    #[error("storage task failed: {0}")]
    TaskJoin(String),
}

/// Routes incoming datagrams through normalize → persist → publish.
pub struct IngestRouter {
    store: Arc<LogStore>,
    hub: Arc<RecordHub>,
    processed: AtomicU64,
}

impl IngestRouter {
    pub fn new(store: Arc<LogStore>, hub: Arc<RecordHub>) -> Self {
        Self {
            store,
            hub,
            processed: AtomicU64::new(0),
        }
    }

    /// Handle one datagram end to end. Failures are contained: the next
    /// message is unaffected.
    pub async fn ingest(&self, data: &[u8], addr: SocketAddr) {
        let source_ip = addr.ip().to_string();
        let rec = normalize(data, &source_ip, addr.port());

        let store = Arc::clone(&self.store);
        let stored = tokio::task::spawn_blocking(move || {
            let id = store.insert(&rec)?;
            store.record(id)
        })
        .await;

        match stored {
            Ok(Ok(Some(record))) => {
                self.hub.publish(&record);
                let n = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
                if n % 1000 == 0 {
                    tracing::info!(processed = n, "message throughput checkpoint");
                }
            }
            Ok(Ok(None)) => {
                tracing::warn!(source = %addr, "inserted record vanished before publish");
            }
            Ok(Err(err)) => {
                tracing::error!(source = %addr, error = %err, "storage failure, message dropped");
            }
            Err(err) => {
                tracing::error!(source = %addr, error = %err, "storage task failed, message dropped");
            }
        }
    }

    /// Create an annotation record and publish it to live subscribers.
    ///
    /// Unlike datagram ingestion this propagates storage failures: the caller
    /// asked for the write and must be told when it did not happen.
    pub async fn create_marker(
        &self,
        label: &str,
        timestamp: Option<&str>,
        style: &str,
    ) -> Result<i64, IngestError> {
        let store = Arc::clone(&self.store);
        let label = label.to_string();
        let timestamp = timestamp.map(str::to_string);
        let style = style.to_string();

        let stored = tokio::task::spawn_blocking(move || {
            let id = store.insert_marker(&label, timestamp.as_deref(), &style)?;
            Ok::<_, StoreError>((id, store.record(id)?))
        })
        .await
        .map_err(|err| IngestError::TaskJoin(err.to_string()))??;

        let (id, record) = stored;
        if let Some(record) = record {
            self.hub.publish(&record);
        }
        Ok(id)
    }

    /// Number of datagrams processed successfully since startup.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }
}
