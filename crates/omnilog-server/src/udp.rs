use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use crate::router::IngestRouter;

/// Largest datagram we accept (UDP payload limit).
const MAX_DATAGRAM: usize = 65_536;

/// Asynchronous UDP receive loop.
///
/// One datagram equals one candidate message. Each datagram is handed to the
/// router and fully processed before the next receive, so cancelling the loop
/// drains in-flight work before returning.
pub struct UdpReceiver {
    socket: UdpSocket,
}

impl UdpReceiver {
    /// Bind the listening socket.
    pub async fn bind(addr: &str) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket })
    }

    /// The bound local address (useful when binding port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive datagrams until the token is cancelled.
    pub async fn run(self, router: Arc<IngestRouter>, cancel: CancellationToken) {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        tracing::info!(addr = ?self.socket.local_addr().ok(), "udp receiver listening");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,

                result = self.socket.recv_from(&mut buf) => match result {
                    Ok((len, addr)) => {
                        router.ingest(&buf[..len], addr).await;
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "udp receive error");
                    }
                },
            }
        }

        tracing::info!(processed = router.processed(), "udp receiver stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::RecordHub;
    use omnilog_store::LogStore;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_datagram_flows_to_store_and_subscribers() {
        let tmp = TempDir::new().expect("tempdir");
        let store = Arc::new(LogStore::open(&tmp.path().join("logs.db")).expect("open store"));
        let hub = Arc::new(RecordHub::new());
        let router = Arc::new(IngestRouter::new(Arc::clone(&store), Arc::clone(&hub)));
        let mut sub = hub.subscribe();

        let receiver = UdpReceiver::bind("127.0.0.1:0").await.expect("bind");
        let target = receiver.local_addr().expect("local addr");
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(receiver.run(Arc::clone(&router), cancel.clone()));

        let sender = UdpSocket::bind("127.0.0.1:0").await.expect("bind sender");
        sender
            .send_to(b"<13>Oct 11 22:14:15 edge nginx[7]: served", target)
            .await
            .expect("send");

        let live = tokio::time::timeout(Duration::from_secs(5), sub.receiver.recv())
            .await
            .expect("delivery before timeout")
            .expect("record delivered");
        assert_eq!(live.record.hostname.as_deref(), Some("edge"));
        assert_eq!(live.record.app_name.as_deref(), Some("nginx"));
        assert_eq!(live.record.message, "served");
        assert_eq!(store.latest_id().expect("latest_id"), 1);

        cancel.cancel();
        handle.await.expect("receiver task");
    }

    #[tokio::test]
    async fn test_cancel_stops_the_loop() {
        let tmp = TempDir::new().expect("tempdir");
        let store = Arc::new(LogStore::open(&tmp.path().join("logs.db")).expect("open store"));
        let hub = Arc::new(RecordHub::new());
        let router = Arc::new(IngestRouter::new(store, hub));

        let receiver = UdpReceiver::bind("127.0.0.1:0").await.expect("bind");
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(receiver.run(router, cancel.clone()));

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("loop exits before timeout")
            .expect("receiver task");
    }
}
