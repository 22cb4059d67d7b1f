//! In-process message endpoint pair.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use super::{EndpointError, MessageEndpoint};

/// One side of a connected in-memory channel, the moral equivalent of a
/// message port. Useful for embedders that run the guest in-process and
/// for driving a guest from tests.
pub struct ChannelEndpoint {
    tx: mpsc::UnboundedSender<Value>,
    rx: Mutex<mpsc::UnboundedReceiver<Value>>,
    detached: CancellationToken,
}

impl ChannelEndpoint {
    /// Create two connected endpoints: what one posts, the other receives.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (Self::new(a_tx, a_rx), Self::new(b_tx, b_rx))
    }

    fn new(tx: mpsc::UnboundedSender<Value>, rx: mpsc::UnboundedReceiver<Value>) -> Self {
        Self {
            tx,
            rx: Mutex::new(rx),
            detached: CancellationToken::new(),
        }
    }

    pub fn is_detached(&self) -> bool {
        self.detached.is_cancelled()
    }

    /// Non-blocking receive of an already-delivered message.
    pub fn try_recv_message(&self) -> Option<Value> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }
}

#[async_trait]
impl MessageEndpoint for ChannelEndpoint {
    fn post_message(&self, message: Value) -> Result<(), EndpointError> {
        if self.is_detached() {
            return Err(EndpointError::Closed);
        }
        self.tx.send(message).map_err(|_| EndpointError::Closed)
    }

    async fn recv_message(&self) -> Option<Value> {
        let mut rx = self.rx.lock().await;
        tokio::select! {
            _ = self.detached.cancelled() => None,
            message = rx.recv() => message,
        }
    }

    fn detach(&self) {
        self.detached.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_pair_delivers_both_ways() {
        let (host, guest) = ChannelEndpoint::pair();

        host.post_message(json!({ "from": "host" })).unwrap();
        guest.post_message(json!({ "from": "guest" })).unwrap();

        assert_eq!(guest.recv_message().await, Some(json!({ "from": "host" })));
        assert_eq!(host.recv_message().await, Some(json!({ "from": "guest" })));
    }

    #[tokio::test]
    async fn test_detach_closes_side() {
        let (host, guest) = ChannelEndpoint::pair();
        host.detach();

        assert!(host.is_detached());
        assert_eq!(
            host.post_message(json!({})),
            Err(EndpointError::Closed)
        );
        assert_eq!(host.recv_message().await, None);
        assert!(!guest.is_detached());
    }

    #[tokio::test]
    async fn test_detach_wakes_pending_receive() {
        let (host, _guest) = ChannelEndpoint::pair();
        let host = std::sync::Arc::new(host);

        let waiter = {
            let host = host.clone();
            tokio::spawn(async move { host.recv_message().await })
        };
        tokio::task::yield_now().await;
        host.detach();

        assert_eq!(waiter.await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_dropped_peer_ends_stream() {
        let (host, guest) = ChannelEndpoint::pair();
        drop(guest);

        assert_eq!(host.recv_message().await, None);
        assert_eq!(
            host.post_message(json!({})),
            Err(EndpointError::Closed)
        );
    }
}
