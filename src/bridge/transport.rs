//! Message-based transport over an isolated context's endpoint.

use std::sync::Arc;

use super::{BridgeResult, JsonRpcMessage};
use crate::host::MessageEndpoint;

/// Sends to a target endpoint and listens on a source endpoint.
///
/// Host and guest share one context, so both sides are normally the same
/// endpoint.
pub struct PostMessageTransport {
    target: Arc<dyn MessageEndpoint>,
    source: Arc<dyn MessageEndpoint>,
}

impl PostMessageTransport {
    pub fn new(endpoint: Arc<dyn MessageEndpoint>) -> Self {
        Self {
            target: endpoint.clone(),
            source: endpoint,
        }
    }

    pub fn with_source(
        target: Arc<dyn MessageEndpoint>,
        source: Arc<dyn MessageEndpoint>,
    ) -> Self {
        Self { target, source }
    }

    pub fn send(&self, message: &JsonRpcMessage) -> BridgeResult<()> {
        self.target.post_message(message.to_value())?;
        Ok(())
    }

    /// Next inbound message; `None` once the source is gone.
    pub async fn recv(&self) -> Option<BridgeResult<JsonRpcMessage>> {
        let value = self.source.recv_message().await?;
        Some(JsonRpcMessage::from_value(value))
    }

    pub fn close(&self) {
        self.source.detach();
        if !Arc::ptr_eq(&self.target, &self.source) {
            self.target.detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::methods;
    use crate::host::ChannelEndpoint;
    use serde_json::json;

    #[tokio::test]
    async fn test_send_and_receive() {
        let (host, guest) = ChannelEndpoint::pair();
        let transport = PostMessageTransport::new(Arc::new(host));

        transport
            .send(&JsonRpcMessage::notification(methods::TOOL_INPUT, Some(json!({ "arguments": {} }))))
            .unwrap();
        let delivered = guest.recv_message().await.unwrap();
        assert_eq!(delivered["method"], "ui/notifications/tool-input");

        guest
            .post_message(json!({ "jsonrpc": "2.0", "method": "ui/notifications/initialized" }))
            .unwrap();
        let received = transport.recv().await.unwrap().unwrap();
        assert_eq!(received.method(), Some(methods::INITIALIZED));
    }

    #[tokio::test]
    async fn test_malformed_message_surfaces_error() {
        let (host, guest) = ChannelEndpoint::pair();
        let transport = PostMessageTransport::new(Arc::new(host));

        guest.post_message(json!({ "hello": "world" })).unwrap();
        assert!(transport.recv().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_close_detaches_endpoint() {
        let (host, _guest) = ChannelEndpoint::pair();
        let host = Arc::new(host);
        let transport = PostMessageTransport::new(host.clone());

        transport.close();
        assert!(host.is_detached());
        assert!(transport.recv().await.is_none());
        assert!(
            transport
                .send(&JsonRpcMessage::notification(methods::TOOL_RESULT, None))
                .is_err()
        );
    }
}
