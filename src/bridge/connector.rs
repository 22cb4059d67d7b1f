//! Session construction over an isolated context's endpoint.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::{
    AppBridge, BridgeError, BridgeResult, HostCapabilities, HostContext, HostInfo, LinkHandler,
    MessageHandler, PostMessageTransport, Session,
};
use crate::config::EmbedConfig;
use crate::host::MessageEndpoint;
use crate::lifecycle::{Status, StatusTracker};
use crate::remote::RemoteClient;

/// What a session is being built for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionTarget {
    pub tool: String,
    pub resource_uri: String,
}

impl SessionTarget {
    pub fn new(tool: impl Into<String>, resource_uri: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            resource_uri: resource_uri.into(),
        }
    }
}

/// Builds bridges declaring this host's identity and offered capabilities.
#[derive(Clone)]
pub struct BridgeConnector {
    host_info: HostInfo,
    capabilities: HostCapabilities,
    handshake_timeout: Duration,
    link_handler: Option<LinkHandler>,
    message_handler: Option<MessageHandler>,
}

impl BridgeConnector {
    pub fn new(config: &EmbedConfig) -> Self {
        Self {
            host_info: config.host_info(),
            capabilities: config.host_capabilities(),
            handshake_timeout: config.handshake_timeout(),
            link_handler: None,
            message_handler: None,
        }
    }

    pub fn link_handler(mut self, handler: LinkHandler) -> Self {
        self.link_handler = Some(handler);
        self
    }

    pub fn message_handler(mut self, handler: MessageHandler) -> Self {
        self.message_handler = Some(handler);
        self
    }

    pub fn set_link_handler(&mut self, handler: LinkHandler) {
        self.link_handler = Some(handler);
    }

    pub fn set_message_handler(&mut self, handler: MessageHandler) {
        self.message_handler = Some(handler);
    }

    /// Capabilities actually declared to guests. Link opening is withheld
    /// without a handler to carry it out.
    pub fn offered_capabilities(&self) -> HostCapabilities {
        let mut capabilities = self.capabilities.clone();
        if self.link_handler.is_none() {
            capabilities.open_links = None;
        }
        capabilities
    }

    /// Build a bridge, wire its callbacks into `status` under `generation`,
    /// attach it to `endpoint` and start the handshake.
    ///
    /// Returns as soon as the handshake is under way; `status` moves to
    /// `Ready` on the guest's initialized notification, or to `Failed` with
    /// the reported message. The bridge is closed before any error returns.
    pub fn connect(
        &self,
        client: Arc<dyn RemoteClient>,
        host_context: HostContext,
        endpoint: Option<Arc<dyn MessageEndpoint>>,
        target: SessionTarget,
        status: &StatusTracker,
        generation: u64,
    ) -> BridgeResult<Session> {
        let on_ready = status.clone();
        let on_failure = status.clone();

        let mut builder = AppBridge::builder(client)
            .host_info(self.host_info.clone())
            .capabilities(self.offered_capabilities())
            .host_context(host_context)
            .handshake_timeout(self.handshake_timeout)
            .on_initialized(move || {
                on_ready.advance(generation, Status::Ready);
            })
            .on_error(move |error: &BridgeError| {
                on_failure.advance(generation, Status::Failed(error.to_string()));
            });
        if let Some(handler) = &self.link_handler {
            builder = builder.on_open_link(handler.clone());
        }
        if let Some(handler) = &self.message_handler {
            builder = builder.on_message(handler.clone());
        }
        let bridge = builder.build();

        let Some(endpoint) = endpoint else {
            bridge.close();
            return Err(BridgeError::EndpointUnavailable);
        };

        debug!(tool = %target.tool, uri = %target.resource_uri, "attaching transport");
        if let Err(e) = bridge.connect(PostMessageTransport::new(endpoint)) {
            bridge.close();
            return Err(e);
        }

        let session = Session::new(generation, target.tool, target.resource_uri, bridge);
        info!(
            session = %session.id(),
            tool = %session.tool(),
            uri = %session.resource_uri(),
            "session connecting"
        );
        Ok(session)
    }
}

impl std::fmt::Debug for BridgeConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeConnector")
            .field("host_info", &self.host_info)
            .field("capabilities", &self.offered_capabilities())
            .field("handshake_timeout", &self.handshake_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::methods;
    use crate::host::ChannelEndpoint;
    use crate::remote::McpResult;
    use async_trait::async_trait;
    use serde_json::{Value, json};

    struct NullClient;

    #[async_trait]
    impl RemoteClient for NullClient {
        async fn call_tool(&self, _name: &str, _arguments: Value) -> McpResult<Value> {
            Ok(Value::Null)
        }

        async fn read_resource(&self, _uri: &str) -> McpResult<Value> {
            Ok(Value::Null)
        }
    }

    fn target() -> SessionTarget {
        SessionTarget::new("weather", "ui://weather/app")
    }

    #[test]
    fn test_open_links_withheld_without_handler() {
        let connector = BridgeConnector::new(&EmbedConfig::default());
        assert!(!connector.offered_capabilities().offers_open_links());
        assert!(connector.offered_capabilities().offers_server_tools());

        let connector = connector.link_handler(Arc::new(|_: &url::Url| Ok::<(), String>(())));
        assert!(connector.offered_capabilities().offers_open_links());
    }

    #[tokio::test]
    async fn test_missing_endpoint() {
        let status = StatusTracker::new();
        let generation = status.reset(Status::Connecting);
        let connector = BridgeConnector::new(&EmbedConfig::default());

        let result = connector.connect(
            Arc::new(NullClient),
            HostContext::default(),
            None,
            target(),
            &status,
            generation,
        );
        assert!(matches!(result, Err(BridgeError::EndpointUnavailable)));
    }

    #[tokio::test]
    async fn test_handshake_drives_status() {
        let status = StatusTracker::new();
        let generation = status.reset(Status::Loading);
        status.advance(generation, Status::Connecting);
        let connector = BridgeConnector::new(&EmbedConfig::default());

        let (host, guest) = ChannelEndpoint::pair();
        let session = connector
            .connect(
                Arc::new(NullClient),
                HostContext::default(),
                Some(Arc::new(host)),
                target(),
                &status,
                generation,
            )
            .unwrap();
        assert_eq!(session.tool(), "weather");
        assert_eq!(status.current(), Status::Connecting);

        let mut rx = status.subscribe();
        guest
            .post_message(json!({ "jsonrpc": "2.0", "id": 1, "method": methods::INITIALIZE, "params": {} }))
            .unwrap();
        guest.recv_message().await.unwrap();
        guest
            .post_message(json!({ "jsonrpc": "2.0", "method": methods::INITIALIZED }))
            .unwrap();

        rx.wait_for(Status::is_ready).await.unwrap();
    }
}
