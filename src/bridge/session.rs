//! The live unit of embedding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{AppBridge, BridgeError, BridgeResult, GuestSize, HostContext};

#[derive(Clone, Debug, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One embedded tool UI: owns the bridge for exactly one tool and resource.
///
/// The isolated context stays with its container; the session only holds
/// the bridge, which holds the endpoint. Closing the session closes the
/// bridge exactly once, which detaches the transport. Dropping closes too.
///
/// A session does not tear down the context. The owner of both halves,
/// [`LifecycleController`](crate::LifecycleController), closes the session
/// first and tears the context down after, and the status lives in that
/// controller's [`StatusTracker`](crate::StatusTracker), not here.
pub struct Session {
    id: SessionId,
    generation: u64,
    tool: String,
    resource_uri: String,
    bridge: Option<AppBridge>,
    started_at: DateTime<Utc>,
}

impl Session {
    pub(crate) fn new(generation: u64, tool: String, resource_uri: String, bridge: AppBridge) -> Self {
        Self {
            id: SessionId::new(),
            generation,
            tool,
            resource_uri,
            bridge: Some(bridge),
            started_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn resource_uri(&self) -> &str {
        &self.resource_uri
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn bridge(&self) -> Option<&AppBridge> {
        self.bridge.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.bridge.as_ref().is_none_or(AppBridge::is_closed)
    }

    pub fn guest_size(&self) -> Option<GuestSize> {
        self.bridge.as_ref().and_then(AppBridge::guest_size)
    }

    pub fn send_tool_input(&self, arguments: Value) -> BridgeResult<()> {
        self.open_bridge()?.send_tool_input(arguments)
    }

    pub fn send_tool_result(&self, result: Value) -> BridgeResult<()> {
        self.open_bridge()?.send_tool_result(result)
    }

    pub fn set_host_context(&self, host_context: HostContext) -> BridgeResult<()> {
        self.open_bridge()?.set_host_context(host_context)
    }

    fn open_bridge(&self) -> BridgeResult<&AppBridge> {
        self.bridge.as_ref().ok_or(BridgeError::Closed)
    }

    /// Close the bridge and release it. Only the first call has an effect.
    pub fn close(&mut self) {
        if let Some(bridge) = self.bridge.take() {
            tracing::info!(
                session = %self.id,
                tool = %self.tool,
                uri = %self.resource_uri,
                "closing session"
            );
            bridge.close();
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("tool", &self.tool)
            .field("resource_uri", &self.resource_uri)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::PostMessageTransport;
    use crate::host::ChannelEndpoint;
    use crate::remote::{McpResult, RemoteClient};
    use async_trait::async_trait;
    use std::sync::Arc;

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

    #[test]
    fn test_session_id_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }

    #[tokio::test]
    async fn test_close_detaches_once() {
        let (host, _guest) = ChannelEndpoint::pair();
        let host = Arc::new(host);
        let bridge = AppBridge::builder(Arc::new(NullClient)).build();
        bridge
            .connect(PostMessageTransport::new(host.clone()))
            .unwrap();

        let mut session = Session::new(1, "weather".into(), "ui://weather/app".into(), bridge);
        assert!(!session.is_closed());

        session.close();
        session.close();
        assert!(session.is_closed());
        assert!(host.is_detached());
        assert_eq!(
            session.send_tool_input(Value::Null),
            Err(BridgeError::Closed)
        );
    }
}
