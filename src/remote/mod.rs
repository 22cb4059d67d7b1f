//! The already-connected remote client consumed by the bridge.
//!
//! The core never connects, closes or mutates this client; it only calls
//! through it on behalf of the guest.

#[cfg(feature = "mcp")]
mod rmcp_client;

#[cfg(feature = "mcp")]
pub use rmcp_client::McpRemote;

use async_trait::async_trait;
use serde_json::Value;

#[cfg(feature = "mcp")]
pub(crate) const MCP_CALL_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);
#[cfg(feature = "mcp")]
pub(crate) const MCP_RESOURCE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc { code: i32, message: String },

    #[error("Tool error: {message}")]
    ToolError { message: String },

    #[error("Resource not found: {uri}")]
    ResourceNotFound { uri: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type McpResult<T> = std::result::Result<T, McpError>;

/// Remote procedure client shared read-only across every tool and session.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Invoke a server tool; returns the raw call result object.
    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<Value>;

    /// Read a server resource; returns the raw read result object.
    async fn read_resource(&self, uri: &str) -> McpResult<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mcp_error_display() {
        let err = McpError::JsonRpc {
            code: -32601,
            message: "Method not found".into(),
        };
        assert_eq!(err.to_string(), "JSON-RPC error -32601: Method not found");

        let err = McpError::ResourceNotFound {
            uri: "ui://tool/widget".into(),
        };
        assert!(err.to_string().contains("ui://tool/widget"));
    }
}
