//! rmcp-backed remote client and resource reader.

use std::sync::Arc;

use async_trait::async_trait;
use rmcp::{
    RoleClient,
    model::{CallToolRequestParam, ReadResourceRequestParam},
    service::{RunningService, ServiceError},
};
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::timeout;

use super::{MCP_CALL_TIMEOUT, MCP_RESOURCE_TIMEOUT, McpError, McpResult, RemoteClient};
use crate::lifecycle::ResourceReader;

type McpRunningService = RunningService<RoleClient, ()>;

/// Convert rmcp ServiceError into our McpError, preserving JSON-RPC error codes.
fn map_service_error(e: ServiceError, context: &str) -> McpError {
    match e {
        ServiceError::McpError(err_data) => McpError::JsonRpc {
            code: err_data.code.0,
            message: err_data.message.to_string(),
        },
        _ => McpError::Protocol {
            message: format!("{}: {}", context, e),
        },
    }
}

fn read_timed_out(uri: &str) -> McpError {
    McpError::Protocol {
        message: format!(
            "Resource read for {} timed out after {:?}",
            uri, MCP_RESOURCE_TIMEOUT
        ),
    }
}

/// An rmcp client service the caller connected and keeps owning the
/// lifecycle of.
///
/// Serves both as the bridge's [`RemoteClient`] and as the lifecycle's
/// [`ResourceReader`]; read results are handed over as the JSON envelope the
/// content resolver understands.
pub struct McpRemote {
    name: String,
    service: Arc<RwLock<McpRunningService>>,
}

impl McpRemote {
    /// Wrap a service the caller already connected.
    pub fn from_service(name: impl Into<String>, service: McpRunningService) -> Self {
        Self {
            name: name.into(),
            service: Arc::new(RwLock::new(service)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn read_raw(&self, uri: &str) -> McpResult<rmcp::model::ReadResourceResult> {
        let service = self.service.read().await;
        timeout(
            MCP_RESOURCE_TIMEOUT,
            service.read_resource(ReadResourceRequestParam { uri: uri.into() }),
        )
        .await
        .map_err(|_| read_timed_out(uri))?
        .map_err(|e| map_service_error(e, &format!("Resource read failed for {}", uri)))
    }
}

#[async_trait]
impl RemoteClient for McpRemote {
    async fn call_tool(&self, name: &str, arguments: Value) -> McpResult<Value> {
        let service = self.service.read().await;
        let result = timeout(
            MCP_CALL_TIMEOUT,
            service.call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: arguments.as_object().cloned(),
            }),
        )
        .await
        .map_err(|_| McpError::ToolError {
            message: format!("Tool call timed out after {:?}", MCP_CALL_TIMEOUT),
        })?
        .map_err(|e| map_service_error(e, "Tool call failed"))?;

        Ok(serde_json::to_value(result)?)
    }

    async fn read_resource(&self, uri: &str) -> McpResult<Value> {
        Ok(serde_json::to_value(self.read_raw(uri).await?)?)
    }
}

#[async_trait]
impl ResourceReader for McpRemote {
    async fn read(&self, uri: &str) -> McpResult<String> {
        Ok(serde_json::to_string(&self.read_raw(uri).await?)?)
    }
}
