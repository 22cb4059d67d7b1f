//! Isolated execution contexts for untrusted guest markup.
//!
//! The rendering surface itself is supplied by the embedder through
//! [`IsolatedHost`]; [`FrameHost`] layers the hosting contract on top of it:
//! one live document per container, clear-then-write replacement, bounded
//! wait for the load signal, and an endpoint check after load.

mod channel;
mod frame;

pub use channel::ChannelEndpoint;
pub use frame::FrameHost;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::permissions::SandboxDirectives;
use crate::types::UiResourceCsp;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("Host unavailable: {0}")]
    Unavailable(String),

    #[error("Document load timed out after {:.1}s", .0.as_secs_f64())]
    LoadTimeout(Duration),

    #[error("Document write failed: {0}")]
    Write(String),
}

pub type HostResult<T> = std::result::Result<T, HostError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EndpointError {
    #[error("Endpoint closed")]
    Closed,

    #[error("Failed to post message: {0}")]
    Post(String),
}

/// The communication endpoint of an isolated context (its window).
///
/// Host and guest exchange structured messages through it; the same
/// endpoint serves as both the send and the receive side.
#[async_trait]
pub trait MessageEndpoint: Send + Sync {
    fn post_message(&self, message: Value) -> Result<(), EndpointError>;

    /// Next inbound message, or `None` once the endpoint is detached or the
    /// other side is gone.
    async fn recv_message(&self) -> Option<Value>;

    /// Remove the listener. Further posts fail and pending receives end.
    fn detach(&self);
}

/// Rendering-surface capability the embedder provides: a container that can
/// hold one sandboxed execution context at a time.
#[async_trait]
pub trait IsolatedHost: Send {
    /// Create a fresh context with the given attributes.
    ///
    /// Fails with [`HostError::Unavailable`] when the container cannot be
    /// accessed.
    fn create_context(&mut self, attributes: &FrameAttributes) -> HostResult<()>;

    fn clear_document(&mut self) -> HostResult<()>;

    fn write_document(&mut self, markup: &str) -> HostResult<()>;

    /// Resolves once the context's load event has fired.
    async fn loaded(&mut self) -> HostResult<()>;

    fn endpoint(&self) -> Option<Arc<dyn MessageEndpoint>>;

    fn teardown_context(&mut self);
}

/// Declarative security boundary applied to a new context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameAttributes {
    pub sandbox: String,
    pub allow: String,
    pub csp: Option<String>,
}

impl FrameAttributes {
    pub fn new(directives: &SandboxDirectives, csp: Option<&UiResourceCsp>) -> Self {
        Self {
            sandbox: directives.sandbox_attribute(),
            allow: directives.allow_attribute(),
            csp: csp.map(UiResourceCsp::to_policy),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::PermissionMapper;
    use crate::types::UiPermissions;

    #[test]
    fn test_frame_attributes_from_directives() {
        let permissions = UiPermissions::new().grant("camera");
        let directives = PermissionMapper::map(Some(&permissions));
        let csp = UiResourceCsp::new().connect_domain("https://api.example.com");

        let attributes = FrameAttributes::new(&directives, Some(&csp));
        assert_eq!(attributes.sandbox, "allow-scripts allow-same-origin");
        assert_eq!(attributes.allow, "camera");
        assert!(
            attributes
                .csp
                .unwrap()
                .contains("connect-src https://api.example.com")
        );
    }

    #[test]
    fn test_host_error_display() {
        let err = HostError::LoadTimeout(Duration::from_millis(2500));
        assert_eq!(err.to_string(), "Document load timed out after 2.5s");
    }
}
