//! # mcp-apps-host
//!
//! Host-side embedding of tool-supplied UI applications.
//!
//! A tool may declare a `ui://` resource holding an HTML/JS bundle. This
//! crate reads it through a caller-supplied [`ResourceReader`], resolves the
//! payload into markup, hosts it in a sandboxed context provided by the
//! embedder ([`IsolatedHost`]) and connects it to the host through a
//! JSON-RPC bridge with handshake and capability negotiation.
//! [`LifecycleController`] runs the whole pipeline as an explicit state
//! machine and tears sessions down on every tool, content, client or
//! container change.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mcp_apps_host::{
//!     EmbedConfig, IsolatedHost, LifecycleController, RemoteClient, ResourceReader, Status,
//!     ToolDescriptor, UiResourceMeta,
//! };
//!
//! # async fn example<H: IsolatedHost>(
//! #     reader: Arc<dyn ResourceReader>,
//! #     client: Arc<dyn RemoteClient>,
//! #     container: H,
//! # ) {
//! let mut controller = LifecycleController::new(EmbedConfig::default(), reader);
//! controller.set_client(Some(client)).await;
//! controller.mount(container).await;
//!
//! controller.select_tool(Some(
//!     ToolDescriptor::new("weather").with_ui(UiResourceMeta::new("ui://weather/app")),
//! ));
//! controller.settle().await;
//!
//! let mut status = controller.subscribe();
//! let _ = status
//!     .wait_for(|s| matches!(s, Status::Ready | Status::Failed(_)))
//!     .await;
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod bridge;
pub mod config;
pub mod content;
pub mod host;
pub mod lifecycle;
pub mod permissions;
pub mod remote;
pub mod types;

pub use bridge::{
    AppBridge, BridgeConnector, BridgeError, BridgeResult, HostCapabilities, HostContext,
    HostInfo, PostMessageTransport, Session, SessionId, SessionTarget, Theme,
};
pub use config::{ConfigBuilder, ConfigError, ConfigProvider, EmbedConfig};
pub use content::ContentResolver;
pub use host::{
    ChannelEndpoint, EndpointError, FrameAttributes, FrameHost, HostError, HostResult,
    IsolatedHost, MessageEndpoint,
};
pub use lifecycle::{
    EmbedView, LifecycleController, ReadOutcome, ResourceReader, Status, StatusTracker,
};
pub use permissions::{PermissionMapper, SandboxDirectives};
#[cfg(feature = "mcp")]
pub use remote::McpRemote;
pub use remote::{McpError, McpResult, RemoteClient};
pub use types::{ResourceContent, ToolDescriptor, UiPermissions, UiResourceCsp, UiResourceMeta};

/// Error type for embedding operations.
///
/// Every failure at the setup boundary ends up as `Status::Failed` carrying
/// this type's `Display` text.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The tool declares nothing to embed.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Reading the UI resource failed.
    #[error("Failed to read resource {uri}: {source}")]
    Resource { uri: String, source: McpError },

    /// The isolated context could not be created or loaded.
    #[error("{0}")]
    Host(#[from] HostError),

    /// The guest failed or never completed the handshake.
    #[error("{0}")]
    Handshake(#[from] BridgeError),
}

/// Error category for display and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Nothing to embed; the user must pick another tool.
    Configuration,
    /// Read or parse failure; retried by re-selection or refresh.
    Resource,
    /// Execution context unavailable; recoverable by re-trigger.
    Host,
    /// Guest failed or never initialized.
    Handshake,
}

impl Error {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Configuration(_) => ErrorCategory::Configuration,
            Error::Resource { .. } => ErrorCategory::Resource,
            Error::Host(_) => ErrorCategory::Host,
            Error::Handshake(_) => ErrorCategory::Handshake,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Resource | ErrorCategory::Host
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_error_categories() {
        assert_eq!(
            Error::Configuration("no resource".into()).category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            Error::from(HostError::Unavailable("gone".into())).category(),
            ErrorCategory::Host
        );
        assert_eq!(
            Error::from(BridgeError::HandshakeTimeout(Duration::from_secs(30))).category(),
            ErrorCategory::Handshake
        );
        assert_eq!(
            Error::Resource {
                uri: "ui://x".into(),
                source: McpError::ResourceNotFound {
                    uri: "ui://x".into()
                },
            }
            .category(),
            ErrorCategory::Resource
        );
    }

    #[test]
    fn test_retryable() {
        assert!(Error::from(HostError::LoadTimeout(Duration::from_secs(10))).is_retryable());
        assert!(!Error::Configuration("x".into()).is_retryable());
        assert!(!Error::from(BridgeError::GuestReported("widget crashed".into())).is_retryable());
    }

    #[test]
    fn test_guest_message_verbatim() {
        let err = Error::from(BridgeError::GuestReported("widget crashed".into()));
        assert_eq!(err.to_string(), "widget crashed");
    }
}
