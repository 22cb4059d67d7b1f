//! Structured message bridge between host and guest.
//!
//! [`BridgeConnector`] builds an [`AppBridge`] bound to the shared remote
//! client, registers the status callbacks, attaches a
//! [`PostMessageTransport`] to the isolated context's endpoint and starts the
//! handshake. The resulting [`Session`] owns the bridge.

mod app_bridge;
mod connector;
pub mod protocol;
mod session;
mod transport;

pub use app_bridge::{
    AppBridge, AppBridgeBuilder, ErrorCallback, InitializedCallback, LinkHandler, MessageHandler,
};
pub use connector::{BridgeConnector, SessionTarget};
pub use protocol::{
    AppInfo, Capability, DisplayMode, GuestSize, HostCapabilities, HostContext, HostInfo,
    Implementation, JsonRpcMessage, LogLevel, MessageParams, RpcError, Theme,
    UI_PROTOCOL_VERSION, UiInitializeParams, UiInitializeResult, methods,
};
pub use session::{Session, SessionId};
pub use transport::PostMessageTransport;

use std::time::Duration;

use crate::host::EndpointError;

pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("Handshake timed out after {:.1}s", .0.as_secs_f64())]
    HandshakeTimeout(Duration),

    /// Message reported by the guest, shown verbatim.
    #[error("{0}")]
    GuestReported(String),

    #[error("No communication endpoint to bind")]
    EndpointUnavailable,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Guest has not completed the handshake")]
    NotInitialized,

    #[error("Bridge is closed")]
    Closed,
}

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

impl From<EndpointError> for BridgeError {
    fn from(err: EndpointError) -> Self {
        match err {
            EndpointError::Closed => BridgeError::Closed,
            EndpointError::Post(message) => BridgeError::Transport(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_error_verbatim() {
        let err = BridgeError::GuestReported("widget crashed".into());
        assert_eq!(err.to_string(), "widget crashed");
    }

    #[test]
    fn test_endpoint_error_conversion() {
        assert_eq!(
            BridgeError::from(EndpointError::Closed),
            BridgeError::Closed
        );
        assert!(matches!(
            BridgeError::from(EndpointError::Post("full".into())),
            BridgeError::Transport(_)
        ));
    }
}
