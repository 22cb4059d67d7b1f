//! JSON-RPC message model and the host/guest method surface.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{BridgeError, BridgeResult};

pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol version the host answers `ui/initialize` with.
pub const UI_PROTOCOL_VERSION: &str = "2025-06-18";

pub mod methods {
    // guest -> host
    pub const INITIALIZE: &str = "ui/initialize";
    pub const INITIALIZED: &str = "ui/notifications/initialized";
    pub const OPEN_LINK: &str = "ui/open-link";
    pub const MESSAGE: &str = "ui/message";
    pub const SIZE_CHANGED: &str = "ui/notifications/size-changed";
    pub const GUEST_ERROR: &str = "ui/notifications/error";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const RESOURCES_READ: &str = "resources/read";
    pub const LOGGING_MESSAGE: &str = "notifications/message";

    // host -> guest
    pub const TOOL_INPUT: &str = "ui/notifications/tool-input";
    pub const TOOL_RESULT: &str = "ui/notifications/tool-result";
    pub const HOST_CONTEXT_CHANGED: &str = "ui/notifications/host-context-changed";
    pub const RESOURCE_TEARDOWN: &str = "ui/resource-teardown";
}

pub mod error_codes {
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(error_codes::INVALID_PARAMS, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(error_codes::INTERNAL_ERROR, message)
    }
}

/// One JSON-RPC 2.0 message.
#[derive(Clone, Debug, PartialEq)]
pub enum JsonRpcMessage {
    Request {
        id: Value,
        method: String,
        params: Option<Value>,
    },
    Notification {
        method: String,
        params: Option<Value>,
    },
    Response {
        id: Value,
        result: Value,
    },
    Error {
        id: Option<Value>,
        error: RpcError,
    },
}

#[derive(Deserialize)]
struct Envelope {
    jsonrpc: String,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

impl JsonRpcMessage {
    pub fn request(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self::Request {
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self::Notification {
            method: method.into(),
            params,
        }
    }

    pub fn response(id: Value, result: Value) -> Self {
        Self::Response { id, result }
    }

    pub fn error(id: Option<Value>, error: RpcError) -> Self {
        Self::Error { id, error }
    }

    pub fn method(&self) -> Option<&str> {
        match self {
            Self::Request { method, .. } | Self::Notification { method, .. } => Some(method),
            Self::Response { .. } | Self::Error { .. } => None,
        }
    }

    /// Classify a structured message received from the guest.
    pub fn from_value(value: Value) -> BridgeResult<Self> {
        let envelope: Envelope = serde_json::from_value(value)
            .map_err(|e| BridgeError::InvalidMessage(e.to_string()))?;

        if envelope.jsonrpc != JSONRPC_VERSION {
            return Err(BridgeError::InvalidMessage(format!(
                "unsupported jsonrpc version '{}'",
                envelope.jsonrpc
            )));
        }

        let id = envelope.id.filter(|id| !id.is_null());
        match (envelope.method, id, envelope.result, envelope.error) {
            (Some(method), Some(id), None, None) => Ok(Self::Request {
                id,
                method,
                params: envelope.params,
            }),
            (Some(method), None, None, None) => Ok(Self::Notification {
                method,
                params: envelope.params,
            }),
            (None, Some(id), Some(result), None) => Ok(Self::Response { id, result }),
            (None, id, None, Some(error)) => Ok(Self::Error { id, error }),
            _ => Err(BridgeError::InvalidMessage(
                "message is neither request, notification nor response".into(),
            )),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Request { id, method, params } => {
                let mut message = json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "method": method });
                if let Some(params) = params {
                    message["params"] = params.clone();
                }
                message
            }
            Self::Notification { method, params } => {
                let mut message = json!({ "jsonrpc": JSONRPC_VERSION, "method": method });
                if let Some(params) = params {
                    message["params"] = params.clone();
                }
                message
            }
            Self::Response { id, result } => {
                json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "result": result })
            }
            Self::Error { id, error } => {
                json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "error": error })
            }
        }
    }
}

/// Deserialize request params; absent params read as an empty object.
pub(crate) fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, RpcError> {
    serde_json::from_value(params.unwrap_or_else(|| json!({})))
        .map_err(|e| RpcError::invalid_params(e.to_string()))
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

impl Implementation {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

pub type HostInfo = Implementation;
pub type AppInfo = Implementation;

/// Marker for an offered capability; serializes as `{}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {}

/// Capabilities the host offers to the guest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_links: Option<Capability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_tools: Option<Capability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_resources: Option<Capability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<Capability>,
}

impl HostCapabilities {
    pub fn all() -> Self {
        Self {
            open_links: Some(Capability {}),
            server_tools: Some(Capability {}),
            server_resources: Some(Capability {}),
            logging: Some(Capability {}),
        }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn offers_open_links(&self) -> bool {
        self.open_links.is_some()
    }

    pub fn offers_server_tools(&self) -> bool {
        self.server_tools.is_some()
    }

    pub fn offers_server_resources(&self) -> bool {
        self.server_resources.is_some()
    }

    pub fn offers_logging(&self) -> bool {
        self.logging.is_some()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Light => write!(f, "light"),
            Theme::Dark => write!(f, "dark"),
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme '{}'", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Inline,
    Fullscreen,
    Pip,
}

/// Contextual information shared with the guest at handshake and on change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_mode: Option<DisplayMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl HostContext {
    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = Some(theme);
        self
    }

    pub fn with_display_mode(mut self, mode: DisplayMode) -> Self {
        self.display_mode = Some(mode);
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiInitializeParams {
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub app_info: Option<AppInfo>,
    #[serde(default)]
    pub app_capabilities: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiInitializeResult {
    pub protocol_version: String,
    pub host_info: HostInfo,
    pub host_capabilities: HostCapabilities,
    pub host_context: HostContext,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenLinkParams {
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResourceParams {
    pub uri: String,
}

/// Guest-reported content size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestSize {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoggingMessageParams {
    pub level: LogLevel,
    #[serde(default)]
    pub logger: Option<String>,
    #[serde(default)]
    pub data: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestErrorParams {
    pub message: String,
}

/// A message the guest asks the host to add to its conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageParams {
    pub role: String,
    pub content: Value,
}
