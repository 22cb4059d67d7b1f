//! Host side of the guest protocol: handshake, capability-gated request
//! handling and host-to-guest notifications.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};
use url::Url;

use super::protocol::{
    CallToolParams, GuestErrorParams, LoggingMessageParams, OpenLinkParams, ReadResourceParams,
    error_codes, parse_params,
};
use super::{
    AppInfo, BridgeError, BridgeResult, DEFAULT_HANDSHAKE_TIMEOUT, GuestSize, HostCapabilities,
    HostContext, HostInfo, JsonRpcMessage, LogLevel, MessageParams, PostMessageTransport,
    RpcError, UI_PROTOCOL_VERSION, UiInitializeParams, UiInitializeResult, methods,
};
use crate::remote::RemoteClient;

pub type InitializedCallback = Box<dyn Fn() + Send + Sync>;
pub type ErrorCallback = Box<dyn Fn(&BridgeError) + Send + Sync>;
pub type LinkHandler = Arc<dyn Fn(&Url) -> Result<(), String> + Send + Sync>;
pub type MessageHandler = Arc<dyn Fn(&MessageParams) -> Result<(), String> + Send + Sync>;

const GUEST_LOG_TARGET: &str = "mcp_apps_host::guest";

enum Routed {
    Reply(Result<Value, RpcError>),
    ToolCall(CallToolParams),
    ResourceRead(ReadResourceParams),
}

pub struct AppBridgeBuilder {
    client: Arc<dyn RemoteClient>,
    host_info: HostInfo,
    capabilities: HostCapabilities,
    host_context: HostContext,
    handshake_timeout: Duration,
    on_initialized: Option<InitializedCallback>,
    on_error: Option<ErrorCallback>,
    link_handler: Option<LinkHandler>,
    message_handler: Option<MessageHandler>,
}

impl AppBridgeBuilder {
    pub fn host_info(mut self, host_info: HostInfo) -> Self {
        self.host_info = host_info;
        self
    }

    pub fn capabilities(mut self, capabilities: HostCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn host_context(mut self, host_context: HostContext) -> Self {
        self.host_context = host_context;
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn on_initialized(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_initialized = Some(Box::new(callback));
        self
    }

    pub fn on_error(mut self, callback: impl Fn(&BridgeError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(callback));
        self
    }

    pub fn on_open_link(mut self, handler: LinkHandler) -> Self {
        self.link_handler = Some(handler);
        self
    }

    pub fn on_message(mut self, handler: MessageHandler) -> Self {
        self.message_handler = Some(handler);
        self
    }

    pub fn build(self) -> AppBridge {
        let (size, _) = watch::channel(None);
        AppBridge {
            shared: Arc::new(Shared {
                client: self.client,
                host_info: self.host_info,
                capabilities: self.capabilities,
                host_context: RwLock::new(self.host_context),
                handshake_timeout: self.handshake_timeout,
                on_initialized: self.on_initialized,
                on_error: self.on_error,
                link_handler: self.link_handler,
                message_handler: self.message_handler,
                transport: OnceLock::new(),
                init_requested: AtomicBool::new(false),
                initialized: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                app_info: RwLock::new(None),
                size,
                next_request_id: AtomicI64::new(1),
            }),
            pump: Mutex::new(None),
        }
    }
}

/// Protocol bridge bound to an already-connected remote client.
///
/// Inbound guest messages are processed by a single pump task started by
/// [`AppBridge::connect`]. [`AppBridge::close`] stops it and detaches the
/// transport; it is safe to call any number of times, connected or not.
pub struct AppBridge {
    shared: Arc<Shared>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

struct Shared {
    client: Arc<dyn RemoteClient>,
    host_info: HostInfo,
    capabilities: HostCapabilities,
    host_context: RwLock<HostContext>,
    handshake_timeout: Duration,
    on_initialized: Option<InitializedCallback>,
    on_error: Option<ErrorCallback>,
    link_handler: Option<LinkHandler>,
    message_handler: Option<MessageHandler>,
    transport: OnceLock<PostMessageTransport>,
    init_requested: AtomicBool,
    initialized: AtomicBool,
    closed: AtomicBool,
    app_info: RwLock<Option<AppInfo>>,
    size: watch::Sender<Option<GuestSize>>,
    next_request_id: AtomicI64,
}

impl AppBridge {
    pub fn builder(client: Arc<dyn RemoteClient>) -> AppBridgeBuilder {
        AppBridgeBuilder {
            client,
            host_info: HostInfo::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            capabilities: HostCapabilities::default(),
            host_context: HostContext::default(),
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            on_initialized: None,
            on_error: None,
            link_handler: None,
            message_handler: None,
        }
    }

    /// Attach the transport and start waiting for the guest's handshake.
    ///
    /// Returns once the pump is running; completion is reported through the
    /// initialized callback, failure or timeout through the error callback.
    pub fn connect(&self, transport: PostMessageTransport) -> BridgeResult<()> {
        if self.is_closed() {
            return Err(BridgeError::Closed);
        }
        self.shared
            .transport
            .set(transport)
            .map_err(|_| BridgeError::Transport("bridge is already connected".into()))?;

        let shared = self.shared.clone();
        let handle = tokio::spawn(async move { shared.run().await });
        *self.pump.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        debug!(timeout = ?self.shared.handshake_timeout, "bridge connected, awaiting handshake");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.initialized.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn capabilities(&self) -> &HostCapabilities {
        &self.shared.capabilities
    }

    pub fn app_info(&self) -> Option<AppInfo> {
        self.shared
            .app_info
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn guest_size(&self) -> Option<GuestSize> {
        *self.shared.size.borrow()
    }

    pub fn watch_size(&self) -> watch::Receiver<Option<GuestSize>> {
        self.shared.size.subscribe()
    }

    pub fn host_context(&self) -> HostContext {
        self.shared.host_context()
    }

    /// Replace the host context, notifying an initialized guest.
    pub fn set_host_context(&self, host_context: HostContext) -> BridgeResult<()> {
        *self
            .shared
            .host_context
            .write()
            .unwrap_or_else(PoisonError::into_inner) = host_context.clone();

        if self.is_initialized() {
            self.notify_guest(
                methods::HOST_CONTEXT_CHANGED,
                serde_json::to_value(host_context)
                    .map_err(|e| BridgeError::InvalidMessage(e.to_string()))?,
            )?;
        }
        Ok(())
    }

    pub fn send_tool_input(&self, arguments: Value) -> BridgeResult<()> {
        self.notify_guest(methods::TOOL_INPUT, json!({ "arguments": arguments }))
    }

    pub fn send_tool_result(&self, result: Value) -> BridgeResult<()> {
        self.notify_guest(methods::TOOL_RESULT, result)
    }

    fn notify_guest(&self, method: &str, params: Value) -> BridgeResult<()> {
        if self.is_closed() {
            return Err(BridgeError::Closed);
        }
        if !self.is_initialized() {
            return Err(BridgeError::NotInitialized);
        }
        let transport = self.shared.transport.get().ok_or(BridgeError::NotInitialized)?;
        transport.send(&JsonRpcMessage::notification(method, Some(params)))
    }

    /// Stop the pump and detach the transport. Idempotent.
    ///
    /// An initialized guest is sent a teardown request first; failing to
    /// deliver it is only logged.
    pub fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(transport) = self.shared.transport.get() {
            if self.is_initialized() {
                let id = self.shared.next_request_id.fetch_add(1, Ordering::SeqCst);
                let teardown =
                    JsonRpcMessage::request(id, methods::RESOURCE_TEARDOWN, Some(json!({})));
                if let Err(e) = transport.send(&teardown) {
                    debug!(error = %e, "guest teardown request not delivered");
                }
            }
            transport.close();
        }

        if let Some(handle) = self
            .pump
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        debug!("bridge closed");
    }
}

impl Drop for AppBridge {
    fn drop(&mut self) {
        self.close();
    }
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn host_context(&self) -> HostContext {
        self.host_context
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn run(self: Arc<Self>) {
        let Some(transport) = self.transport.get() else {
            return;
        };

        let deadline = tokio::time::sleep(self.handshake_timeout);
        tokio::pin!(deadline);

        // in-flight proxied calls; the receive loop never awaits them
        let mut requests = JoinSet::new();

        loop {
            tokio::select! {
                _ = &mut deadline, if !self.initialized.load(Ordering::SeqCst) => {
                    self.report_error(BridgeError::HandshakeTimeout(self.handshake_timeout));
                    break;
                }
                Some(joined) = requests.join_next(), if !requests.is_empty() => match joined {
                    Err(e) if e.is_panic() => error!(error = %e, "proxied guest request panicked"),
                    _ => {}
                },
                incoming = transport.recv() => match incoming {
                    None => {
                        self.report_error(BridgeError::Transport("endpoint closed".into()));
                        break;
                    }
                    Some(Err(e)) => warn!(error = %e, "dropping malformed guest message"),
                    Some(Ok(message)) => {
                        if self.dispatch(transport, message, &mut requests).is_break() {
                            break;
                        }
                    }
                },
            }
        }

        requests.abort_all();
        // a pump that stopped on its own leaves nothing listening
        if !self.is_closed() {
            transport.close();
        }
    }

    fn dispatch(
        self: &Arc<Self>,
        transport: &PostMessageTransport,
        message: JsonRpcMessage,
        requests: &mut JoinSet<()>,
    ) -> ControlFlow<()> {
        match message {
            JsonRpcMessage::Request { id, method, params } => {
                match self.route_request(&method, params) {
                    Routed::Reply(result) => self.reply(transport, id, &method, result),
                    Routed::ToolCall(params) => {
                        let shared = self.clone();
                        requests.spawn(async move {
                            let result = shared.handle_tool_call(params).await;
                            shared.reply_deferred(id, &method, result);
                        });
                    }
                    Routed::ResourceRead(params) => {
                        let shared = self.clone();
                        requests.spawn(async move {
                            let result = shared.handle_resource_read(params).await;
                            shared.reply_deferred(id, &method, result);
                        });
                    }
                }
                ControlFlow::Continue(())
            }
            JsonRpcMessage::Notification { method, params } => {
                self.handle_notification(&method, params)
            }
            JsonRpcMessage::Response { id, .. } => {
                debug!(id = %id, "guest acknowledged request");
                ControlFlow::Continue(())
            }
            JsonRpcMessage::Error { id, error } => {
                warn!(id = ?id, code = error.code, message = %error.message, "guest returned an error");
                ControlFlow::Continue(())
            }
        }
    }

    fn reply(
        &self,
        transport: &PostMessageTransport,
        id: Value,
        method: &str,
        result: Result<Value, RpcError>,
    ) {
        if self.is_closed() {
            return;
        }
        let reply = match result {
            Ok(result) => JsonRpcMessage::response(id, result),
            Err(error) => {
                debug!(method = %method, code = error.code, "rejecting guest request");
                JsonRpcMessage::error(Some(id), error)
            }
        };
        if let Err(e) = transport.send(&reply) {
            warn!(method = %method, error = %e, "failed to reply to guest");
        }
    }

    fn reply_deferred(&self, id: Value, method: &str, result: Result<Value, RpcError>) {
        if let Some(transport) = self.transport.get() {
            self.reply(transport, id, method, result);
        }
    }

    /// Answer a request inline, or hand back the remote call it needs.
    fn route_request(&self, method: &str, params: Option<Value>) -> Routed {
        if method == methods::INITIALIZE {
            return Routed::Reply(self.handle_initialize(params));
        }
        if !self.init_requested.load(Ordering::SeqCst) {
            return Routed::Reply(Err(RpcError::new(
                error_codes::INVALID_REQUEST,
                "ui/initialize must precede other requests",
            )));
        }

        match method {
            methods::OPEN_LINK if self.capabilities.offers_open_links() => {
                Routed::Reply(self.handle_open_link(params))
            }
            methods::MESSAGE if self.message_handler.is_some() => {
                Routed::Reply(self.handle_message(params))
            }
            methods::TOOLS_CALL if self.capabilities.offers_server_tools() => {
                match parse_params(params) {
                    Ok(params) => Routed::ToolCall(params),
                    Err(e) => Routed::Reply(Err(e)),
                }
            }
            methods::RESOURCES_READ if self.capabilities.offers_server_resources() => {
                match parse_params(params) {
                    Ok(params) => Routed::ResourceRead(params),
                    Err(e) => Routed::Reply(Err(e)),
                }
            }
            other => Routed::Reply(Err(RpcError::method_not_found(other))),
        }
    }

    fn handle_initialize(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let params: UiInitializeParams = parse_params(params)?;
        info!(
            app = ?params.app_info,
            protocol_version = ?params.protocol_version,
            "guest requested initialize"
        );

        *self.app_info.write().unwrap_or_else(PoisonError::into_inner) = params.app_info;
        self.init_requested.store(true, Ordering::SeqCst);

        let result = UiInitializeResult {
            protocol_version: UI_PROTOCOL_VERSION.to_string(),
            host_info: self.host_info.clone(),
            host_capabilities: self.capabilities.clone(),
            host_context: self.host_context(),
        };
        serde_json::to_value(result).map_err(|e| RpcError::internal(e.to_string()))
    }

    fn handle_open_link(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let params: OpenLinkParams = parse_params(params)?;
        let url = Url::parse(&params.url)
            .map_err(|e| RpcError::invalid_params(format!("invalid url '{}': {}", params.url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RpcError::invalid_params(format!(
                "unsupported link scheme '{}'",
                url.scheme()
            )));
        }

        let handler = self
            .link_handler
            .as_ref()
            .ok_or_else(|| RpcError::internal("no link handler configured"))?;
        info!(url = %url, "guest requested link open");
        handler(&url).map_err(RpcError::internal)?;
        Ok(json!({}))
    }

    fn handle_message(&self, params: Option<Value>) -> Result<Value, RpcError> {
        let params: MessageParams = parse_params(params)?;
        let handler = self
            .message_handler
            .as_ref()
            .ok_or_else(|| RpcError::method_not_found(methods::MESSAGE))?;
        handler(&params).map_err(RpcError::internal)?;
        Ok(json!({}))
    }

    async fn handle_tool_call(&self, params: CallToolParams) -> Result<Value, RpcError> {
        debug!(tool = %params.name, "proxying guest tool call");
        self.client
            .call_tool(&params.name, params.arguments.unwrap_or_else(|| json!({})))
            .await
            .map_err(|e| RpcError::internal(e.to_string()))
    }

    async fn handle_resource_read(&self, params: ReadResourceParams) -> Result<Value, RpcError> {
        debug!(uri = %params.uri, "proxying guest resource read");
        self.client
            .read_resource(&params.uri)
            .await
            .map_err(|e| RpcError::internal(e.to_string()))
    }

    fn handle_notification(&self, method: &str, params: Option<Value>) -> ControlFlow<()> {
        match method {
            methods::INITIALIZED => {
                if !self.init_requested.load(Ordering::SeqCst) {
                    warn!("initialized notification before initialize request, ignoring");
                } else if !self.initialized.swap(true, Ordering::SeqCst) && !self.is_closed() {
                    info!("guest initialized");
                    if let Some(callback) = &self.on_initialized {
                        callback();
                    }
                }
            }
            methods::GUEST_ERROR => {
                let message = params
                    .and_then(|p| serde_json::from_value::<GuestErrorParams>(p).ok())
                    .map(|p| p.message)
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| "guest reported an unspecified error".to_string());
                self.report_error(BridgeError::GuestReported(message));
                return ControlFlow::Break(());
            }
            methods::SIZE_CHANGED => match parse_params::<GuestSize>(params) {
                Ok(size) => {
                    debug!(width = ?size.width, height = ?size.height, "guest size changed");
                    self.size.send_replace(Some(size));
                }
                Err(e) => warn!(error = %e.message, "invalid size notification"),
            },
            methods::LOGGING_MESSAGE if self.capabilities.offers_logging() => {
                match parse_params::<LoggingMessageParams>(params) {
                    Ok(log) => forward_guest_log(&log),
                    Err(e) => warn!(error = %e.message, "invalid guest log message"),
                }
            }
            other => debug!(method = other, "ignoring guest notification"),
        }
        ControlFlow::Continue(())
    }

    fn report_error(&self, error: BridgeError) {
        if self.is_closed() {
            return;
        }
        warn!(error = %error, "bridge error");
        if let Some(callback) = &self.on_error {
            callback(&error);
        }
    }
}

fn forward_guest_log(log: &LoggingMessageParams) {
    let logger = log.logger.as_deref().unwrap_or("guest");
    let data = &log.data;
    match log.level {
        LogLevel::Debug => debug!(target: GUEST_LOG_TARGET, logger, data = %data, "guest log"),
        LogLevel::Info | LogLevel::Notice => {
            info!(target: GUEST_LOG_TARGET, logger, data = %data, "guest log")
        }
        LogLevel::Warning => warn!(target: GUEST_LOG_TARGET, logger, data = %data, "guest log"),
        LogLevel::Error | LogLevel::Critical | LogLevel::Alert | LogLevel::Emergency => {
            error!(target: GUEST_LOG_TARGET, logger, data = %data, "guest log")
        }
    }
}
