//! The embedding state machine.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::{EmbedView, ReadOutcome, ResourceReader, Status, StatusTracker};
use crate::Error;
use crate::bridge::{
    BridgeConnector, BridgeError, BridgeResult, HostContext, LinkHandler, MessageHandler, Session,
    SessionTarget,
};
use crate::config::EmbedConfig;
use crate::content::ContentResolver;
use crate::host::{FrameAttributes, FrameHost, IsolatedHost};
use crate::permissions::PermissionMapper;
use crate::remote::{McpResult, RemoteClient};
use crate::types::{ResourceContent, ToolDescriptor};

type ReadResult = (u64, String, McpResult<String>);

/// Drives one embedding slot through
/// `NoResource -> Loading -> Connecting -> Ready`, with `Failed` reachable
/// from any step after `Loading`.
///
/// Every dependency change (tool selection, delivered content, remote
/// client, container mount) tears the current session down before anything
/// else happens, so at most one bridge is ever attached to the container.
/// Reads are issued on the runtime and delivered back through
/// [`next_read`](Self::next_read) or [`settle`](Self::settle); results for
/// an identifier that is no longer the target, or superseded by a newer read
/// of the same identifier, are discarded.
pub struct LifecycleController<H: IsolatedHost> {
    config: EmbedConfig,
    reader: Arc<dyn ResourceReader>,
    connector: BridgeConnector,
    status: StatusTracker,
    host_context: HostContext,
    tool: Option<ToolDescriptor>,
    target: Option<String>,
    configuration_error: Option<String>,
    contents: HashMap<String, ResourceContent>,
    client: Option<Arc<dyn RemoteClient>>,
    frame: Option<FrameHost<H>>,
    session: Option<Session>,
    reads_tx: mpsc::UnboundedSender<ReadResult>,
    reads_rx: mpsc::UnboundedReceiver<ReadResult>,
    in_flight: HashMap<String, usize>,
    latest_read: HashMap<String, u64>,
    next_ticket: u64,
}

impl<H: IsolatedHost> LifecycleController<H> {
    pub fn new(config: EmbedConfig, reader: Arc<dyn ResourceReader>) -> Self {
        let (reads_tx, reads_rx) = mpsc::unbounded_channel();
        Self {
            connector: BridgeConnector::new(&config),
            host_context: config.host_context(),
            config,
            reader,
            status: StatusTracker::new(),
            tool: None,
            target: None,
            configuration_error: None,
            contents: HashMap::new(),
            client: None,
            frame: None,
            session: None,
            reads_tx,
            reads_rx,
            in_flight: HashMap::new(),
            latest_read: HashMap::new(),
            next_ticket: 0,
        }
    }

    pub fn link_handler(mut self, handler: LinkHandler) -> Self {
        self.connector.set_link_handler(handler);
        self
    }

    pub fn message_handler(mut self, handler: MessageHandler) -> Self {
        self.connector.set_message_handler(handler);
        self
    }

    /// Select the tool to embed, or none.
    ///
    /// A tool with a UI resource enters `Loading` and issues a read; one
    /// without stays in `NoResource` with a configuration error. Must be
    /// called within a Tokio runtime.
    pub fn select_tool(&mut self, tool: Option<ToolDescriptor>) {
        self.teardown();
        self.configuration_error = None;

        let name = tool.as_ref().map(|t| t.name.clone());
        let uri = tool
            .as_ref()
            .and_then(ToolDescriptor::resource_uri)
            .map(str::to_string);
        self.tool = tool;

        match (name, uri) {
            (None, _) => {
                self.target = None;
                self.status.reset(Status::NoResource);
            }
            (Some(name), None) => {
                let err = Error::Configuration(format!(
                    "tool '{}' does not declare a UI resource",
                    name
                ));
                warn!(tool = %name, category = ?err.category(), "no UI resource to embed");
                self.target = None;
                self.configuration_error = Some(err.to_string());
                self.status.reset(Status::NoResource);
            }
            (Some(name), Some(uri)) => {
                info!(tool = %name, uri = %uri, "tool selected");
                self.contents.remove(&uri);
                self.target = Some(uri.clone());
                self.status.reset(Status::Loading);
                self.issue_read(uri);
            }
        }
    }

    /// Replace the remote client and restart setup for the current target.
    pub async fn set_client(&mut self, client: Option<Arc<dyn RemoteClient>>) {
        self.client = client;
        self.restart().await;
    }

    /// Attach the container and restart setup for the current target.
    pub async fn mount(&mut self, host: H) {
        self.teardown();
        self.frame = Some(FrameHost::new(host).load_timeout(self.config.load_timeout()));
        self.restart().await;
    }

    /// Tear everything down and hand the container back.
    ///
    /// The target and fetched contents are kept, so a later
    /// [`mount`](Self::mount) resumes without another read.
    pub fn unmount(&mut self) -> Option<H> {
        self.teardown();
        let host = self.frame.take().map(FrameHost::into_inner);
        self.status.reset(Status::NoResource);
        host
    }

    /// Re-read the current resource. Returns `false` with nothing selected.
    pub fn refresh(&mut self) -> bool {
        let Some(uri) = self.target.clone() else {
            return false;
        };
        info!(uri = %uri, "refreshing resource");
        self.teardown();
        self.contents.remove(&uri);
        self.status.reset(Status::Loading);
        self.issue_read(uri);
        true
    }

    /// Deliver a read result for `uri` into the content mapping.
    ///
    /// Content for the current target restarts setup; anything else is
    /// discarded.
    pub async fn deliver(
        &mut self,
        uri: impl Into<String>,
        result: McpResult<String>,
    ) -> ReadOutcome {
        let uri = uri.into();
        if self.target.as_deref() != Some(uri.as_str()) {
            debug!(uri = %uri, target = ?self.target, "discarding stale read");
            return ReadOutcome::Discarded { uri };
        }

        match result {
            Ok(raw) => {
                debug!(uri = %uri, bytes = raw.len(), "resource content delivered");
                self.contents
                    .insert(uri.clone(), ResourceContent::new(uri.clone(), raw));
                if self.frame.is_some() {
                    self.restart().await;
                }
                ReadOutcome::Applied { uri }
            }
            Err(source) => {
                let err = Error::Resource {
                    uri: uri.clone(),
                    source,
                };
                warn!(uri = %uri, error = %err, "resource read failed");
                self.teardown();
                let reason = err.to_string();
                self.status.reset(Status::Failed(reason.clone()));
                ReadOutcome::Failed { uri, reason }
            }
        }
    }

    /// Wait for the next issued read and deliver it. `None` when no read is
    /// outstanding.
    pub async fn next_read(&mut self) -> Option<ReadOutcome> {
        if self.pending_reads() == 0 {
            return None;
        }
        let (ticket, uri, result) = self.reads_rx.recv().await?;
        let superseded = self.latest_read.get(&uri).is_some_and(|latest| *latest != ticket);
        if let Some(count) = self.in_flight.get_mut(&uri) {
            *count -= 1;
            if *count == 0 {
                self.in_flight.remove(&uri);
                self.latest_read.remove(&uri);
            }
        }
        if superseded {
            debug!(uri = %uri, ticket, "discarding superseded read");
            return Some(ReadOutcome::Discarded { uri });
        }
        Some(self.deliver(uri, result).await)
    }

    /// Deliver every outstanding read.
    pub async fn settle(&mut self) -> Vec<ReadOutcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.next_read().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Tear down and release the container.
    pub fn shutdown(mut self) -> Option<H> {
        let host = self.unmount();
        self.target = None;
        self.contents.clear();
        host
    }

    /// Update the context shared with guests, notifying a live one.
    pub fn set_host_context(&mut self, host_context: HostContext) -> BridgeResult<()> {
        self.host_context = host_context.clone();
        match &self.session {
            Some(session) => session.set_host_context(host_context),
            None => Ok(()),
        }
    }

    pub fn send_tool_input(&self, arguments: Value) -> BridgeResult<()> {
        self.ready_session()?.send_tool_input(arguments)
    }

    pub fn send_tool_result(&self, result: Value) -> BridgeResult<()> {
        self.ready_session()?.send_tool_result(result)
    }

    fn ready_session(&self) -> BridgeResult<&Session> {
        self.session.as_ref().ok_or(BridgeError::NotInitialized)
    }

    pub fn status(&self) -> Status {
        self.status.current()
    }

    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.status.subscribe()
    }

    pub fn view(&self) -> EmbedView {
        EmbedView::new(self.status.current(), self.configuration_error.as_deref())
    }

    pub fn configuration_error(&self) -> Option<&str> {
        self.configuration_error.as_deref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn tool(&self) -> Option<&ToolDescriptor> {
        self.tool.as_ref()
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn content(&self, uri: &str) -> Option<&ResourceContent> {
        self.contents.get(uri)
    }

    pub fn pending_reads(&self) -> usize {
        self.in_flight.values().sum()
    }

    pub fn host(&self) -> Option<&H> {
        self.frame.as_ref().map(FrameHost::inner)
    }

    pub fn host_mut(&mut self) -> Option<&mut H> {
        self.frame.as_mut().map(FrameHost::inner_mut)
    }

    pub fn config(&self) -> &EmbedConfig {
        &self.config
    }

    fn issue_read(&mut self, uri: String) {
        self.next_ticket += 1;
        let ticket = self.next_ticket;
        *self.in_flight.entry(uri.clone()).or_default() += 1;
        self.latest_read.insert(uri.clone(), ticket);

        let reader = self.reader.clone();
        let tx = self.reads_tx.clone();
        tokio::spawn(async move {
            let result = reader.read(&uri).await;
            let _ = tx.send((ticket, uri, result));
        });
    }

    /// Bridge first, then the context.
    fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
        if let Some(frame) = self.frame.as_mut() {
            frame.teardown();
        }
    }

    async fn restart(&mut self) {
        self.teardown();
        let Some(uri) = self.target.clone() else {
            return;
        };

        self.status.reset(Status::Loading);
        if self.contents.contains_key(&uri) {
            self.try_setup().await;
        } else if !self.in_flight.contains_key(&uri) {
            self.issue_read(uri);
        }
    }

    async fn try_setup(&mut self) {
        if self.session.is_some() {
            return;
        }
        let (Some(uri), Some(tool)) = (self.target.clone(), self.tool.as_ref()) else {
            return;
        };
        let Some(content) = self.contents.get(&uri) else {
            return;
        };
        let Some(client) = self.client.clone() else {
            debug!(uri = %uri, "waiting for remote client");
            return;
        };
        let Some(frame) = self.frame.as_mut() else {
            debug!(uri = %uri, "waiting for container");
            return;
        };

        let generation = self.status.generation();
        if !self.status.advance(generation, Status::Connecting) {
            return;
        }

        let markup = ContentResolver::resolve(&content.raw).into_owned();
        let directives = PermissionMapper::map(tool.permissions());
        let attributes = FrameAttributes::new(&directives, tool.csp());
        let target = SessionTarget::new(tool.name.clone(), uri);

        let endpoint = match frame.host(&markup, &attributes).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                let err = Error::from(e);
                warn!(uri = %target.resource_uri, error = %err, "hosting failed");
                self.status.advance(generation, Status::Failed(err.to_string()));
                return;
            }
        };

        match self.connector.connect(
            client,
            self.host_context.clone(),
            Some(endpoint),
            target,
            &self.status,
            generation,
        ) {
            Ok(session) => self.session = Some(session),
            Err(e) => {
                frame.teardown();
                let err = Error::from(e);
                warn!(error = %err, "bridge connection failed");
                self.status.advance(generation, Status::Failed(err.to_string()));
            }
        }
    }
}

impl<H: IsolatedHost> Drop for LifecycleController<H> {
    fn drop(&mut self) {
        self.teardown();
    }
}
