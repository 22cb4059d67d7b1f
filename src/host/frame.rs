//! Hosting contract over an embedder-supplied container.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use super::{FrameAttributes, HostError, HostResult, IsolatedHost, MessageEndpoint};

pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Owns a mounted container and keeps at most one live document in it.
pub struct FrameHost<H> {
    inner: H,
    load_timeout: Duration,
    live: bool,
}

impl<H: IsolatedHost> FrameHost<H> {
    pub fn new(inner: H) -> Self {
        Self {
            inner,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            live: false,
        }
    }

    pub fn load_timeout(mut self, load_timeout: Duration) -> Self {
        self.load_timeout = load_timeout;
        self
    }

    /// Host markup in a fresh context and return its endpoint.
    ///
    /// Any previous context is torn down first. On failure the new context
    /// is torn down too, so nothing half-written stays live.
    pub async fn host(
        &mut self,
        markup: &str,
        attributes: &FrameAttributes,
    ) -> HostResult<Arc<dyn MessageEndpoint>> {
        self.teardown();

        self.inner.create_context(attributes)?;
        self.live = true;

        let result = self.load(markup).await;
        if let Err(ref e) = result {
            warn!(error = %e, "hosting failed, discarding context");
            self.teardown();
        }
        result
    }

    async fn load(&mut self, markup: &str) -> HostResult<Arc<dyn MessageEndpoint>> {
        self.inner.clear_document()?;
        self.inner.write_document(markup)?;
        debug!(bytes = markup.len(), "document written");

        let load_timeout = self.load_timeout;
        timeout(load_timeout, self.inner.loaded())
            .await
            .map_err(|_| HostError::LoadTimeout(load_timeout))??;

        self.inner.endpoint().ok_or_else(|| {
            HostError::Unavailable("communication endpoint missing after load".into())
        })
    }

    /// Discard the live context, if any. Idempotent.
    pub fn teardown(&mut self) {
        if self.live {
            self.inner.teardown_context();
            self.live = false;
        }
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut H {
        &mut self.inner
    }

    pub fn into_inner(mut self) -> H {
        self.teardown();
        let Self { inner, .. } = self;
        inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ChannelEndpoint;
    use async_trait::async_trait;

    #[derive(Default)]
    struct ScriptedHost {
        mounted: bool,
        never_loads: bool,
        drop_endpoint: bool,
        calls: Vec<&'static str>,
        document: Option<String>,
        endpoint: Option<Arc<dyn MessageEndpoint>>,
    }

    #[async_trait]
    impl IsolatedHost for ScriptedHost {
        fn create_context(&mut self, _attributes: &FrameAttributes) -> HostResult<()> {
            if !self.mounted {
                return Err(HostError::Unavailable("container not mounted".into()));
            }
            self.calls.push("create");
            let (host_side, _guest_side) = ChannelEndpoint::pair();
            self.endpoint = Some(Arc::new(host_side));
            Ok(())
        }

        fn clear_document(&mut self) -> HostResult<()> {
            self.calls.push("clear");
            self.document = None;
            Ok(())
        }

        fn write_document(&mut self, markup: &str) -> HostResult<()> {
            self.calls.push("write");
            self.document = Some(markup.to_string());
            Ok(())
        }

        async fn loaded(&mut self) -> HostResult<()> {
            if self.never_loads {
                std::future::pending::<()>().await;
            }
            if self.drop_endpoint {
                self.endpoint = None;
            }
            Ok(())
        }

        fn endpoint(&self) -> Option<Arc<dyn MessageEndpoint>> {
            self.endpoint.clone()
        }

        fn teardown_context(&mut self) {
            self.calls.push("teardown");
            self.document = None;
            self.endpoint = None;
        }
    }

    fn attributes() -> FrameAttributes {
        FrameAttributes {
            sandbox: "allow-scripts allow-same-origin".into(),
            allow: String::new(),
            csp: None,
        }
    }

    fn mounted() -> ScriptedHost {
        ScriptedHost {
            mounted: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_host_clear_then_write() {
        let mut frame = FrameHost::new(mounted());
        let endpoint = frame.host("<p>hi</p>", &attributes()).await;

        assert!(endpoint.is_ok());
        assert!(frame.is_live());
        assert_eq!(frame.inner().calls, vec!["create", "clear", "write"]);
        assert_eq!(frame.inner().document.as_deref(), Some("<p>hi</p>"));
    }

    #[tokio::test]
    async fn test_rehost_tears_down_previous() {
        let mut frame = FrameHost::new(mounted());
        frame.host("<p>one</p>", &attributes()).await.unwrap();
        frame.host("<p>two</p>", &attributes()).await.unwrap();

        assert_eq!(
            frame.inner().calls,
            vec!["create", "clear", "write", "teardown", "create", "clear", "write"]
        );
        assert_eq!(frame.inner().document.as_deref(), Some("<p>two</p>"));
    }

    #[tokio::test]
    async fn test_unmounted_container_unavailable() {
        let mut frame = FrameHost::new(ScriptedHost::default());
        let result = frame.host("<p>hi</p>", &attributes()).await;

        assert!(matches!(result, Err(HostError::Unavailable(_))));
        assert!(!frame.is_live());
    }

    #[tokio::test]
    async fn test_missing_endpoint_after_load() {
        let mut frame = FrameHost::new(ScriptedHost {
            drop_endpoint: true,
            ..mounted()
        });
        let result = frame.host("<p>hi</p>", &attributes()).await;

        assert!(matches!(result, Err(HostError::Unavailable(_))));
        assert!(!frame.is_live());
        assert_eq!(frame.inner().calls.last(), Some(&"teardown"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_timeout() {
        let mut frame = FrameHost::new(ScriptedHost {
            never_loads: true,
            ..mounted()
        })
        .load_timeout(Duration::from_millis(200));

        let result = frame.host("<p>hi</p>", &attributes()).await;
        assert!(matches!(result, Err(HostError::LoadTimeout(_))));
        assert!(!frame.is_live());
    }

    #[tokio::test]
    async fn test_teardown_idempotent() {
        let mut frame = FrameHost::new(mounted());
        frame.host("<p>hi</p>", &attributes()).await.unwrap();
        frame.teardown();
        frame.teardown();

        let teardowns = frame
            .inner()
            .calls
            .iter()
            .filter(|c| **c == "teardown")
            .count();
        assert_eq!(teardowns, 1);
    }
}
