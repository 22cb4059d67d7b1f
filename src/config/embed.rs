//! Host-side embedding settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::provider::{ConfigProvider, ConfigProviderExt};
use super::{ConfigError, ConfigResult};
use crate::bridge::{Capability, HostCapabilities, HostContext, HostInfo, Theme};

fn default_host_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}

fn default_host_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_true() -> bool {
    true
}

fn default_handshake_timeout_ms() -> u64 {
    30_000
}

fn default_load_timeout_ms() -> u64 {
    10_000
}

/// Identity, offered capabilities and timeouts applied to every embedding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedConfig {
    #[serde(default = "default_host_name")]
    pub host_name: String,
    #[serde(default = "default_host_version")]
    pub host_version: String,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "default_true")]
    pub open_links: bool,
    #[serde(default = "default_true")]
    pub server_tools: bool,
    #[serde(default = "default_true")]
    pub server_resources: bool,
    #[serde(default = "default_true")]
    pub logging: bool,
    /// Milliseconds.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout: u64,
    /// Milliseconds.
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout: u64,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            host_name: default_host_name(),
            host_version: default_host_version(),
            theme: Theme::default(),
            open_links: true,
            server_tools: true,
            server_resources: true,
            logging: true,
            handshake_timeout: default_handshake_timeout_ms(),
            load_timeout: default_load_timeout_ms(),
        }
    }
}

impl EmbedConfig {
    pub fn with_host(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.host_name = name.into();
        self.host_version = version.into();
        self
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn with_open_links(mut self, enabled: bool) -> Self {
        self.open_links = enabled;
        self
    }

    pub fn with_server_tools(mut self, enabled: bool) -> Self {
        self.server_tools = enabled;
        self
    }

    pub fn with_server_resources(mut self, enabled: bool) -> Self {
        self.server_resources = enabled;
        self
    }

    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.logging = enabled;
        self
    }

    /// Sub-millisecond values are raised to one millisecond; a timeout is
    /// never zero.
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout_millis(timeout);
        self
    }

    /// Clamped like [`with_handshake_timeout`](Self::with_handshake_timeout).
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout_millis(timeout);
        self
    }

    /// Defaults overlaid with whatever `provider` defines.
    pub async fn load(provider: &dyn ConfigProvider) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(name) = provider.get_raw("host.name").await? {
            config.host_name = name;
        }
        if let Some(version) = provider.get_raw("host.version").await? {
            config.host_version = version;
        }
        if let Some(theme) = provider.get_parsed::<Theme>("theme").await? {
            config.theme = theme;
        }
        if let Some(ms) = provider.get_parsed::<u64>("handshake.timeout_ms").await? {
            config.handshake_timeout = positive("handshake.timeout_ms", ms)?;
        }
        if let Some(ms) = provider.get_parsed::<u64>("load.timeout_ms").await? {
            config.load_timeout = positive("load.timeout_ms", ms)?;
        }
        if let Some(v) = provider.get_parsed("capabilities.open_links").await? {
            config.open_links = v;
        }
        if let Some(v) = provider.get_parsed("capabilities.server_tools").await? {
            config.server_tools = v;
        }
        if let Some(v) = provider.get_parsed("capabilities.server_resources").await? {
            config.server_resources = v;
        }
        if let Some(v) = provider.get_parsed("capabilities.logging").await? {
            config.logging = v;
        }

        tracing::debug!(source = provider.name(), host = %config.host_name, "embed config loaded");
        Ok(config)
    }

    pub fn host_info(&self) -> HostInfo {
        HostInfo::new(&self.host_name, &self.host_version)
    }

    pub fn host_capabilities(&self) -> HostCapabilities {
        let offer = |enabled: bool| enabled.then_some(Capability {});
        HostCapabilities {
            open_links: offer(self.open_links),
            server_tools: offer(self.server_tools),
            server_resources: offer(self.server_resources),
            logging: offer(self.logging),
        }
    }

    pub fn host_context(&self) -> HostContext {
        HostContext::default().with_theme(self.theme)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout)
    }
}

fn timeout_millis(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn positive(key: &str, ms: u64) -> ConfigResult<u64> {
    if ms == 0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "timeout must be greater than zero".to_string(),
        });
    }
    Ok(ms)
}
