//! Layered configuration for embedding hosts.
//!
//! ```rust,no_run
//! use mcp_apps_host::config::{ConfigBuilder, EmbedConfig, MemoryConfigProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = ConfigBuilder::new()
//!     .env()
//!     .memory(MemoryConfigProvider::new().value("theme", "dark"))
//!     .build();
//! let config = EmbedConfig::load(&provider).await?;
//! # Ok(())
//! # }
//! ```

pub mod composite;
pub mod embed;
pub mod env;
pub mod memory;
pub mod provider;

pub use composite::CompositeConfigProvider;
pub use embed::EmbedConfig;
pub use env::EnvConfigProvider;
pub use memory::MemoryConfigProvider;
pub use provider::{ConfigProvider, ConfigProviderExt};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Environment error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("Provider error: {message}")]
    Provider { message: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Fluent assembly of a [`CompositeConfigProvider`]; providers added first
/// take precedence.
pub struct ConfigBuilder {
    providers: Vec<Box<dyn ConfigProvider>>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Environment variables under the default `MCP_APPS_` prefix.
    pub fn env(mut self) -> Self {
        self.providers.push(Box::new(EnvConfigProvider::new()));
        self
    }

    pub fn env_with_prefix(mut self, prefix: &str) -> Self {
        self.providers
            .push(Box::new(EnvConfigProvider::prefixed(prefix)));
        self
    }

    pub fn memory(mut self, provider: MemoryConfigProvider) -> Self {
        self.providers.push(Box::new(provider));
        self
    }

    pub fn provider(mut self, provider: Box<dyn ConfigProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn build(self) -> CompositeConfigProvider {
        let mut composite = CompositeConfigProvider::new();
        for provider in self.providers {
            composite.add_provider(provider);
        }
        composite
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::InvalidValue {
            key: "theme".to_string(),
            message: "unknown theme 'sepia'".to_string(),
        };
        assert!(err.to_string().contains("theme"));
        assert!(err.to_string().contains("sepia"));
    }

    #[tokio::test]
    async fn test_config_builder_order() {
        let provider = ConfigBuilder::new()
            .memory(MemoryConfigProvider::named("first").value("theme", "dark"))
            .memory(MemoryConfigProvider::named("second").value("theme", "light"))
            .build();

        assert_eq!(provider.provider_names(), vec!["first", "second"]);
        assert_eq!(
            provider.get_raw("theme").await.unwrap(),
            Some("dark".to_string())
        );
    }
}
