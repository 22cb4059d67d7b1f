use async_trait::async_trait;

use crate::remote::McpResult;

/// Reads a UI resource by identifier.
///
/// The payload is returned as-is: a JSON envelope or bare markup.
#[async_trait]
pub trait ResourceReader: Send + Sync {
    async fn read(&self, uri: &str) -> McpResult<String>;
}

/// What happened to one delivered read result.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Stored for the current target.
    Applied { uri: String },
    /// Arrived for an identifier that is no longer the target.
    Discarded { uri: String },
    /// The read failed for the current target.
    Failed { uri: String, reason: String },
}
