//! Language model port.

use async_trait::async_trait;

use crate::error::ModelError;

/// A chat-style language model.
///
/// Implementations wrap specific providers and handle transport only;
/// prompting and response validation live in [`crate::ai`]. The caller
/// enforces its own timeout around `complete`.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one completion and return the raw response text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, ModelError>;
}
