//! Text generation collaborator

use async_trait::async_trait;

use crate::{Result, Transcript};

/// Hosted AI text-generation service
///
/// How the call is transported, cached or rate-limited is the
/// implementation's business. The returned text may contain at most one
/// field-update marker block.
///
/// # Example
///
/// ```ignore
/// let generator: Arc<dyn TextGenerator> = Arc::new(ScriptedGenerator::new(script));
/// let reply = generator.generate(&prompt, &transcript).await?;
/// ```
#[async_trait]
pub trait TextGenerator: Send + Sync + 'static {
    /// Generate the next assistant message
    ///
    /// # Arguments
    /// * `prompt` - System/instruction prompt for this turn
    /// * `transcript` - Conversation so far (read-only)
    async fn generate(&self, prompt: &str, transcript: &Transcript) -> Result<String>;

    /// Get model name for logging
    fn model_name(&self) -> &str;
}
