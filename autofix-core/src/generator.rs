use anyhow::Result;
use async_trait::async_trait;

use crate::fence::strip_fences;
use crate::language::Language;

/// Capability interface over a single-shot text generation model.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    /// Send `prompt` once and return the raw response text.
    async fn complete(&self, correlation_id: Option<&str>, prompt: &str) -> Result<String>;

    /// [`CodeGenerator::complete`] followed by fence stripping.
    ///
    /// The result is not parsed or otherwise validated as source code.
    async fn generate_code(
        &self,
        correlation_id: Option<&str>,
        prompt: &str,
        language: &Language,
    ) -> Result<String> {
        let raw = self.complete(correlation_id, prompt).await?;
        Ok(strip_fences(&raw, language.fence_tag))
    }
}
