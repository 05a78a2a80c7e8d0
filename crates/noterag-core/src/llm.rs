//! LLM completion capability.

use anyhow::Result;
use async_trait::async_trait;

/// A chat-style completion backend.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider identifier for logs (e.g. `"openai:gpt-3.5-turbo"`).
    fn name(&self) -> &str;

    /// Run one completion with a system instruction and a user turn.
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Cheap reachability probe. Must not error; failures return `false`.
    async fn check_availability(&self) -> bool;
}
