use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::chat::{ChatEntry, ChatParameters, ChatResponse, StreamDelta};
use crate::error::Result;

/// Common interface implemented by every model provider (OpenAI, Anthropic,
/// Google, GLM): non-streaming completion, streaming completion, and a
/// `(content, reasoning_content)` response shape shared across all of them.
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    /// Provider name for logging — e.g. `"anthropic"`.
    fn provider_name(&self) -> &str;

    /// Non-streaming chat completion.
    async fn complete(
        &self,
        system_prompt: &str,
        conversation: &[ChatEntry],
        parameters: &ChatParameters,
    ) -> Result<ChatResponse>;

    /// Stream response deltas through `tx`. The sequence is finite,
    /// terminated by `StreamDelta::Complete` or `StreamDelta::Error`.
    ///
    /// Default falls back to `complete`, emitting one `Content` delta
    /// followed by `Complete`, for adapters that don't implement true
    /// token-level streaming.
    async fn stream(
        &self,
        system_prompt: &str,
        conversation: &[ChatEntry],
        parameters: &ChatParameters,
        tx: mpsc::Sender<StreamDelta>,
    ) -> Result<()> {
        let resp = self.complete(system_prompt, conversation, parameters).await?;
        if let Some(reasoning) = resp.reasoning_content {
            let _ = tx.send(StreamDelta::Reasoning { text: reasoning }).await;
        }
        let _ = tx.send(StreamDelta::Content { text: resp.content }).await;
        let _ = tx.send(StreamDelta::Complete).await;
        Ok(())
    }

    /// Connectivity probe — a cheap request that validates credentials
    /// without generating a full completion.
    async fn test_connection(&self) -> Result<()>;
}
