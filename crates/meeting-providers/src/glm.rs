use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::adapter::ModelAdapter;
use crate::chat::{ChatEntry, ChatParameters, ChatResponse, StreamDelta};
use crate::error::Result;
use crate::openai::OpenAiAdapter;

/// GLM (Zhipu AI) speaks the same chat-completions wire format as OpenAI —
/// a `/v4/chat/completions` path with identical request/response shape, so
/// this adapter is a thin wrapper rather than a reimplementation.
pub struct GlmAdapter {
    inner: OpenAiAdapter,
}

impl GlmAdapter {
    pub fn new(model: String, api_key: String) -> Self {
        Self {
            inner: OpenAiAdapter::with_endpoint(
                "glm",
                model,
                api_key,
                "https://open.bigmodel.cn/api/paas".to_string(),
                "/v4/chat/completions".to_string(),
            ),
        }
    }
}

#[async_trait]
impl ModelAdapter for GlmAdapter {
    fn provider_name(&self) -> &str {
        "glm"
    }

    async fn complete(
        &self,
        system_prompt: &str,
        conversation: &[ChatEntry],
        parameters: &ChatParameters,
    ) -> Result<ChatResponse> {
        self.inner.complete(system_prompt, conversation, parameters).await
    }

    async fn stream(
        &self,
        system_prompt: &str,
        conversation: &[ChatEntry],
        parameters: &ChatParameters,
        tx: mpsc::Sender<StreamDelta>,
    ) -> Result<()> {
        self.inner.stream(system_prompt, conversation, parameters, tx).await
    }

    async fn test_connection(&self) -> Result<()> {
        self.inner.test_connection().await
    }
}
