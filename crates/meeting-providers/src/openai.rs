use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::adapter::ModelAdapter;
use crate::chat::{ChatEntry, ChatParameters, ChatResponse, ChatRole, StreamDelta};
use crate::error::{ProviderError, Result};

/// OpenAI-compatible chat completions adapter. Also backs GLM, whose API is
/// a drop-in OpenAI-shaped endpoint with its own `base_url`/`chat_path` but
/// the same wire format, so `GlmAdapter` wraps this type instead of
/// duplicating it.
pub struct OpenAiAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    chat_path: String,
    model: String,
    provider_name: &'static str,
}

impl OpenAiAdapter {
    pub fn new(model: String, api_key: String) -> Self {
        Self::with_endpoint(
            "openai",
            model,
            api_key,
            "https://api.openai.com".to_string(),
            "/v1/chat/completions".to_string(),
        )
    }

    pub fn with_endpoint(
        provider_name: &'static str,
        model: String,
        api_key: String,
        base_url: String,
        chat_path: String,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url,
            chat_path,
            model,
            provider_name,
        }
    }

    fn build_body(&self, system_prompt: &str, conversation: &[ChatEntry], parameters: &ChatParameters, stream: bool) -> serde_json::Value {
        let mut messages = vec![serde_json::json!({ "role": "system", "content": system_prompt })];
        for entry in conversation {
            let role = match entry.role {
                ChatRole::User => "user",
                ChatRole::Assistant => "assistant",
                ChatRole::System => "system",
            };
            messages.push(serde_json::json!({ "role": role, "content": entry.content }));
        }
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
        });
        if let Some(t) = parameters.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        if let Some(mt) = parameters.max_tokens {
            body["max_tokens"] = serde_json::json!(mt);
        }
        if let Some(tp) = parameters.top_p {
            body["top_p"] = serde_json::json!(tp);
        }
        body
    }

    async fn dispatch(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, self.chat_path);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthError(resp.text().await.unwrap_or_default()));
        }
        if status == 429 {
            let retry_after_ms = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|s| s * 1000)
                .unwrap_or(5000);
            return Err(ProviderError::RateLimitError { retry_after_ms });
        }
        if !resp.status().is_success() {
            let detail = resp.text().await.unwrap_or_default();
            warn!(status, provider = self.provider_name, body = %detail, "provider error");
            return Err(ProviderError::ProviderError { status, detail });
        }
        Ok(resp)
    }
}

#[async_trait]
impl ModelAdapter for OpenAiAdapter {
    fn provider_name(&self) -> &str {
        self.provider_name
    }

    async fn complete(
        &self,
        system_prompt: &str,
        conversation: &[ChatEntry],
        parameters: &ChatParameters,
    ) -> Result<ChatResponse> {
        let body = self.build_body(system_prompt, conversation, parameters, false);
        debug!(model = %self.model, provider = self.provider_name, "sending completion request");
        let resp = self.dispatch(&body).await?;
        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::ProviderError { status: 0, detail: e.to_string() })?;
        let content = api_resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        Ok(ChatResponse { content, reasoning_content: None })
    }

    async fn stream(
        &self,
        system_prompt: &str,
        conversation: &[ChatEntry],
        parameters: &ChatParameters,
        tx: mpsc::Sender<StreamDelta>,
    ) -> Result<()> {
        use futures_util::StreamExt;

        let body = self.build_body(system_prompt, conversation, parameters, true);
        debug!(model = %self.model, provider = self.provider_name, "sending streaming request");
        let resp = self.dispatch(&body).await?;

        let mut byte_stream = resp.bytes_stream();
        let mut line_buf = String::new();

        while let Some(chunk) = byte_stream.next().await {
            let chunk = match chunk {
                Ok(c) => c,
                Err(e) => {
                    let _ = tx.send(StreamDelta::Error { message: e.to_string() }).await;
                    return Err(ProviderError::NetworkError(e.to_string()));
                }
            };
            let text = match std::str::from_utf8(&chunk) {
                Ok(t) => t,
                Err(_) => continue,
            };
            line_buf.push_str(text);
            let lines: Vec<&str> = line_buf.split('\n').collect();
            let (complete, remainder) = lines.split_at(lines.len() - 1);
            let remainder = remainder.first().unwrap_or(&"").to_string();

            for line in complete {
                let line = line.trim();
                let Some(data) = line.strip_prefix("data: ") else { continue };
                if data == "[DONE]" {
                    let _ = tx.send(StreamDelta::Complete).await;
                    return Ok(());
                }
                if let Ok(chunk_resp) = serde_json::from_str::<StreamChunk>(data) {
                    for choice in chunk_resp.choices {
                        if let Some(content) = choice.delta.content {
                            if !content.is_empty() && tx.send(StreamDelta::Content { text: content }).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                }
            }
            line_buf = remainder;
        }
        let _ = tx.send(StreamDelta::Complete).await;
        Ok(())
    }

    async fn test_connection(&self) -> Result<()> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": "ping" }],
            "max_tokens": 1,
        });
        self.dispatch(&body).await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDeltaBody,
}

#[derive(Deserialize)]
struct StreamDeltaBody {
    content: Option<String>,
}
