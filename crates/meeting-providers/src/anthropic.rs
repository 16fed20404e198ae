use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::adapter::ModelAdapter;
use crate::chat::{ChatEntry, ChatParameters, ChatResponse, ChatRole, StreamDelta};
use crate::error::{ProviderError, Result};

const API_VERSION: &str = "2023-06-01";

/// Anthropic Messages API adapter.
pub struct AnthropicAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl AnthropicAdapter {
    pub fn new(model: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: "https://api.anthropic.com".to_string(),
            model,
        }
    }

    fn build_body(&self, system_prompt: &str, conversation: &[ChatEntry], parameters: &ChatParameters, stream: bool) -> serde_json::Value {
        let messages: Vec<serde_json::Value> = conversation
            .iter()
            .filter(|e| e.role != ChatRole::System)
            .map(|e| {
                let role = if e.role == ChatRole::Assistant { "assistant" } else { "user" };
                serde_json::json!({ "role": role, "content": e.content })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "system": system_prompt,
            "messages": messages,
            "max_tokens": parameters.max_tokens.unwrap_or(4096),
            "stream": stream,
        });
        if let Some(t) = parameters.temperature {
            body["temperature"] = serde_json::json!(t);
        }
        if let Some(tp) = parameters.top_p {
            body["top_p"] = serde_json::json!(tp);
        }
        body
    }

    async fn dispatch(&self, body: &serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}/v1/messages", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
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
            warn!(status, body = %detail, "Anthropic API error");
            return Err(ProviderError::ProviderError { status, detail });
        }
        Ok(resp)
    }
}

#[async_trait]
impl ModelAdapter for AnthropicAdapter {
    fn provider_name(&self) -> &str {
        "anthropic"
    }

    async fn complete(
        &self,
        system_prompt: &str,
        conversation: &[ChatEntry],
        parameters: &ChatParameters,
    ) -> Result<ChatResponse> {
        let body = self.build_body(system_prompt, conversation, parameters, false);
        debug!(model = %self.model, "sending completion request to Anthropic");
        let resp = self.dispatch(&body).await?;
        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::ProviderError { status: 0, detail: e.to_string() })?;
        let content = api_resp
            .content
            .into_iter()
            .filter_map(|b| b.text)
            .collect::<Vec<_>>()
            .join("");
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

        let mut body = self.build_body(system_prompt, conversation, parameters, true);
        body["stream"] = serde_json::json!(true);
        debug!(model = %self.model, "sending streaming request to Anthropic");
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
                if let Ok(event) = serde_json::from_str::<StreamEventBody>(data) {
                    match event.event_type.as_str() {
                        "content_block_delta" => {
                            if let Some(delta) = event.delta {
                                if let Some(text) = delta.text {
                                    if !text.is_empty() && tx.send(StreamDelta::Content { text }).await.is_err() {
                                        return Ok(());
                                    }
                                }
                            }
                        }
                        "message_stop" => {
                            let _ = tx.send(StreamDelta::Complete).await;
                            return Ok(());
                        }
                        _ => {}
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
            "max_tokens": 1,
            "messages": [{ "role": "user", "content": "ping" }],
        });
        self.dispatch(&body).await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Deserialize)]
struct StreamEventBody {
    #[serde(rename = "type")]
    event_type: String,
    delta: Option<DeltaBody>,
}

#[derive(Deserialize)]
struct DeltaBody {
    text: Option<String>,
}
