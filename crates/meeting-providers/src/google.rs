use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::adapter::ModelAdapter;
use crate::chat::{ChatEntry, ChatParameters, ChatResponse, ChatRole, StreamDelta};
use crate::error::{ProviderError, Result};

/// Google Gemini `generateContent` adapter. Gemini has no persistent
/// Bearer/x-api-key header — the key rides as a query parameter, and
/// `system_instruction` is a top-level request field rather than a message.
pub struct GoogleAdapter {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GoogleAdapter {
    pub fn new(model: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model,
        }
    }

    fn build_body(&self, system_prompt: &str, conversation: &[ChatEntry], parameters: &ChatParameters) -> serde_json::Value {
        let contents: Vec<serde_json::Value> = conversation
            .iter()
            .filter(|e| e.role != ChatRole::System)
            .map(|e| {
                let role = if e.role == ChatRole::Assistant { "model" } else { "user" };
                serde_json::json!({ "role": role, "parts": [{ "text": e.content }] })
            })
            .collect();

        let mut generation_config = serde_json::json!({});
        if let Some(t) = parameters.temperature {
            generation_config["temperature"] = serde_json::json!(t);
        }
        if let Some(mt) = parameters.max_tokens {
            generation_config["maxOutputTokens"] = serde_json::json!(mt);
        }
        if let Some(tp) = parameters.top_p {
            generation_config["topP"] = serde_json::json!(tp);
        }

        serde_json::json!({
            "contents": contents,
            "system_instruction": { "parts": [{ "text": system_prompt }] },
            "generationConfig": generation_config,
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}?key={}",
            self.base_url, self.model, method, self.api_key
        )
    }

    async fn dispatch(&self, method: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        let resp = self
            .client
            .post(self.endpoint(method))
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 401 || status == 403 {
            return Err(ProviderError::AuthError(resp.text().await.unwrap_or_default()));
        }
        if status == 429 {
            return Err(ProviderError::RateLimitError { retry_after_ms: 5000 });
        }
        if !resp.status().is_success() {
            let detail = resp.text().await.unwrap_or_default();
            warn!(status, body = %detail, "Google API error");
            return Err(ProviderError::ProviderError { status, detail });
        }
        Ok(resp)
    }
}

#[async_trait]
impl ModelAdapter for GoogleAdapter {
    fn provider_name(&self) -> &str {
        "google"
    }

    async fn complete(
        &self,
        system_prompt: &str,
        conversation: &[ChatEntry],
        parameters: &ChatParameters,
    ) -> Result<ChatResponse> {
        let body = self.build_body(system_prompt, conversation, parameters);
        debug!(model = %self.model, "sending completion request to Google");
        let resp = self.dispatch("generateContent", &body).await?;
        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::ProviderError { status: 0, detail: e.to_string() })?;
        let content = api_resp
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        Ok(ChatResponse { content, reasoning_content: None })
    }

    // Google's streaming endpoint (`streamGenerateContent`) returns a JSON
    // array rather than SSE; the default `complete`-then-synthesize-deltas
    // fallback on `ModelAdapter::stream` covers it without a bespoke parser.

    async fn test_connection(&self) -> Result<()> {
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": "ping" }] }],
            "generationConfig": { "maxOutputTokens": 1 },
        });
        self.dispatch("generateContent", &body).await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}
