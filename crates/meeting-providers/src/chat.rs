use serde::{Deserialize, Serialize};

/// One entry in the conversation passed to a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEntry {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// Sampling parameters, taken from `Agent::model_config.parameters`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatParameters {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

/// Non-streaming response from `ModelAdapter::complete`.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub reasoning_content: Option<String>,
}

/// One element of a streaming response.
///
/// The sequence is finite, terminated by `Complete` or `Error`, and is not
/// restartable. `Reasoning` is a distinct variant from `Content` so a
/// model's chain-of-thought and its final answer are separately observable
/// by subscribers.
#[derive(Debug, Clone)]
pub enum StreamDelta {
    Reasoning { text: String },
    Content { text: String },
    Complete,
    Error { message: String },
}
