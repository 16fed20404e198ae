use std::sync::Arc;

use meeting_core::types::{ModelConfig, Provider};

use crate::adapter::ModelAdapter;
use crate::anthropic::AnthropicAdapter;
use crate::glm::GlmAdapter;
use crate::google::GoogleAdapter;
use crate::openai::OpenAiAdapter;

/// Builds the right [`ModelAdapter`] for an agent's [`ModelConfig`]: one
/// adapter per provider tag, selected by a straightforward match on
/// `config.provider`.
pub fn build_adapter(config: &ModelConfig) -> Arc<dyn ModelAdapter> {
    match config.provider {
        Provider::Openai => Arc::new(OpenAiAdapter::new(config.model_name.clone(), config.credential.clone())),
        Provider::Anthropic => Arc::new(AnthropicAdapter::new(config.model_name.clone(), config.credential.clone())),
        Provider::Google => Arc::new(GoogleAdapter::new(config.model_name.clone(), config.credential.clone())),
        Provider::Glm => Arc::new(GlmAdapter::new(config.model_name.clone(), config.credential.clone())),
    }
}
