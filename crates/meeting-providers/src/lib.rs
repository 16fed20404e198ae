pub mod adapter;
pub mod anthropic;
pub mod chat;
pub mod error;
pub mod factory;
pub mod glm;
pub mod google;
pub mod openai;
pub mod retry;

pub use adapter::ModelAdapter;
pub use chat::{ChatEntry, ChatParameters, ChatResponse, ChatRole, StreamDelta};
pub use error::{ProviderError, Result};
pub use factory::build_adapter;
