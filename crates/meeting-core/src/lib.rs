pub mod config;
pub mod error;
pub mod ids;
pub mod limits;
pub mod types;

pub use config::RoundTableConfig;
pub use error::{MeetingError, Result};
pub use ids::{AgendaItemId, AgentId, MeetingId, MessageId, MindMapId, MindMapNodeId, MinutesVersionId};
pub use types::*;
