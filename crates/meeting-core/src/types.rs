use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AgendaItemId, AgentId, MeetingId, MessageId, MindMapId, MindMapNodeId, MinutesVersionId};

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// Identity + model configuration for one AI participant.
///
/// Created and owned by the agent-management surface (out of scope here);
/// meetings reference agents by id but capture an immutable snapshot of the
/// agent at meeting-creation time (see [`Participant`]), so later edits to
/// the live `Agent` never retroactively change a meeting already in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub role: Role,
    pub model_config: ModelConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub description: String,
    pub system_prompt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Openai,
    Anthropic,
    Google,
    Glm,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: Provider,
    pub model_name: String,
    pub credential: String,
    #[serde(default)]
    pub parameters: Option<ModelParameters>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

/// A snapshot of an [`Agent`] captured when it joins a meeting.
///
/// This is what `Meeting::participants` actually stores — editing or
/// deleting the live agent afterward has no effect on meetings already
/// referencing this snapshot.
pub type Participant = Agent;

// ---------------------------------------------------------------------------
// Meeting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Active,
    Paused,
    Ended,
}

/// Either the human user or a participant, wherever both are valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Moderator {
    User,
    Participant { id: AgentId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakingOrder {
    Sequential,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscussionStyle {
    Formal,
    Casual,
    Debate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakingLength {
    Brief,
    Moderate,
    Detailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingConfig {
    pub max_rounds: Option<u32>,
    pub max_message_length: Option<usize>,
    pub speaking_order: SpeakingOrder,
    pub discussion_style: DiscussionStyle,
    #[serde(default)]
    pub speaking_length_preferences: HashMap<AgentId, SpeakingLength>,
    pub minutes_prompt: Option<String>,
}

impl Default for MeetingConfig {
    fn default() -> Self {
        Self {
            max_rounds: None,
            max_message_length: None,
            speaking_order: SpeakingOrder::Sequential,
            discussion_style: DiscussionStyle::Formal,
            speaking_length_preferences: HashMap::new(),
            minutes_prompt: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgendaItem {
    pub id: AgendaItemId,
    pub title: String,
    pub description: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerType {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub mentioned_participant_id: AgentId,
    pub mentioned_participant_name: String,
    pub message_id: MessageId,
}

/// One immutable utterance. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub speaker_id: Option<AgentId>,
    pub speaker_name: String,
    pub speaker_type: SpeakerType,
    pub content: String,
    pub reasoning_content: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub round_number: u32,
    pub mentions: Vec<Mention>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinutesVersion {
    pub id: MinutesVersionId,
    pub version: u32,
    pub content: String,
    pub summary: String,
    pub key_decisions: Vec<String>,
    pub action_items: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// `"user"` or a participant id, serialized as a plain string.
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindMapNode {
    pub id: MindMapNodeId,
    pub content: String,
    pub level: u32,
    pub parent_id: Option<MindMapNodeId>,
    pub children_ids: Vec<MindMapNodeId>,
    pub message_references: Vec<MessageId>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MindMap {
    pub id: MindMapId,
    pub meeting_id: MeetingId,
    pub root_node: MindMapNodeId,
    pub nodes: HashMap<MindMapNodeId, MindMapNode>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: MeetingId,
    pub topic: String,
    pub participants: Vec<Participant>,
    pub moderator: Moderator,
    pub status: MeetingStatus,
    pub config: MeetingConfig,
    pub agenda: Vec<AgendaItem>,
    pub messages: Vec<Message>,
    pub current_round: u32,
    pub minutes_history: Vec<MinutesVersion>,
    pub current_minutes: Option<MinutesVersionId>,
    pub mind_map: Option<MindMap>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    /// Look up a participant snapshot by id.
    pub fn participant(&self, id: &AgentId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.id == id)
    }

    /// The [`MinutesVersion`] referenced by `current_minutes`, if any.
    pub fn current_minutes_version(&self) -> Option<&MinutesVersion> {
        let id = self.current_minutes.as_ref()?;
        self.minutes_history.iter().find(|v| &v.id == id)
    }

    /// Display name for the moderator, for prompt composition.
    pub fn moderator_name(&self) -> String {
        match &self.moderator {
            Moderator::User => "user".to_string(),
            Moderator::Participant { id } => self
                .participant(id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| id.to_string()),
        }
    }

    /// Whether `agent_id` is the meeting's moderator (not the user).
    pub fn is_agent_moderator(&self, agent_id: &AgentId) -> bool {
        matches!(&self.moderator, Moderator::Participant { id } if id == agent_id)
    }
}
