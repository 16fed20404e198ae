use meeting_core::{AgentId, MeetingId, MeetingStatus, MessageId, MindMapId, MinutesVersionId};
use serde::{Deserialize, Serialize};

/// Kind of an in-flight streaming delta — mirrors
/// `meeting_providers::StreamDelta` without creating a dependency on that
/// crate (the hub only needs to describe deltas, not produce them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaKind {
    Reasoning,
    Content,
    Complete,
    Error,
}

/// One broadcastable event, covering lifecycle transitions, persisted
/// messages, streaming deltas, and generated artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MeetingEvent {
    NewMessage { message_id: MessageId },
    StatusChange { status: MeetingStatus },
    StreamingDelta { speaker_id: AgentId, kind: DeltaKind, text: String },
    MinutesGenerated { version: MinutesVersionId },
    MindMapGenerated { version: MindMapId },
    TurnFailed { speaker_id: AgentId, classification: String },
    PersistenceFailed { detail: String },
    /// Not part of the producer-side event set — synthesized by
    /// [`crate::hub::EventStream`] when the underlying
    /// `tokio::sync::broadcast::Receiver` reports `Lagged`, so a slow
    /// subscriber gets an explicit terminal event instead of silently
    /// missing history.
    Lagged { meeting_id: MeetingId, skipped: u64 },
}
