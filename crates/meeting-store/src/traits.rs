use meeting_core::{Agent, AgentId, Meeting, MeetingId};

use crate::error::Result;

/// Durable load/save/delete of [`Agent`]s and [`Meeting`]s as opaque
/// documents.
///
/// Implementations must guarantee that a successful `save` followed by a
/// `load` returns an equivalent entity under deep structural equality of
/// every field, and that `save_meeting` is atomic per meeting (a reader
/// sees the pre-save or post-save snapshot, never a torn one). Concurrent
/// saves of the *same* meeting are expected to be serialized by the caller
/// (the turn coordinator) — this trait does not itself lock across calls.
pub trait EntityStore: Send + Sync {
    fn save_agent(&self, agent: &Agent) -> Result<()>;
    fn load_agent(&self, id: &AgentId) -> Result<Option<Agent>>;
    fn list_agents(&self) -> Result<Vec<Agent>>;
    fn delete_agent(&self, id: &AgentId) -> Result<()>;

    fn save_meeting(&self, meeting: &Meeting) -> Result<()>;
    fn load_meeting(&self, id: &MeetingId) -> Result<Option<Meeting>>;
    fn list_meetings(&self) -> Result<Vec<Meeting>>;
    fn delete_meeting(&self, id: &MeetingId) -> Result<()>;

    /// Number of meetings, not in `Ended` status, whose `participants`
    /// include `agent_id`. Used to refuse agent deletion while it is
    /// referenced by a live meeting.
    fn count_live_meetings_referencing(&self, agent_id: &AgentId) -> Result<usize>;

    fn exists_agent(&self, id: &AgentId) -> Result<bool> {
        Ok(self.load_agent(id)?.is_some())
    }

    fn exists_meeting(&self, id: &MeetingId) -> Result<bool> {
        Ok(self.load_meeting(id)?.is_some())
    }
}
