use std::sync::Arc;

use meeting_core::limits::AGENT_NAME_MAX;
use meeting_core::types::{
    Agent, AgendaItem, AgendaItemId, Meeting, MeetingConfig, MindMap, Message, MinutesVersion, Moderator, Role,
};
use meeting_core::{AgentId, MeetingError, MeetingId, Result, RoundTableConfig};
use meeting_events::{EventHub, EventStream, MeetingEvent};
use meeting_providers::build_adapter;
use meeting_store::EntityStore;

use crate::coordinator::TurnCoordinator;
use crate::export::{export_meeting, export_mind_map, MeetingExportFormat, MindMapExportFormat};
use crate::meeting as meeting_ops;
use crate::minutes::generate_minutes as generate_minutes_impl;
use crate::mindmap::generate_mind_map as generate_mind_map_impl;
use crate::turn::TurnMode;

/// Facade over every consumer-facing operation. A thin layer that wires
/// `store`, `events`, and `coordinator` together and exposes a library API
/// rather than HTTP routes (an HTTP/WS front door is explicitly out of
/// scope here).
pub struct MeetingOrchestrator {
    store: Arc<dyn EntityStore>,
    events: Arc<EventHub>,
    coordinator: TurnCoordinator,
}

impl MeetingOrchestrator {
    pub fn new(store: Arc<dyn EntityStore>, events: Arc<EventHub>) -> Self {
        Self { store, events, coordinator: TurnCoordinator::new() }
    }

    // -- Agents --------------------------------------------------------

    pub fn create_agent(&self, name: &str, role: Role, model_config: meeting_core::types::ModelConfig) -> Result<Agent> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > AGENT_NAME_MAX {
            return Err(MeetingError::Validation(format!("agent name must be 1..{AGENT_NAME_MAX} characters")));
        }
        meeting_ops::validate_role(&role)?;
        let agent = Agent { id: AgentId::new(), name: name.to_string(), role, model_config };
        self.store.save_agent(&agent)?;
        Ok(agent)
    }

    pub fn get_agent(&self, id: &AgentId) -> Result<Agent> {
        self.store.load_agent(id)?.ok_or_else(|| MeetingError::NotFound(format!("agent {id}")))
    }

    pub fn list_agents(&self) -> Result<Vec<Agent>> {
        Ok(self.store.list_agents()?)
    }

    pub fn update_agent(&self, mut agent: Agent) -> Result<Agent> {
        if !self.store.exists_agent(&agent.id)? {
            return Err(MeetingError::NotFound(format!("agent {}", agent.id)));
        }
        agent.name = agent.name.trim().to_string();
        if agent.name.is_empty() || agent.name.chars().count() > AGENT_NAME_MAX {
            return Err(MeetingError::Validation(format!("agent name must be 1..{AGENT_NAME_MAX} characters")));
        }
        meeting_ops::validate_role(&agent.role)?;
        self.store.save_agent(&agent)?;
        Ok(agent)
    }

    /// Refuses deletion while the agent participates in any non-ended
    /// meeting — the Open Question decision recorded in `DESIGN.md`.
    pub fn delete_agent(&self, id: &AgentId) -> Result<()> {
        let live = self.store.count_live_meetings_referencing(id)?;
        if live > 0 {
            return Err(MeetingError::StateConflict(format!(
                "agent {id} is a participant in {live} non-ended meeting(s)"
            )));
        }
        Ok(self.store.delete_agent(id)?)
    }

    pub async fn test_agent_connection(&self, id: &AgentId) -> Result<()> {
        let agent = self.get_agent(id)?;
        let adapter = build_adapter(&agent.model_config);
        adapter.test_connection().await.map_err(MeetingError::from)
    }

    // -- Meetings: lifecycle --------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub fn create_meeting(
        &self,
        topic: &str,
        participant_ids: &[AgentId],
        moderator: Moderator,
        agenda: Vec<(String, String)>,
        config: MeetingConfig,
    ) -> Result<Meeting> {
        meeting_ops::validate_topic(topic)?;

        let mut participants = Vec::with_capacity(participant_ids.len());
        for id in participant_ids {
            participants.push(self.get_agent(id)?);
        }
        if let Moderator::Participant { id } = &moderator {
            if !participants.iter().any(|p| &p.id == id) {
                return Err(MeetingError::Validation(format!("moderator {id} is not a participant")));
            }
        }

        let now = chrono::Utc::now();
        let meeting = Meeting {
            id: MeetingId::new(),
            topic: topic.trim().to_string(),
            participants,
            moderator,
            status: meeting_core::types::MeetingStatus::Active,
            config,
            agenda: agenda
                .into_iter()
                .map(|(title, description)| AgendaItem { id: AgendaItemId::new(), title, description, completed: false, created_at: now })
                .collect(),
            messages: Vec::new(),
            current_round: 0,
            minutes_history: Vec::new(),
            current_minutes: None,
            mind_map: None,
            created_at: now,
            updated_at: now,
        };

        self.store.save_meeting(&meeting)?;
        Ok(meeting)
    }

    pub fn get_meeting(&self, id: &MeetingId) -> Result<Meeting> {
        self.store.load_meeting(id)?.ok_or_else(|| MeetingError::NotFound(format!("meeting {id}")))
    }

    pub fn list_meetings(&self) -> Result<Vec<Meeting>> {
        Ok(self.store.list_meetings()?)
    }

    /// Cancels in-flight work, drops the coordinator lock entry, then
    /// deletes the meeting document.
    pub fn delete_meeting(&self, id: &MeetingId) -> Result<()> {
        self.coordinator.cancel(id);
        self.coordinator.forget(id);
        self.events.remove(id);
        Ok(self.store.delete_meeting(id)?)
    }

    /// Publishes [`MeetingEvent::StatusChange`] only once the transition
    /// has survived `save_meeting` — an event that reaches a subscriber
    /// must describe state that is actually in the store (see
    /// `advance_round_if_complete`'s contract).
    pub fn start_meeting(&self, id: &MeetingId) -> Result<Meeting> {
        let (meeting, changed) = self.mutate(id, |meeting| meeting_ops::start(meeting))?;
        if changed {
            self.events.publish(id, MeetingEvent::StatusChange { status: meeting_core::types::MeetingStatus::Active });
        }
        Ok(meeting)
    }

    pub fn pause_meeting(&self, id: &MeetingId) -> Result<Meeting> {
        let (meeting, changed) = self.mutate(id, |meeting| meeting_ops::pause(meeting))?;
        if changed {
            self.events.publish(id, MeetingEvent::StatusChange { status: meeting_core::types::MeetingStatus::Paused });
        }
        Ok(meeting)
    }

    pub fn end_meeting(&self, id: &MeetingId) -> Result<Meeting> {
        let (meeting, changed) = self.mutate(id, |meeting| meeting_ops::end(meeting))?;
        if changed {
            self.events.publish(id, MeetingEvent::StatusChange { status: meeting_core::types::MeetingStatus::Ended });
        }
        self.coordinator.cancel(id);
        Ok(meeting)
    }

    pub fn add_user_message(&self, id: &MeetingId, content: &str) -> Result<Message> {
        let (_, message) = self.mutate(id, |meeting| meeting_ops::add_user_message(meeting, content))?;
        self.events.publish(id, MeetingEvent::NewMessage { message_id: message.id.clone() });
        Ok(message)
    }

    pub fn add_agenda_item(&self, id: &MeetingId, title: &str, description: &str) -> Result<AgendaItem> {
        let (_, item) = self.mutate(id, |meeting| meeting_ops::add_agenda_item(meeting, title, description))?;
        Ok(item)
    }

    pub fn mark_agenda_completed(&self, id: &MeetingId, item_id: &AgendaItemId) -> Result<()> {
        self.mutate(id, |meeting| meeting_ops::mark_agenda_completed(meeting, item_id)).map(|_| ())
    }

    pub fn remove_agenda_item(&self, id: &MeetingId, item_id: &AgendaItemId) -> Result<()> {
        self.mutate(id, |meeting| meeting_ops::remove_agenda_item(meeting, item_id)).map(|_| ())
    }

    /// Runs `f` over the current document and persists the result before
    /// returning — the single commit point every lifecycle operation goes
    /// through. Callers publish events themselves afterward, using `f`'s
    /// return value to decide whether anything subscriber-visible changed.
    fn mutate<T>(&self, id: &MeetingId, f: impl FnOnce(&mut Meeting) -> Result<T>) -> Result<(Meeting, T)> {
        let mut meeting = self.get_meeting(id)?;
        let value = f(&mut meeting)?;
        self.store.save_meeting(&meeting)?;
        Ok((meeting, value))
    }

    // -- Meetings: turn execution -----------------------------------------

    pub async fn request_turn(&self, id: &MeetingId, agent_id: &AgentId, mode: TurnMode) -> Result<Message> {
        let meeting = self.get_meeting(id)?;
        let speaker = meeting.participant(agent_id).ok_or_else(|| MeetingError::NotFound(format!("participant {agent_id}")))?;
        let adapter = build_adapter(&speaker.model_config);
        let outcome = self.coordinator.request_turn(self.store.as_ref(), &self.events, id, agent_id, mode, adapter.as_ref()).await?;
        Ok(outcome.message)
    }

    pub async fn run_round(&self, id: &MeetingId, mode: TurnMode) -> Result<Vec<Message>> {
        // Snapshot each participant's model config up front so the
        // per-turn adapter resolver (called once per chain hop, possibly
        // against agents added after this round started) doesn't need its
        // own store handle.
        let meeting = self.get_meeting(id)?;
        let configs: std::collections::HashMap<AgentId, meeting_core::types::ModelConfig> =
            meeting.participants.iter().map(|p| (p.id.clone(), p.model_config.clone())).collect();

        let outcomes = self
            .coordinator
            .run_round(self.store.as_ref(), &self.events, id, mode, move |agent_id| {
                build_adapter(configs.get(agent_id).expect("chain only selects known participants"))
            })
            .await?;
        Ok(outcomes.into_iter().map(|o| o.message).collect())
    }

    // -- Meetings: minutes & mind-map --------------------------------------

    pub async fn generate_minutes(&self, id: &MeetingId, generator_id: Option<&AgentId>) -> Result<MinutesVersion> {
        let mut meeting = self.get_meeting(id)?;
        let speaker_id = self.resolve_generator(&meeting, generator_id)?;
        let speaker = meeting.participant(&speaker_id).ok_or_else(|| MeetingError::NotFound(format!("participant {speaker_id}")))?.clone();
        let adapter = build_adapter(&speaker.model_config);
        let minutes = generate_minutes_impl(&mut meeting, adapter.as_ref(), Some(&speaker_id), speaker_id.as_str()).await?;
        self.store.save_meeting(&meeting)?;
        self.events.publish(id, MeetingEvent::MinutesGenerated { version: minutes.id.clone() });
        Ok(minutes)
    }

    /// Replace the minutes content directly, with no model call. Appends a
    /// new version rather than mutating history in place, preserving the
    /// monotonic-version invariant.
    pub fn update_minutes(&self, id: &MeetingId, content: &str, editor_id: &str) -> Result<MinutesVersion> {
        let mut meeting = self.get_meeting(id)?;
        let version = meeting.minutes_history.iter().map(|v| v.version).max().unwrap_or(0) + 1;
        let minutes = MinutesVersion {
            id: meeting_core::types::MinutesVersionId::new(),
            version,
            content: content.to_string(),
            summary: content.to_string(),
            key_decisions: Vec::new(),
            action_items: Vec::new(),
            created_at: chrono::Utc::now(),
            created_by: editor_id.to_string(),
        };
        meeting.minutes_history.push(minutes.clone());
        meeting.current_minutes = Some(minutes.id.clone());
        meeting.updated_at = minutes.created_at;
        self.store.save_meeting(&meeting)?;
        Ok(minutes)
    }

    pub fn minutes_history(&self, id: &MeetingId) -> Result<Vec<MinutesVersion>> {
        Ok(self.get_meeting(id)?.minutes_history)
    }

    pub async fn generate_mind_map(&self, id: &MeetingId, generator_id: Option<&AgentId>) -> Result<MindMap> {
        let mut meeting = self.get_meeting(id)?;
        let speaker_id = self.resolve_generator(&meeting, generator_id)?;
        let speaker = meeting.participant(&speaker_id).ok_or_else(|| MeetingError::NotFound(format!("participant {speaker_id}")))?.clone();
        let adapter = build_adapter(&speaker.model_config);
        let mind_map = generate_mind_map_impl(&mut meeting, adapter.as_ref(), Some(&speaker_id), speaker_id.as_str()).await?;
        self.store.save_meeting(&meeting)?;
        self.events.publish(id, MeetingEvent::MindMapGenerated { version: mind_map.id.clone() });
        Ok(mind_map)
    }

    pub fn update_mind_map(&self, id: &MeetingId, mind_map: MindMap) -> Result<()> {
        let mut meeting = self.get_meeting(id)?;
        meeting.mind_map = Some(mind_map);
        meeting.updated_at = chrono::Utc::now();
        self.store.save_meeting(&meeting)?;
        Ok(())
    }

    fn resolve_generator(&self, meeting: &Meeting, generator_id: Option<&AgentId>) -> Result<AgentId> {
        if let Some(id) = generator_id {
            return Ok(id.clone());
        }
        if let Moderator::Participant { id } = &meeting.moderator {
            return Ok(id.clone());
        }
        meeting
            .participants
            .first()
            .map(|p| p.id.clone())
            .ok_or_else(|| MeetingError::Validation("meeting has no participants to generate with".to_string()))
    }

    // -- Export & events ---------------------------------------------------

    pub fn export(&self, id: &MeetingId, format: MeetingExportFormat) -> Result<String> {
        export_meeting(&self.get_meeting(id)?, format)
    }

    pub fn export_mind_map(&self, id: &MeetingId, format: MindMapExportFormat) -> Result<Vec<u8>> {
        let meeting = self.get_meeting(id)?;
        let mind_map = meeting.mind_map.ok_or_else(|| MeetingError::NotFound(format!("mind map for meeting {id}")))?;
        export_mind_map(&mind_map, format)
    }

    pub fn subscribe_events(&self, id: &MeetingId) -> EventStream {
        self.events.subscribe(id)
    }
}
