use std::sync::Arc;

use dashmap::DashMap;
use meeting_core::types::MeetingStatus;
use meeting_core::{AgentId, MeetingError, MeetingId, Result, RoundTableConfig};
use meeting_events::EventHub;
use meeting_providers::ModelAdapter;
use meeting_store::EntityStore;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::selector::{select_next_speakers, SelectionMode};
use crate::turn::{execute_turn, TurnMode, TurnOutcome};

/// Coordinates turn execution across meetings: one mutex per meeting id, so
/// turns against different meetings run fully in parallel while turns
/// against the same meeting serialize.
///
/// The in-flight turn's cancellation token is tracked in a map of its own,
/// separate from `locks` — `cancel()` must be able to reach it without
/// acquiring the per-meeting mutex, since that mutex is held for the entire
/// duration of the turn it would need to cancel.
pub struct TurnCoordinator {
    locks: DashMap<MeetingId, Arc<Mutex<()>>>,
    cancel_tokens: DashMap<MeetingId, CancellationToken>,
    config: Arc<RoundTableConfig>,
}

impl Default for TurnCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnCoordinator {
    pub fn new() -> Self {
        Self::with_config(Arc::new(RoundTableConfig::default()))
    }

    /// Build a coordinator whose chain depth comes from `config` instead of
    /// [`RoundTableConfig::default`] — the way a host application wires in
    /// its loaded `RoundTableConfig`.
    pub fn with_config(config: Arc<RoundTableConfig>) -> Self {
        Self { locks: DashMap::new(), cancel_tokens: DashMap::new(), config }
    }

    fn lock_for(&self, meeting_id: &MeetingId) -> Arc<Mutex<()>> {
        self.locks.entry(meeting_id.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Run a single turn for `speaker_id`, holding the per-meeting lock for
    /// the full duration. Does not chain — use [`Self::run_round`] for
    /// auto-response.
    pub async fn request_turn(
        &self,
        store: &dyn EntityStore,
        events: &EventHub,
        meeting_id: &MeetingId,
        speaker_id: &AgentId,
        mode: TurnMode,
        adapter: &dyn ModelAdapter,
    ) -> Result<TurnOutcome> {
        let lock = self.lock_for(meeting_id);
        let _guard = lock.lock().await;
        let cancel = CancellationToken::new();
        self.cancel_tokens.insert(meeting_id.clone(), cancel.clone());

        let result = execute_turn(store, events, meeting_id, speaker_id, mode, adapter, &cancel, &self.config).await;
        self.cancel_tokens.remove(meeting_id);
        result
    }

    /// Run one full round, auto-chaining on mentions up to the
    /// coordinator's configured chain depth. `resolve_adapter` maps a
    /// speaker id to the model adapter to use for that speaker's turn.
    pub async fn run_round<'a, F>(
        &self,
        store: &dyn EntityStore,
        events: &EventHub,
        meeting_id: &MeetingId,
        mode: TurnMode,
        resolve_adapter: F,
    ) -> Result<Vec<TurnOutcome>>
    where
        F: Fn(&AgentId) -> Arc<dyn ModelAdapter> + 'a,
    {
        let lock = self.lock_for(meeting_id);
        let _guard = lock.lock().await;
        let cancel = CancellationToken::new();
        self.cancel_tokens.insert(meeting_id.clone(), cancel.clone());

        let outcome = self.drive_chain(store, events, meeting_id, mode, &resolve_adapter, &cancel, SelectionMode::RunRound).await;
        self.cancel_tokens.remove(meeting_id);
        outcome
    }

    /// Cancel any in-flight turn for `meeting_id`. A no-op if no turn is
    /// currently running. Looks up the token directly rather than through
    /// the per-meeting mutex, which is held by the turn this call needs to
    /// reach.
    pub fn cancel(&self, meeting_id: &MeetingId) {
        if let Some(token) = self.cancel_tokens.get(meeting_id) {
            token.cancel();
        } else {
            debug!(%meeting_id, "cancel requested but no turn is currently in flight");
        }
    }

    /// Drop the lock entry for a meeting that has ended or been deleted,
    /// so it does not linger in the map forever.
    pub fn forget(&self, meeting_id: &MeetingId) {
        self.locks.remove(meeting_id);
        self.cancel_tokens.remove(meeting_id);
    }

    async fn drive_chain<F>(
        &self,
        store: &dyn EntityStore,
        events: &EventHub,
        meeting_id: &MeetingId,
        mode: TurnMode,
        resolve_adapter: &F,
        cancel: &CancellationToken,
        mut selection: SelectionMode,
    ) -> Result<Vec<TurnOutcome>>
    where
        F: Fn(&AgentId) -> Arc<dyn ModelAdapter>,
    {
        let mut outcomes = Vec::new();
        let mut depth = 0u32;
        let mut next_speakers: Option<Vec<AgentId>> = None;

        loop {
            let speakers = match &next_speakers {
                Some(speakers) => speakers.clone(),
                None => {
                    let meeting = store
                        .load_meeting(meeting_id)?
                        .ok_or_else(|| MeetingError::NotFound(format!("meeting {meeting_id}")))?;
                    match meeting.messages.last() {
                        Some(last) => select_next_speakers(&meeting, last, selection),
                        None => meeting.participants.iter().map(|p| p.id.clone()).collect(),
                    }
                }
            };

            if speakers.is_empty() || depth >= self.config.chain_depth {
                break;
            }
            if cancel.is_cancelled() {
                break;
            }

            for speaker_id in &speakers {
                if cancel.is_cancelled() || depth >= self.config.chain_depth {
                    break;
                }

                let meeting = store
                    .load_meeting(meeting_id)?
                    .ok_or_else(|| MeetingError::NotFound(format!("meeting {meeting_id}")))?;
                if meeting.status != MeetingStatus::Active {
                    return Ok(outcomes);
                }
                if let Some(max_rounds) = meeting.config.max_rounds {
                    if meeting.current_round >= max_rounds {
                        return Ok(outcomes);
                    }
                }

                let adapter = resolve_adapter(speaker_id);
                let outcome =
                    execute_turn(store, events, meeting_id, speaker_id, mode, adapter.as_ref(), cancel, &self.config).await?;
                info!(%meeting_id, speaker = %speaker_id, depth, "turn completed");

                let mentioned = outcome.mentioned_agent_ids.clone();
                outcomes.push(outcome);
                depth += 1;

                if !mentioned.is_empty() && mode == TurnMode::Streaming {
                    next_speakers = Some(mentioned);
                } else {
                    next_speakers = None;
                }
            }

            selection = SelectionMode::ReactOnly;
            if next_speakers.is_none() {
                break;
            }
        }

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Utc;
    use meeting_core::types::{
        Agent, MeetingConfig, MeetingStatus, Moderator, ModelConfig, Provider, Role,
    };
    use meeting_providers::{ChatEntry, ChatParameters, ChatResponse, Result as ProviderResult};
    use meeting_store::{EntityStore as _, SqliteEntityStore};

    use super::*;

    /// A stream-mode adapter that hangs forever unless cancelled.
    struct HangingAdapter;

    #[async_trait]
    impl ModelAdapter for HangingAdapter {
        fn provider_name(&self) -> &str {
            "hanging"
        }

        async fn complete(&self, _: &str, _: &[ChatEntry], _: &ChatParameters) -> ProviderResult<ChatResponse> {
            std::future::pending().await
        }

        async fn stream(
            &self,
            _: &str,
            _: &[ChatEntry],
            _: &ChatParameters,
            _: tokio::sync::mpsc::Sender<meeting_providers::StreamDelta>,
        ) -> ProviderResult<()> {
            std::future::pending().await
        }

        async fn test_connection(&self) -> ProviderResult<()> {
            Ok(())
        }
    }

    fn agent(id: &str, name: &str) -> Agent {
        Agent {
            id: AgentId::from(id),
            name: name.to_string(),
            role: Role { name: "Engineer".to_string(), description: "Builds things".to_string(), system_prompt: "Be terse.".to_string() },
            model_config: ModelConfig { provider: Provider::Anthropic, model_name: "m".to_string(), credential: "k".to_string(), parameters: None },
        }
    }

    fn meeting(participants: Vec<Agent>) -> meeting_core::types::Meeting {
        let now = Utc::now();
        meeting_core::types::Meeting {
            id: MeetingId::new(),
            topic: "Roadmap".to_string(),
            participants,
            moderator: Moderator::User,
            status: MeetingStatus::Active,
            config: MeetingConfig::default(),
            agenda: Vec::new(),
            messages: Vec::new(),
            current_round: 0,
            minutes_history: Vec::new(),
            current_minutes: None,
            mind_map: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn lock_is_created_lazily_per_meeting() {
        let coordinator = TurnCoordinator::new();
        let meeting_id = MeetingId::new();
        assert!(coordinator.locks.is_empty());
        let _ = coordinator.lock_for(&meeting_id);
        assert_eq!(coordinator.locks.len(), 1);
    }

    #[tokio::test]
    async fn forget_removes_the_lock_entry() {
        let coordinator = TurnCoordinator::new();
        let meeting_id = MeetingId::new();
        let _ = coordinator.lock_for(&meeting_id);
        coordinator.cancel_tokens.insert(meeting_id.clone(), CancellationToken::new());
        coordinator.forget(&meeting_id);
        assert!(coordinator.locks.is_empty());
        assert!(coordinator.cancel_tokens.is_empty());
    }

    #[tokio::test]
    async fn cancel_on_idle_meeting_is_a_no_op() {
        let coordinator = TurnCoordinator::new();
        let meeting_id = MeetingId::new();
        coordinator.cancel(&meeting_id);
    }

    #[tokio::test]
    async fn cancel_aborts_a_turn_in_flight_without_acquiring_the_held_lock() {
        let store = Arc::new(SqliteEntityStore::open_in_memory().unwrap());
        let events = Arc::new(EventHub::new());
        let m = meeting(vec![agent("1", "Alice")]);
        let meeting_id = m.id.clone();
        store.save_meeting(&m).unwrap();

        let coordinator = Arc::new(TurnCoordinator::new());
        let task_store = store.clone();
        let task_events = events.clone();
        let task_coordinator = coordinator.clone();
        let task_meeting_id = meeting_id.clone();
        let handle = tokio::spawn(async move {
            task_coordinator
                .request_turn(
                    task_store.as_ref(),
                    task_events.as_ref(),
                    &task_meeting_id,
                    &AgentId::from("1"),
                    TurnMode::Streaming,
                    &HangingAdapter,
                )
                .await
        });

        // Give the spawned turn time to acquire the per-meeting lock and
        // register its cancellation token before we try to cancel it.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        coordinator.cancel(&meeting_id);

        let result = tokio::time::timeout(std::time::Duration::from_secs(1), handle)
            .await
            .expect("cancellation should abort the turn promptly, not wait out its timeout")
            .unwrap();
        assert!(matches!(result, Err(MeetingError::Cancelled)));
    }
}
