use chrono::Utc;
use meeting_core::types::{Mention, Message, MessageId, SpeakerType};
use meeting_core::{limits, AgentId, MeetingError, MeetingId, Result, RoundTableConfig};
use meeting_events::{DeltaKind, EventHub, MeetingEvent};
use meeting_providers::retry::RetryPolicy;
use meeting_providers::{ChatParameters, ModelAdapter, StreamDelta};
use meeting_store::EntityStore;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::context::build_context;
use crate::mentions::parse_mentions;
use crate::meeting::advance_round_if_complete;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnMode {
    Blocking,
    Streaming,
}

/// Result of a successful `execute_turn`.
pub struct TurnOutcome {
    pub message: Message,
    /// Mentioned participants, in mention order. Every participant in this
    /// system is an AI agent, so no further filtering is needed before the
    /// speaker selector consumes this.
    pub mentioned_agent_ids: Vec<AgentId>,
}

/// Execute exactly one AI turn end to end. Callers are expected to hold
/// the per-meeting coordinator lock for the duration of this call; this
/// function itself performs the store reload/save that make up the turn's
/// commit point.
#[allow(clippy::too_many_arguments)]
pub async fn execute_turn(
    store: &dyn EntityStore,
    events: &EventHub,
    meeting_id: &MeetingId,
    speaker_id: &AgentId,
    mode: TurnMode,
    adapter: &dyn ModelAdapter,
    cancel: &CancellationToken,
    config: &RoundTableConfig,
) -> Result<TurnOutcome> {
    let mut meeting = store
        .load_meeting(meeting_id)?
        .ok_or_else(|| MeetingError::NotFound(format!("meeting {meeting_id}")))?;

    if meeting.status != meeting_core::types::MeetingStatus::Active {
        return Err(MeetingError::StateConflict("meeting is not active".to_string()));
    }
    if let Some(max_rounds) = meeting.config.max_rounds {
        if meeting.current_round >= max_rounds {
            return Err(MeetingError::StateConflict("max_rounds reached".to_string()));
        }
    }

    let speaker = meeting
        .participant(speaker_id)
        .cloned()
        .ok_or_else(|| MeetingError::NotFound(format!("participant {speaker_id}")))?;

    let (system_prompt, conversation) = build_context(&meeting, &speaker);
    let parameters = speaker
        .model_config
        .parameters
        .as_ref()
        .map(|p| ChatParameters { temperature: p.temperature, max_tokens: p.max_tokens, top_p: p.top_p })
        .unwrap_or_default();

    let outcome = match mode {
        TurnMode::Blocking => run_blocking(adapter, &system_prompt, &conversation, &parameters, config).await,
        TurnMode::Streaming => {
            run_streaming(
                adapter,
                events,
                meeting_id,
                speaker_id,
                &system_prompt,
                &conversation,
                &parameters,
                cancel,
                config,
            )
            .await
        }
    };

    let (content, reasoning_content) = match outcome {
        Ok(pair) => pair,
        Err(TurnFailure::Cancelled) => return Err(MeetingError::Cancelled),
        Err(TurnFailure::Error(err)) => {
            events.publish(
                meeting_id,
                MeetingEvent::TurnFailed { speaker_id: speaker_id.clone(), classification: err.code().to_string() },
            );
            return Err(err);
        }
    };

    if content.trim().is_empty() {
        let err = MeetingError::Validation("model returned empty content".to_string());
        events.publish(
            meeting_id,
            MeetingEvent::TurnFailed { speaker_id: speaker_id.clone(), classification: err.code().to_string() },
        );
        return Err(err);
    }

    let (content, truncated) = match meeting.config.max_message_length {
        Some(max) if content.chars().count() > max => {
            let truncated: String = content.chars().take(max).collect();
            (format!("{truncated}{}", limits::TRUNCATION_MARKER), true)
        }
        _ => (content, false),
    };
    if truncated {
        info!(%meeting_id, %speaker_id, "truncated overlong model output");
    }

    let message_id = MessageId::new();
    let parsed_mentions = parse_mentions(&content, &meeting.participants);
    let mentions: Vec<Mention> = parsed_mentions
        .iter()
        .map(|m| Mention {
            mentioned_participant_id: m.participant_id.clone(),
            mentioned_participant_name: m.participant_name.clone(),
            message_id: message_id.clone(),
        })
        .collect();
    let mentioned_agent_ids: Vec<AgentId> = parsed_mentions.into_iter().map(|m| m.participant_id).collect();

    let timestamp = monotonic_timestamp(&meeting);
    let message = Message {
        id: message_id,
        speaker_id: Some(speaker.id.clone()),
        speaker_name: speaker.name.clone(),
        speaker_type: SpeakerType::Agent,
        content,
        reasoning_content,
        timestamp,
        round_number: meeting.current_round,
        mentions,
    };

    meeting.messages.push(message.clone());
    meeting.updated_at = timestamp;
    let meeting_ended = advance_round_if_complete(&mut meeting);

    if let Err(err) = store.save_meeting(&meeting) {
        let meeting_err: MeetingError = err.into();
        events.publish(meeting_id, MeetingEvent::PersistenceFailed { detail: meeting_err.to_string() });
        return Err(meeting_err);
    }

    events.publish(meeting_id, MeetingEvent::NewMessage { message_id: message.id.clone() });
    if meeting_ended {
        events.publish(meeting_id, MeetingEvent::StatusChange { status: meeting_core::types::MeetingStatus::Ended });
    }

    Ok(TurnOutcome { message, mentioned_agent_ids })
}

/// A message's timestamp must be strictly newer than the previous one in
/// the same meeting, since two turns can otherwise land in the same
/// millisecond.
fn monotonic_timestamp(meeting: &meeting_core::types::Meeting) -> chrono::DateTime<Utc> {
    let now = Utc::now();
    match meeting.messages.last() {
        Some(last) if last.timestamp >= now => last.timestamp + chrono::Duration::microseconds(1),
        _ => now,
    }
}

enum TurnFailure {
    Cancelled,
    Error(MeetingError),
}

async fn run_blocking(
    adapter: &dyn ModelAdapter,
    system_prompt: &str,
    conversation: &[meeting_providers::ChatEntry],
    parameters: &ChatParameters,
    config: &RoundTableConfig,
) -> std::result::Result<(String, Option<String>), TurnFailure> {
    let deadline = std::time::Duration::from_secs(config.completion_timeout_secs);
    let response = meeting_providers::retry::with_retry(RetryPolicy::from(config), || {
        meeting_providers::retry::with_timeout(deadline, adapter.complete(system_prompt, conversation, parameters))
    })
    .await
    .map_err(|e| TurnFailure::Error(e.into()))?;

    Ok((response.content, response.reasoning_content))
}

#[allow(clippy::too_many_arguments)]
async fn run_streaming(
    adapter: &dyn ModelAdapter,
    events: &EventHub,
    meeting_id: &MeetingId,
    speaker_id: &AgentId,
    system_prompt: &str,
    conversation: &[meeting_providers::ChatEntry],
    parameters: &ChatParameters,
    cancel: &CancellationToken,
    config: &RoundTableConfig,
) -> std::result::Result<(String, Option<String>), TurnFailure> {
    let deadline = std::time::Duration::from_secs(config.streaming_timeout_secs);
    match tokio::time::timeout(
        deadline,
        run_streaming_inner(adapter, events, meeting_id, speaker_id, system_prompt, conversation, parameters, cancel),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(TurnFailure::Error(MeetingError::Network(format!(
            "streaming turn exceeded its {}s deadline",
            deadline.as_secs()
        )))),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_streaming_inner(
    adapter: &dyn ModelAdapter,
    events: &EventHub,
    meeting_id: &MeetingId,
    speaker_id: &AgentId,
    system_prompt: &str,
    conversation: &[meeting_providers::ChatEntry],
    parameters: &ChatParameters,
    cancel: &CancellationToken,
) -> std::result::Result<(String, Option<String>), TurnFailure> {
    let (tx, mut rx) = mpsc::channel(32);
    let adapter_call = adapter.stream(system_prompt, conversation, parameters, tx);
    tokio::pin!(adapter_call);

    let mut content = String::new();
    let mut reasoning = String::new();
    let mut saw_complete = false;
    let mut stream_error: Option<meeting_providers::ProviderError> = None;
    let mut call_result: Option<meeting_providers::Result<()>> = None;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(TurnFailure::Cancelled);
            }
            res = &mut adapter_call, if call_result.is_none() => {
                call_result = Some(res);
            }
            delta = rx.recv() => {
                match delta {
                    Some(StreamDelta::Reasoning { text }) => {
                        reasoning.push_str(&text);
                        events.publish(meeting_id, MeetingEvent::StreamingDelta { speaker_id: speaker_id.clone(), kind: DeltaKind::Reasoning, text });
                    }
                    Some(StreamDelta::Content { text }) => {
                        content.push_str(&text);
                        events.publish(meeting_id, MeetingEvent::StreamingDelta { speaker_id: speaker_id.clone(), kind: DeltaKind::Content, text });
                    }
                    Some(StreamDelta::Complete) => {
                        saw_complete = true;
                        events.publish(meeting_id, MeetingEvent::StreamingDelta { speaker_id: speaker_id.clone(), kind: DeltaKind::Complete, text: String::new() });
                    }
                    Some(StreamDelta::Error { message }) => {
                        events.publish(meeting_id, MeetingEvent::StreamingDelta { speaker_id: speaker_id.clone(), kind: DeltaKind::Error, text: message.clone() });
                        stream_error = Some(meeting_providers::ProviderError::NetworkError(message));
                    }
                    None => break,
                }
            }
        }
    }

    if let Some(Err(err)) = call_result {
        warn!(%meeting_id, %speaker_id, error = %err, "streaming adapter call returned an error");
        return Err(TurnFailure::Error(err.into()));
    }
    if let Some(err) = stream_error {
        return Err(TurnFailure::Error(err.into()));
    }
    if !saw_complete {
        return Err(TurnFailure::Error(MeetingError::Network("stream ended without a complete delta".to_string())));
    }

    let reasoning_content = if reasoning.is_empty() { None } else { Some(reasoning) };
    Ok((content, reasoning_content))
}
