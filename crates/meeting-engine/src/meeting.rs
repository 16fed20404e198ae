use std::collections::HashSet;

use chrono::Utc;
use meeting_core::limits::{
    AGENDA_TITLE_MAX, MEETING_TOPIC_MAX, ROLE_DESCRIPTION_MAX, ROLE_NAME_MAX, ROLE_SYSTEM_PROMPT_MAX,
};
use meeting_core::types::{AgendaItem, AgendaItemId, Meeting, MeetingStatus, Message, MessageId, Role, SpeakerType};
use meeting_core::{MeetingError, Result};

/// Append a user message — allowed only while `active`. Whitespace-only
/// content is rejected without mutating the meeting.
///
/// Mutates `meeting` only — the caller publishes [`meeting_events::MeetingEvent::NewMessage`]
/// after a durable save, matching `advance_round_if_complete`'s contract.
pub fn add_user_message(meeting: &mut Meeting, content: &str) -> Result<Message> {
    require_active(meeting)?;
    if content.trim().is_empty() {
        return Err(MeetingError::Validation("message content is empty".to_string()));
    }

    let (content, truncated) = match meeting.config.max_message_length {
        Some(max) if content.chars().count() > max => {
            let truncated: String = content.chars().take(max).collect();
            (format!("{truncated}{}", meeting_core::limits::TRUNCATION_MARKER), true)
        }
        _ => (content.to_string(), false),
    };
    let _ = truncated;

    let timestamp = monotonic_timestamp(meeting);
    let message_id = MessageId::new();
    let mentions = crate::mentions::parse_mentions(&content, &meeting.participants)
        .into_iter()
        .map(|m| meeting_core::types::Mention {
            mentioned_participant_id: m.participant_id,
            mentioned_participant_name: m.participant_name,
            message_id: message_id.clone(),
        })
        .collect();

    let message = Message {
        id: message_id,
        speaker_id: None,
        speaker_name: "user".to_string(),
        speaker_type: SpeakerType::User,
        content,
        reasoning_content: None,
        timestamp,
        round_number: meeting.current_round,
        mentions,
    };

    meeting.messages.push(message.clone());
    meeting.updated_at = timestamp;
    Ok(message)
}

fn monotonic_timestamp(meeting: &Meeting) -> chrono::DateTime<Utc> {
    let now = Utc::now();
    match meeting.messages.last() {
        Some(last) if last.timestamp >= now => last.timestamp + chrono::Duration::microseconds(1),
        _ => now,
    }
}

/// Round-completion bookkeeping. Derives round state from the persisted
/// message list rather than tracking separate ephemeral counters, so a
/// reloaded meeting's round state is always consistent with its history.
///
/// A round completes when every participant has at least one agent message
/// tagged with the current `round_number`. User messages never count.
///
/// Mutates `meeting` only — callers publish [`meeting_events::MeetingEvent::StatusChange`]
/// themselves once the mutation has been durably saved (the turn engine's
/// commit point is `save_meeting`, so no event may announce a status that
/// didn't make it to the store). Returns `true` when this call is the one
/// that ended the meeting, so the caller knows to publish the transition.
pub fn advance_round_if_complete(meeting: &mut Meeting) -> bool {
    if meeting.participants.is_empty() {
        return false;
    }

    let spoken: HashSet<_> = meeting
        .messages
        .iter()
        .filter(|m| m.round_number == meeting.current_round && m.speaker_type == SpeakerType::Agent)
        .filter_map(|m| m.speaker_id.clone())
        .collect();

    if spoken.len() < meeting.participants.len() {
        return false;
    }

    meeting.current_round += 1;

    if let Some(max_rounds) = meeting.config.max_rounds {
        if meeting.current_round >= max_rounds {
            meeting.status = MeetingStatus::Ended;
            return true;
        }
    }
    false
}

/// `start` transition. No-op from `active`; `paused -> active`;
/// an error from `ended`. Returns `true` when a transition actually
/// happened, so the caller knows to publish a `StatusChange` after saving.
pub fn start(meeting: &mut Meeting) -> Result<bool> {
    match meeting.status {
        MeetingStatus::Active => Ok(false),
        MeetingStatus::Paused => {
            meeting.status = MeetingStatus::Active;
            meeting.updated_at = Utc::now();
            Ok(true)
        }
        MeetingStatus::Ended => Err(MeetingError::StateConflict("cannot start an ended meeting".to_string())),
    }
}

/// `pause` transition. No-op from `paused`; `active -> paused`; an
/// error from `ended`. Returns `true` when a transition actually happened.
pub fn pause(meeting: &mut Meeting) -> Result<bool> {
    match meeting.status {
        MeetingStatus::Paused => Ok(false),
        MeetingStatus::Active => {
            meeting.status = MeetingStatus::Paused;
            meeting.updated_at = Utc::now();
            Ok(true)
        }
        MeetingStatus::Ended => Err(MeetingError::StateConflict("cannot pause an ended meeting".to_string())),
    }
}

/// `end` transition. No-op from `ended`; `active`/`paused -> ended`.
/// Returns `true` when a transition actually happened.
pub fn end(meeting: &mut Meeting) -> Result<bool> {
    if meeting.status == MeetingStatus::Ended {
        return Ok(false);
    }
    meeting.status = MeetingStatus::Ended;
    meeting.updated_at = Utc::now();
    Ok(true)
}

fn require_active(meeting: &Meeting) -> Result<()> {
    if meeting.status != MeetingStatus::Active {
        return Err(MeetingError::StateConflict("operation requires an active meeting".to_string()));
    }
    Ok(())
}

pub fn add_agenda_item(meeting: &mut Meeting, title: &str, description: &str) -> Result<AgendaItem> {
    require_active(meeting)?;
    let title = title.trim();
    if title.is_empty() || title.chars().count() > AGENDA_TITLE_MAX {
        return Err(MeetingError::Validation(format!("agenda title must be 1..{AGENDA_TITLE_MAX} characters")));
    }
    let item = AgendaItem {
        id: AgendaItemId::new(),
        title: title.to_string(),
        description: description.to_string(),
        completed: false,
        created_at: Utc::now(),
    };
    meeting.agenda.push(item.clone());
    meeting.updated_at = Utc::now();
    Ok(item)
}

pub fn mark_agenda_completed(meeting: &mut Meeting, item_id: &AgendaItemId) -> Result<()> {
    require_active(meeting)?;
    let item = meeting
        .agenda
        .iter_mut()
        .find(|i| &i.id == item_id)
        .ok_or_else(|| MeetingError::NotFound(format!("agenda item {item_id}")))?;
    item.completed = true;
    meeting.updated_at = Utc::now();
    Ok(())
}

pub fn remove_agenda_item(meeting: &mut Meeting, item_id: &AgendaItemId) -> Result<()> {
    require_active(meeting)?;
    let before = meeting.agenda.len();
    meeting.agenda.retain(|i| &i.id != item_id);
    if meeting.agenda.len() == before {
        return Err(MeetingError::NotFound(format!("agenda item {item_id}")));
    }
    meeting.updated_at = Utc::now();
    Ok(())
}

/// Validate a new meeting's topic length — used by the orchestrator at
/// creation time.
pub fn validate_topic(topic: &str) -> Result<()> {
    let trimmed = topic.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MEETING_TOPIC_MAX {
        return Err(MeetingError::Validation(format!("topic must be 1..{MEETING_TOPIC_MAX} characters")));
    }
    Ok(())
}

/// Validate an [`Agent`]'s [`Role`] field lengths. Used by the
/// orchestrator on agent creation and update.
pub fn validate_role(role: &Role) -> Result<()> {
    if role.name.trim().is_empty() || role.name.chars().count() > ROLE_NAME_MAX {
        return Err(MeetingError::Validation(format!("role name must be 1..{ROLE_NAME_MAX} characters")));
    }
    if role.description.trim().is_empty() || role.description.chars().count() > ROLE_DESCRIPTION_MAX {
        return Err(MeetingError::Validation(format!(
            "role description must be 1..{ROLE_DESCRIPTION_MAX} characters"
        )));
    }
    if role.system_prompt.trim().is_empty() || role.system_prompt.chars().count() > ROLE_SYSTEM_PROMPT_MAX {
        return Err(MeetingError::Validation(format!(
            "role system_prompt must be 1..{ROLE_SYSTEM_PROMPT_MAX} characters"
        )));
    }
    Ok(())
}
