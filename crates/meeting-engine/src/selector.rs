use meeting_core::types::{Message, Meeting, Participant, SpeakingOrder};
use meeting_core::AgentId;
use rand::seq::SliceRandom;

/// Whether the caller is asking the selector to advance a full round, or
/// just to react to the reference message's mentions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    RunRound,
    ReactOnly,
}

/// Decide the next speaker(s) to run. `reference` is typically the most
/// recently appended message.
pub fn select_next_speakers(meeting: &Meeting, reference: &Message, mode: SelectionMode) -> Vec<AgentId> {
    if !reference.mentions.is_empty() {
        return reference
            .mentions
            .iter()
            .filter(|m| meeting.participant(&m.mentioned_participant_id).is_some())
            .map(|m| m.mentioned_participant_id.clone())
            .collect();
    }

    if mode != SelectionMode::RunRound {
        return Vec::new();
    }

    match meeting.config.speaking_order {
        SpeakingOrder::Sequential => rotate_after_last_speaker(meeting),
        SpeakingOrder::Random => random_permutation(&meeting.participants),
    }
}

fn rotate_after_last_speaker(meeting: &Meeting) -> Vec<AgentId> {
    let order: Vec<AgentId> = meeting.participants.iter().map(|p| p.id.clone()).collect();
    if order.is_empty() {
        return order;
    }

    let last_agent_speaker = meeting
        .messages
        .iter()
        .rev()
        .find_map(|m| m.speaker_id.clone().filter(|id| order.contains(id)));

    let Some(last) = last_agent_speaker else {
        return order;
    };

    let pivot = order.iter().position(|id| id == &last).map(|i| (i + 1) % order.len()).unwrap_or(0);
    order[pivot..].iter().chain(order[..pivot].iter()).cloned().collect()
}

fn random_permutation(participants: &[Participant]) -> Vec<AgentId> {
    let mut ids: Vec<AgentId> = participants.iter().map(|p| p.id.clone()).collect();
    ids.shuffle(&mut rand::rng());
    ids
}
