use meeting_core::types::{DiscussionStyle, Meeting, Participant, SpeakingLength};
use meeting_core::limits::MENTION_NOTICE_WINDOW;
use meeting_providers::{ChatEntry, ChatRole};

/// Fixed guidance table keyed by [`DiscussionStyle`]. Wording lives here
/// rather than in `meeting-core::limits` because it is prose, not a
/// tunable.
fn discussion_style_guidance(style: DiscussionStyle) -> &'static str {
    match style {
        DiscussionStyle::Formal => {
            "Maintain a formal, professional tone. Structure responses clearly and avoid casual language."
        }
        DiscussionStyle::Casual => {
            "Keep the tone relaxed and conversational, as if chatting with colleagues."
        }
        DiscussionStyle::Debate => {
            "Take a position and argue it. Challenge weak reasoning in prior statements and defend your own."
        }
    }
}

/// Fixed length-preference table keyed by [`SpeakingLength`].
fn length_preference_guidance(length: SpeakingLength) -> &'static str {
    match length {
        SpeakingLength::Brief => "Keep your response to one or two sentences.",
        SpeakingLength::Moderate => "Keep your response to a short paragraph.",
        SpeakingLength::Detailed => "Elaborate fully; multiple paragraphs are fine.",
    }
}

/// The fixed moderator-duty block appended when the speaker moderates the
/// meeting.
const MODERATOR_DUTY_BLOCK: &str = "As moderator, guide the discussion toward the agenda, ensure every participant gets a chance to contribute, periodically summarize progress, redirect off-topic tangents, and drive the meeting to a conclusion.";

/// Compose the `(system_prompt, conversation)` pair a model adapter needs
/// for `speaker`'s next turn. `conversation` always reflects "after the
/// last persisted message": callers never need to pass an explicit cursor.
pub fn build_context(meeting: &Meeting, speaker: &Participant) -> (String, Vec<ChatEntry>) {
    (system_prompt(meeting, speaker), conversation(meeting, speaker))
}

fn system_prompt(meeting: &Meeting, speaker: &Participant) -> String {
    let mut blocks = Vec::new();

    blocks.push(format!(
        "Your role: {}\nRole description: {}\n{}",
        speaker.role.name, speaker.role.description, speaker.role.system_prompt
    ));

    blocks.push(discussion_style_guidance(meeting.config.discussion_style).to_string());

    if let Some(length) = meeting.config.speaking_length_preferences.get(&speaker.id) {
        blocks.push(length_preference_guidance(*length).to_string());
    }

    if meeting.is_agent_moderator(&speaker.id) {
        blocks.push(MODERATOR_DUTY_BLOCK.to_string());
    }

    blocks.join("\n")
}

fn conversation(meeting: &Meeting, speaker: &Participant) -> Vec<ChatEntry> {
    let mut entries = Vec::new();
    entries.push(ChatEntry { role: ChatRole::System, content: meeting_preamble(meeting, speaker) });

    match meeting.current_minutes_version() {
        Some(minutes) => {
            entries.push(ChatEntry {
                role: ChatRole::System,
                content: format!("Minutes as of {}:\n{}", minutes.created_at.to_rfc3339(), minutes.content),
            });
            for message in meeting
                .messages
                .iter()
                .filter(|m| m.timestamp > minutes.created_at)
            {
                entries.push(history_entry(message));
            }
        }
        None => {
            for message in &meeting.messages {
                entries.push(history_entry(message));
            }
        }
    }

    entries
}

fn meeting_preamble(meeting: &Meeting, speaker: &Participant) -> String {
    let mut lines = vec![
        format!("Meeting topic: {}", meeting.topic),
        format!("Moderator: {}", meeting.moderator_name()),
    ];

    for participant in &meeting.participants {
        lines.push(format!("- {} ({})", participant.name, participant.role.name));
    }

    if !meeting.agenda.is_empty() {
        lines.push("Agenda:".to_string());
        for item in &meeting.agenda {
            let marker = if item.completed { "\u{2713}" } else { "\u{25cb}" };
            lines.push(format!("{marker} {}", item.title));
        }
    }

    if let Some(minutes) = meeting.current_minutes_version() {
        lines.push(format!("Current meeting conclusion:\n{}", minutes.summary));
    }

    if was_recently_mentioned(meeting, speaker) {
        lines.push(format!("Note: you ({}) were recently mentioned and should respond.", speaker.name));
    }

    lines.join("\n")
}

/// Whether `speaker` appears in any of the last
/// [`MENTION_NOTICE_WINDOW`] persisted messages, for the prompt notice.
fn was_recently_mentioned(meeting: &Meeting, speaker: &Participant) -> bool {
    meeting
        .messages
        .iter()
        .rev()
        .take(MENTION_NOTICE_WINDOW)
        .any(|m| m.mentions.iter().any(|mention| mention.mentioned_participant_id == speaker.id))
}

fn history_entry(message: &meeting_core::types::Message) -> ChatEntry {
    use meeting_core::types::SpeakerType;
    let role = match message.speaker_type {
        SpeakerType::User => ChatRole::User,
        SpeakerType::Agent => ChatRole::Assistant,
    };
    ChatEntry { role, content: format!("{}: {}", message.speaker_name, message.content) }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use meeting_core::types::{
        Agent, MeetingConfig, MeetingStatus, Mention, Message, Moderator, ModelConfig, Provider, Role, SpeakerType,
    };
    use meeting_core::{AgentId, MeetingId, MessageId};

    use super::*;

    fn agent(id: &str, name: &str) -> Agent {
        Agent {
            id: AgentId::from(id),
            name: name.to_string(),
            role: Role { name: "Engineer".to_string(), description: "Builds things".to_string(), system_prompt: "Be terse.".to_string() },
            model_config: ModelConfig { provider: Provider::Anthropic, model_name: "m".to_string(), credential: "k".to_string(), parameters: None },
        }
    }

    fn meeting() -> Meeting {
        let now = Utc::now();
        Meeting {
            id: MeetingId::new(),
            topic: "Launch plan".to_string(),
            participants: vec![agent("1", "Alice"), agent("2", "Bob")],
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

    #[test]
    fn system_prompt_includes_role_block() {
        let meeting = meeting();
        let (prompt, _) = build_context(&meeting, &meeting.participants[0]);
        assert!(prompt.contains("Your role: Engineer"));
        assert!(prompt.contains("Be terse."));
    }

    #[test]
    fn moderator_duty_block_only_for_agent_moderator() {
        let mut meeting = meeting();
        meeting.moderator = Moderator::Participant { id: AgentId::from("1") };
        let (prompt, _) = build_context(&meeting, &meeting.participants[0]);
        assert!(prompt.contains("As moderator"));

        let (other_prompt, _) = build_context(&meeting, &meeting.participants[1]);
        assert!(!other_prompt.contains("As moderator"));
    }

    #[test]
    fn conversation_includes_full_history_without_minutes() {
        let mut meeting = meeting();
        meeting.messages.push(Message {
            id: MessageId::new(),
            speaker_id: None,
            speaker_name: "user".to_string(),
            speaker_type: SpeakerType::User,
            content: "kick things off".to_string(),
            reasoning_content: None,
            timestamp: Utc::now(),
            round_number: 0,
            mentions: Vec::new(),
        });
        let (_, conversation) = build_context(&meeting, &meeting.participants[0]);
        assert!(conversation.iter().any(|e| e.content.contains("kick things off")));
    }

    #[test]
    fn conversation_compresses_to_post_minutes_messages_only() {
        let mut meeting = meeting();
        let cutoff = Utc::now();
        meeting.minutes_history.push(meeting_core::types::MinutesVersion {
            id: Default::default(),
            version: 1,
            content: "Discussed roadmap.".to_string(),
            summary: "Agreed on Q1 plan.".to_string(),
            key_decisions: Vec::new(),
            action_items: Vec::new(),
            created_at: cutoff,
            created_by: "user".to_string(),
        });
        meeting.current_minutes = Some(meeting.minutes_history[0].id.clone());

        meeting.messages.push(Message {
            id: MessageId::new(),
            speaker_id: None,
            speaker_name: "user".to_string(),
            speaker_type: SpeakerType::User,
            content: "old message before minutes".to_string(),
            reasoning_content: None,
            timestamp: cutoff - chrono::Duration::seconds(10),
            round_number: 0,
            mentions: Vec::new(),
        });
        meeting.messages.push(Message {
            id: MessageId::new(),
            speaker_id: None,
            speaker_name: "user".to_string(),
            speaker_type: SpeakerType::User,
            content: "new message after minutes".to_string(),
            reasoning_content: None,
            timestamp: cutoff + chrono::Duration::seconds(10),
            round_number: 0,
            mentions: Vec::new(),
        });

        let (_, conversation) = build_context(&meeting, &meeting.participants[0]);
        let joined: String = conversation.iter().map(|e| e.content.clone()).collect::<Vec<_>>().join("\n");
        assert!(!joined.contains("old message before minutes"));
        assert!(joined.contains("new message after minutes"));
        assert!(joined.contains("Discussed roadmap."));
    }

    #[test]
    fn recently_mentioned_speaker_gets_notice() {
        let mut meeting = meeting();
        meeting.messages.push(Message {
            id: MessageId::new(),
            speaker_id: None,
            speaker_name: "user".to_string(),
            speaker_type: SpeakerType::User,
            content: "@Alice check this".to_string(),
            reasoning_content: None,
            timestamp: Utc::now(),
            round_number: 0,
            mentions: vec![Mention {
                mentioned_participant_id: AgentId::from("1"),
                mentioned_participant_name: "Alice".to_string(),
                message_id: MessageId::new(),
            }],
        });
        let (prompt, _) = build_context(&meeting, &meeting.participants[0]);
        assert!(prompt.contains("you (Alice) were recently mentioned"));
    }
}
