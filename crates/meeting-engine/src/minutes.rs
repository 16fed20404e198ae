use chrono::Utc;
use meeting_core::types::{Meeting, MinutesVersion, MinutesVersionId, SpeakerType};
use meeting_core::{AgentId, MeetingError, Result};
use meeting_providers::{ChatEntry, ChatParameters, ChatRole, ModelAdapter};
use serde::Deserialize;

const DEFAULT_MINUTES_PROMPT: &str = "Summarize this meeting transcript. Respond as JSON with keys \"summary\" (a short paragraph), \"key_decisions\" (an array of strings), and \"action_items\" (an array of strings).";

#[derive(Debug, Deserialize)]
struct MinutesPayload {
    summary: String,
    #[serde(default)]
    key_decisions: Vec<String>,
    #[serde(default)]
    action_items: Vec<String>,
}

/// Generate and append a new [`MinutesVersion`]. `generator_id` names the
/// participant whose model adapter composes the minutes; `created_by`
/// records who asked for it (a participant id or `"user"`).
pub async fn generate_minutes(
    meeting: &mut Meeting,
    adapter: &dyn ModelAdapter,
    generator_id: Option<&AgentId>,
    created_by: &str,
) -> Result<MinutesVersion> {
    let system_prompt = meeting.config.minutes_prompt.clone().unwrap_or_else(|| DEFAULT_MINUTES_PROMPT.to_string());
    let transcript = transcript_since_current_minutes(meeting);
    let user_entry = ChatEntry { role: ChatRole::User, content: transcript };

    let _ = generator_id;
    let response = adapter
        .complete(&system_prompt, std::slice::from_ref(&user_entry), &ChatParameters::default())
        .await
        .map_err(MeetingError::from)?;

    let (summary, key_decisions, action_items, content) = parse_minutes_response(&response.content);

    let version = meeting.minutes_history.iter().map(|v| v.version).max().unwrap_or(0) + 1;
    let minutes = MinutesVersion {
        id: MinutesVersionId::new(),
        version,
        content,
        summary,
        key_decisions,
        action_items,
        created_at: Utc::now(),
        created_by: created_by.to_string(),
    };

    meeting.minutes_history.push(minutes.clone());
    meeting.current_minutes = Some(minutes.id.clone());
    meeting.updated_at = minutes.created_at;

    Ok(minutes)
}

/// Strict-then-lenient two-pass parse of a minutes-generation response.
/// Tries exact JSON first (also unwrapping a ```` ```json ```` fenced
/// block, since models routinely wrap structured replies in markdown), then
/// falls back to scanning for `Summary:`/`Key Decisions:`/`Action Items:`
/// section headers with bullet lines underneath, and only then stores the
/// raw content as both `content` and `summary` with empty lists.
fn parse_minutes_response(raw: &str) -> (String, Vec<String>, Vec<String>, String) {
    if let Some(payload) = strict_json(raw) {
        return (payload.summary, payload.key_decisions, payload.action_items, raw.to_string());
    }
    if let Some(parsed) = heuristic_sections(raw) {
        return (parsed.0, parsed.1, parsed.2, raw.to_string());
    }
    (raw.to_string(), Vec::new(), Vec::new(), raw.to_string())
}

fn strict_json(raw: &str) -> Option<MinutesPayload> {
    if let Ok(payload) = serde_json::from_str::<MinutesPayload>(raw) {
        return Some(payload);
    }
    let fenced = extract_fenced_json(raw)?;
    serde_json::from_str::<MinutesPayload>(&fenced).ok()
}

/// Pull the body of a ` ```json ... ``` ` (or bare ` ``` ... ``` `) fenced
/// code block out of a model response, if one is present.
fn extract_fenced_json(raw: &str) -> Option<String> {
    let start = raw.find("```")?;
    let after_fence = &raw[start + 3..];
    let after_fence = after_fence.strip_prefix("json").unwrap_or(after_fence);
    let end = after_fence.find("```")?;
    Some(after_fence[..end].trim().to_string())
}

/// Best-effort scan for `Summary:`/`Key Decisions:`/`Action Items:` headers
/// with bullet (`-`/`*`) lines beneath them. Returns `None` if no recognized
/// header is found at all, so the caller falls through to the raw-content
/// fallback rather than returning an empty-looking summary.
fn heuristic_sections(raw: &str) -> Option<(String, Vec<String>, Vec<String>)> {
    let mut summary = String::new();
    let mut key_decisions = Vec::new();
    let mut action_items = Vec::new();
    let mut found_any = false;

    #[derive(PartialEq)]
    enum Section {
        None,
        Summary,
        Decisions,
        Actions,
    }
    let mut current = Section::None;

    for line in raw.lines() {
        let trimmed = line.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("summary:") {
            current = Section::Summary;
            found_any = true;
            let rest = trimmed["summary:".len()..].trim();
            if !rest.is_empty() {
                summary.push_str(rest);
            }
            continue;
        }
        if lower.starts_with("key decisions:") {
            current = Section::Decisions;
            found_any = true;
            continue;
        }
        if lower.starts_with("action items:") {
            current = Section::Actions;
            found_any = true;
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }

        let bullet = trimmed.strip_prefix('-').or_else(|| trimmed.strip_prefix('*')).map(str::trim);
        match current {
            Section::Summary => {
                if !summary.is_empty() {
                    summary.push(' ');
                }
                summary.push_str(bullet.unwrap_or(trimmed));
            }
            Section::Decisions => {
                if let Some(item) = bullet {
                    key_decisions.push(item.to_string());
                }
            }
            Section::Actions => {
                if let Some(item) = bullet {
                    action_items.push(item.to_string());
                }
            }
            Section::None => {}
        }
    }

    found_any.then_some((summary, key_decisions, action_items))
}

/// Render every message since `current_minutes` (or the full transcript if
/// there is none yet), speaker-name-prefixed.
fn transcript_since_current_minutes(meeting: &Meeting) -> String {
    let cutoff = meeting.current_minutes_version().map(|v| v.created_at);

    meeting
        .messages
        .iter()
        .filter(|m| match cutoff {
            Some(cutoff) => m.timestamp > cutoff,
            None => true,
        })
        .map(|m| {
            let speaker = match m.speaker_type {
                SpeakerType::User => "user".to_string(),
                SpeakerType::Agent => m.speaker_name.clone(),
            };
            format!("{speaker}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
