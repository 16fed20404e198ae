use meeting_core::types::Participant;
use meeting_core::AgentId;

/// One resolved `@`-mention, in document order. Does not carry a
/// `message_id` — resolution is a function of content and participants
/// alone; the caller (the turn engine) attaches the id of the message being
/// constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMention {
    pub participant_id: AgentId,
    pub participant_name: String,
}

/// Extract `@`-mentions from `content` in document order, resolving each
/// token against `participants`. Deterministic, no regex — the token
/// grammar is small and fixed enough that an explicit character scan reads
/// more clearly than a regex and is easier to get right at the edges
/// (quoting, trailing punctuation).
///
/// Matching rules:
/// - a token is `@` followed by a quoted name (`@"…"`) or a run of
///   non-whitespace characters.
/// - the captured name is matched against `participant.name`, then (if no
///   match) `participant.role.name`.
/// - matching is case-sensitive exact, except that trailing punctuation on
///   an unquoted token is tolerated (so `"@Bob,"` still resolves to `Bob`).
/// - each participant appears at most once; first occurrence wins.
pub fn parse_mentions(content: &str, participants: &[Participant]) -> Vec<ParsedMention> {
    let mut mentions = Vec::new();
    let mut seen = std::collections::HashSet::new();
    let chars: Vec<char> = content.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '@' {
            i += 1;
            continue;
        }

        let start = i + 1;
        if start >= chars.len() {
            break;
        }

        let (raw, next) = if chars[start] == '"' {
            let mut j = start + 1;
            while j < chars.len() && chars[j] != '"' {
                j += 1;
            }
            if j < chars.len() {
                (chars[start + 1..j].iter().collect::<String>(), j + 1)
            } else {
                // Unterminated quote: treat the rest as the token.
                (chars[start + 1..].iter().collect::<String>(), chars.len())
            }
        } else {
            let mut j = start;
            while j < chars.len() && !chars[j].is_whitespace() {
                j += 1;
            }
            (chars[start..j].iter().collect::<String>(), j)
        };

        i = next;

        if raw.is_empty() {
            continue;
        }

        if let Some(participant) = resolve(&raw, participants) {
            if seen.insert(participant.id.clone()) {
                mentions.push(ParsedMention {
                    participant_id: participant.id.clone(),
                    participant_name: participant.name.clone(),
                });
            }
        }
    }

    mentions
}

/// Resolve a captured token against name, then role name, then a
/// punctuation-trimmed retry of both.
fn resolve<'a>(raw: &str, participants: &'a [Participant]) -> Option<&'a Participant> {
    if let Some(p) = participants.iter().find(|p| p.name == raw || p.role.name == raw) {
        return Some(p);
    }
    let trimmed = raw.trim_end_matches(|c: char| c.is_ascii_punctuation());
    if trimmed.is_empty() || trimmed == raw {
        return None;
    }
    participants.iter().find(|p| p.name == trimmed || p.role.name == trimmed)
}

#[cfg(test)]
mod tests {
    use meeting_core::types::{ModelConfig, Provider, Role};
    use meeting_core::AgentId;

    use super::*;

    fn participant(id: &str, name: &str, role_name: &str) -> Participant {
        Participant {
            id: AgentId::from(id),
            name: name.to_string(),
            role: Role {
                name: role_name.to_string(),
                description: "desc".to_string(),
                system_prompt: "prompt".to_string(),
            },
            model_config: ModelConfig {
                provider: Provider::Anthropic,
                model_name: "m".to_string(),
                credential: "k".to_string(),
                parameters: None,
            },
        }
    }

    #[test]
    fn finds_plain_mention() {
        let participants = vec![participant("1", "Bob", "Engineer")];
        let mentions = parse_mentions("hey @Bob can you look", &participants);
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].participant_name, "Bob");
    }

    #[test]
    fn tolerates_trailing_punctuation() {
        let participants = vec![participant("1", "Bob", "Engineer")];
        let mentions = parse_mentions("@Bob, please weigh in", &participants);
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].participant_name, "Bob");
    }

    #[test]
    fn matches_quoted_multiword_name() {
        let participants = vec![participant("1", "Bob Smith", "Engineer")];
        let mentions = parse_mentions(r#"@"Bob Smith" what do you think"#, &participants);
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].participant_name, "Bob Smith");
    }

    #[test]
    fn falls_back_to_role_name() {
        let participants = vec![participant("1", "Bob", "Architect")];
        let mentions = parse_mentions("@Architect please review", &participants);
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].participant_id, AgentId::from("1"));
    }

    #[test]
    fn each_participant_mentioned_once_first_occurrence_wins() {
        let participants = vec![participant("1", "Bob", "Engineer")];
        let mentions = parse_mentions("@Bob and again @Bob", &participants);
        assert_eq!(mentions.len(), 1);
    }

    #[test]
    fn preserves_document_order() {
        let participants = vec![participant("1", "Alice", "PM"), participant("2", "Bob", "Eng")];
        let mentions = parse_mentions("@Bob then @Alice", &participants);
        assert_eq!(mentions[0].participant_name, "Bob");
        assert_eq!(mentions[1].participant_name, "Alice");
    }

    #[test]
    fn unknown_mention_is_dropped() {
        let participants = vec![participant("1", "Bob", "Engineer")];
        let mentions = parse_mentions("@Nobody here", &participants);
        assert!(mentions.is_empty());
    }

    #[test]
    fn is_idempotent() {
        let participants = vec![participant("1", "Bob", "Engineer")];
        let content = "@Bob please respond to @Bob";
        let first = parse_mentions(content, &participants);
        let second = parse_mentions(content, &participants);
        assert_eq!(first, second);
    }
}
