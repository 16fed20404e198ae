use std::collections::HashMap;

use chrono::Utc;
use meeting_core::types::{AgendaItem, Meeting, MindMap, MindMapId, MindMapNode, MindMapNodeId};
use meeting_core::{AgentId, MeetingError, MessageId, Result};
use meeting_providers::{ChatEntry, ChatParameters, ChatRole, ModelAdapter};
use serde::Deserialize;

const MIND_MAP_PROMPT: &str = "Review this meeting transcript and return JSON: {\"discussion_points\": [{\"content\": string, \"parent_agenda_title\": string | null, \"message_ids\": [string], \"sub_points\": [...] }]}. Nest related points under sub_points, up to two levels deep.";

const MAX_DEPTH: u32 = 3;

#[derive(Debug, Deserialize)]
struct MindMapPayload {
    discussion_points: Vec<DiscussionPoint>,
}

#[derive(Debug, Deserialize)]
struct DiscussionPoint {
    content: String,
    #[serde(default)]
    parent_agenda_title: Option<String>,
    #[serde(default)]
    message_ids: Vec<String>,
    #[serde(default)]
    sub_points: Vec<DiscussionPoint>,
}

/// Generate and store a [`MindMap`]. Falls back to a minimal root+agenda
/// tree if the model's JSON is malformed, rather than failing the operation
/// outright.
pub async fn generate_mind_map(
    meeting: &mut Meeting,
    adapter: &dyn ModelAdapter,
    generator_id: Option<&AgentId>,
    created_by: &str,
) -> Result<MindMap> {
    let _ = generator_id;
    let transcript = transcript(meeting);
    let user_entry = ChatEntry { role: ChatRole::User, content: transcript };
    let response = adapter
        .complete(MIND_MAP_PROMPT, std::slice::from_ref(&user_entry), &ChatParameters::default())
        .await
        .map_err(MeetingError::from)?;

    let mut builder = TreeBuilder::new(meeting);
    let root = builder.root.clone();

    if let Some(payload) = strict_json(&response.content) {
        for point in &payload.discussion_points {
            builder.attach(point, root.clone());
        }
    }
    // Malformed or absent JSON leaves `builder` at the minimal root+agenda
    // tree built in `TreeBuilder::new`, satisfying step 5's fallback.

    let version = meeting.mind_map.as_ref().map(|m| m.version).unwrap_or(0) + 1;
    let mind_map = MindMap {
        id: MindMapId::new(),
        meeting_id: meeting.id.clone(),
        root_node: builder.root,
        nodes: builder.nodes,
        version,
        created_at: Utc::now(),
        created_by: created_by.to_string(),
    };

    meeting.mind_map = Some(mind_map.clone());
    meeting.updated_at = mind_map.created_at;
    Ok(mind_map)
}

/// Strict-then-lenient parse of the mind-map JSON payload, the same
/// two-pass shape as [`crate::minutes::generate_minutes`]: try exact
/// JSON, then unwrap a ```` ```json ```` fenced block before giving up and
/// letting the caller fall back to the minimal root+agenda tree.
fn strict_json(raw: &str) -> Option<MindMapPayload> {
    if let Ok(payload) = serde_json::from_str::<MindMapPayload>(raw) {
        return Some(payload);
    }
    let start = raw.find("```")?;
    let after_fence = &raw[start + 3..];
    let after_fence = after_fence.strip_prefix("json").unwrap_or(after_fence);
    let end = after_fence.find("```")?;
    serde_json::from_str::<MindMapPayload>(after_fence[..end].trim()).ok()
}

struct TreeBuilder<'a> {
    meeting: &'a Meeting,
    nodes: HashMap<MindMapNodeId, MindMapNode>,
    agenda_node_ids: HashMap<String, MindMapNodeId>,
    root: MindMapNodeId,
}

impl<'a> TreeBuilder<'a> {
    fn new(meeting: &'a Meeting) -> Self {
        let mut nodes = HashMap::new();
        let root_id = MindMapNodeId::new();
        let mut agenda_node_ids = HashMap::new();
        let mut root_children = Vec::new();

        for item in &meeting.agenda {
            let node_id = MindMapNodeId::new();
            root_children.push(node_id.clone());
            agenda_node_ids.insert(item.title.clone(), node_id.clone());
            nodes.insert(
                node_id.clone(),
                agenda_node(item, node_id, root_id.clone()),
            );
        }

        nodes.insert(
            root_id.clone(),
            MindMapNode {
                id: root_id.clone(),
                content: meeting.topic.clone(),
                level: 0,
                parent_id: None,
                children_ids: root_children,
                message_references: Vec::new(),
                metadata: HashMap::new(),
            },
        );

        Self { meeting, nodes, agenda_node_ids, root: root_id }
    }

    /// Attach `point` under `parent` (resolving its own `parent_agenda_title`
    /// when present), then recurse into `sub_points` up to [`MAX_DEPTH`].
    /// `point`'s level is derived from its resolved parent's level, not the
    /// recursion depth, so a point whose `parent_agenda_title` resolves to
    /// an agenda node always lands one level below that node regardless of
    /// how deep in `sub_points` it was nested.
    fn attach(&mut self, point: &DiscussionPoint, fallback_parent: MindMapNodeId) {
        let parent_id = point
            .parent_agenda_title
            .as_ref()
            .and_then(|title| self.agenda_node_ids.get(title))
            .cloned()
            .unwrap_or(fallback_parent);

        let level = self.nodes.get(&parent_id).map(|p| p.level + 1).unwrap_or(1);
        if level > MAX_DEPTH {
            return;
        }

        let message_references: Vec<MessageId> = point
            .message_ids
            .iter()
            .filter_map(|raw| {
                let id = MessageId::from(raw.as_str());
                self.meeting.messages.iter().any(|m| m.id == id).then_some(id)
            })
            .collect();

        let node_id = MindMapNodeId::new();
        let node = MindMapNode {
            id: node_id.clone(),
            content: point.content.clone(),
            level,
            parent_id: Some(parent_id.clone()),
            children_ids: Vec::new(),
            message_references,
            metadata: HashMap::new(),
        };

        self.nodes.insert(node_id.clone(), node);
        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            parent.children_ids.push(node_id.clone());
        }

        for sub in &point.sub_points {
            self.attach(sub, node_id.clone());
        }
    }
}

fn agenda_node(item: &AgendaItem, id: MindMapNodeId, parent: MindMapNodeId) -> MindMapNode {
    MindMapNode {
        id,
        content: item.title.clone(),
        level: 1,
        parent_id: Some(parent),
        children_ids: Vec::new(),
        message_references: Vec::new(),
        metadata: HashMap::new(),
    }
}

/// Render the full transcript speaker-name-prefixed, with message ids
/// prefixed so the model can reference them back via `message_ids`.
fn transcript(meeting: &Meeting) -> String {
    meeting
        .messages
        .iter()
        .map(|m| format!("[{}] {}: {}", m.id, m.speaker_name, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use meeting_core::types::{
        Agent, MeetingConfig, MeetingStatus, Message, ModelConfig, Moderator, Provider, Role, SpeakerType,
    };
    use meeting_core::{AgendaItemId, MeetingId};
    use meeting_providers::{ChatResponse, Result as ProviderResult};
    use tokio::sync::mpsc;

    use super::*;

    struct StubAdapter {
        response: String,
    }

    #[async_trait]
    impl ModelAdapter for StubAdapter {
        fn provider_name(&self) -> &str {
            "stub"
        }

        async fn complete(&self, _: &str, _: &[ChatEntry], _: &ChatParameters) -> ProviderResult<ChatResponse> {
            Ok(ChatResponse { content: self.response.clone(), reasoning_content: None })
        }

        async fn stream(&self, _: &str, _: &[ChatEntry], _: &ChatParameters, _: mpsc::Sender<meeting_providers::StreamDelta>) -> ProviderResult<()> {
            unimplemented!("not exercised by mind-map generation")
        }

        async fn test_connection(&self) -> ProviderResult<()> {
            Ok(())
        }
    }

    fn meeting_with_agenda() -> Meeting {
        let now = Utc::now();
        Meeting {
            id: MeetingId::new(),
            topic: "Launch plan".to_string(),
            participants: vec![Agent {
                id: AgentId::from("1"),
                name: "Alice".to_string(),
                role: Role { name: "PM".to_string(), description: "d".to_string(), system_prompt: "p".to_string() },
                model_config: ModelConfig { provider: Provider::Anthropic, model_name: "m".to_string(), credential: "k".to_string(), parameters: None },
            }],
            moderator: Moderator::User,
            status: MeetingStatus::Active,
            config: MeetingConfig::default(),
            agenda: vec![AgendaItem {
                id: AgendaItemId::new(),
                title: "Timeline".to_string(),
                description: "d".to_string(),
                completed: false,
                created_at: now,
            }],
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
    async fn root_and_agenda_nodes_always_present() {
        let mut meeting = meeting_with_agenda();
        let adapter = StubAdapter { response: "not json".to_string() };
        let mind_map = generate_mind_map(&mut meeting, &adapter, None, "user").await.unwrap();

        let root = &mind_map.nodes[&mind_map.root_node];
        assert_eq!(root.content, "Launch plan");
        assert_eq!(root.children_ids.len(), 1);
        let agenda_node = &mind_map.nodes[&root.children_ids[0]];
        assert_eq!(agenda_node.content, "Timeline");
    }

    #[tokio::test]
    async fn discussion_points_attach_under_matching_agenda_title() {
        let mut meeting = meeting_with_agenda();
        let response = r#"{"discussion_points":[{"content":"Ship date","parent_agenda_title":"Timeline","message_ids":[],"sub_points":[]}]}"#;
        let adapter = StubAdapter { response: response.to_string() };
        let mind_map = generate_mind_map(&mut meeting, &adapter, None, "user").await.unwrap();

        let root = &mind_map.nodes[&mind_map.root_node];
        let agenda_node = &mind_map.nodes[&root.children_ids[0]];
        assert_eq!(agenda_node.children_ids.len(), 1);
        let discussion_node = &mind_map.nodes[&agenda_node.children_ids[0]];
        assert_eq!(discussion_node.content, "Ship date");
        assert_eq!(discussion_node.level, 2);
    }

    #[tokio::test]
    async fn discussion_point_without_matching_agenda_attaches_to_root() {
        let mut meeting = meeting_with_agenda();
        let response = r#"{"discussion_points":[{"content":"Orphan point","parent_agenda_title":"Nonexistent","message_ids":[],"sub_points":[]}]}"#;
        let adapter = StubAdapter { response: response.to_string() };
        let mind_map = generate_mind_map(&mut meeting, &adapter, None, "user").await.unwrap();

        let root = &mind_map.nodes[&mind_map.root_node];
        assert_eq!(root.children_ids.len(), 2);
    }

    #[tokio::test]
    async fn version_bumps_on_regeneration() {
        let mut meeting = meeting_with_agenda();
        let adapter = StubAdapter { response: "not json".to_string() };
        let first = generate_mind_map(&mut meeting, &adapter, None, "user").await.unwrap();
        assert_eq!(first.version, 1);
        let second = generate_mind_map(&mut meeting, &adapter, None, "user").await.unwrap();
        assert_eq!(second.version, 2);
    }

    #[tokio::test]
    async fn unresolvable_message_references_are_dropped() {
        let mut meeting = meeting_with_agenda();
        meeting.messages.push(Message {
            id: MessageId::new(),
            speaker_id: Some(AgentId::from("1")),
            speaker_name: "Alice".to_string(),
            speaker_type: SpeakerType::Agent,
            content: "hi".to_string(),
            reasoning_content: None,
            timestamp: Utc::now(),
            round_number: 0,
            mentions: Vec::new(),
        });
        let real_id = meeting.messages[0].id.to_string();
        let response = format!(
            r#"{{"discussion_points":[{{"content":"x","parent_agenda_title":null,"message_ids":["{real_id}","bogus-id"],"sub_points":[]}}]}}"#
        );
        let adapter = StubAdapter { response };
        let mind_map = generate_mind_map(&mut meeting, &adapter, None, "user").await.unwrap();
        let root = &mind_map.nodes[&mind_map.root_node];
        let discussion_node = &mind_map.nodes[&root.children_ids[1]];
        assert_eq!(discussion_node.message_references.len(), 1);
    }

    #[tokio::test]
    async fn parses_json_wrapped_in_markdown_fence() {
        let mut meeting = meeting_with_agenda();
        let response = "Here's the tree:\n```json\n{\"discussion_points\":[{\"content\":\"Fenced point\",\"parent_agenda_title\":null,\"message_ids\":[],\"sub_points\":[]}]}\n```".to_string();
        let adapter = StubAdapter { response };
        let mind_map = generate_mind_map(&mut meeting, &adapter, None, "user").await.unwrap();
        let root = &mind_map.nodes[&mind_map.root_node];
        assert_eq!(root.children_ids.len(), 2, "one agenda node plus one discussion-point node");
    }
}
