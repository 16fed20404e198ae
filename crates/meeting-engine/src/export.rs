use std::collections::HashMap;

use image::{ImageEncoder, Rgb, RgbImage};
use meeting_core::types::{Meeting, MindMap, MindMapNode, MindMapNodeId};
use meeting_core::{MeetingError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingExportFormat {
    Markdown,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MindMapExportFormat {
    Png,
    Svg,
    Json,
    Markdown,
}

/// Render a meeting for export.
pub fn export_meeting(meeting: &Meeting, format: MeetingExportFormat) -> Result<String> {
    match format {
        MeetingExportFormat::Markdown => Ok(meeting_markdown(meeting)),
        MeetingExportFormat::Json => {
            serde_json::to_string_pretty(meeting).map_err(|e| MeetingError::Internal(e.to_string()))
        }
    }
}

fn meeting_markdown(meeting: &Meeting) -> String {
    let mut out = format!("# {}\n\n", meeting.topic);

    out.push_str("Participants:\n");
    for participant in &meeting.participants {
        out.push_str(&format!("- {} ({})\n", participant.name, participant.role.name));
    }
    out.push('\n');

    for message in &meeting.messages {
        out.push_str(&format!(
            "## {} · {} · {}\n\n{}\n\n",
            message.round_number,
            message.speaker_name,
            message.timestamp.to_rfc3339(),
            message.content
        ));
    }

    if let Some(minutes) = meeting.current_minutes_version() {
        out.push_str("## Minutes\n\n");
        out.push_str(&minutes.summary);
        out.push('\n');
    }

    out
}

/// Render a mind-map for export. PNG/SVG rendering uses a hand-rolled
/// top-down tree layout (breadth assigned by leaf count, depth by `level`)
/// rather than pulling in a general graph-layout crate — correctness for
/// rasterized exports only needs to be structural (every node/edge appears
/// once, root outermost), which this layout satisfies without needing
/// edge-routing or text layout.
pub fn export_mind_map(mind_map: &MindMap, format: MindMapExportFormat) -> Result<Vec<u8>> {
    match format {
        MindMapExportFormat::Json => serde_json::to_vec_pretty(mind_map).map_err(|e| MeetingError::Internal(e.to_string())),
        MindMapExportFormat::Markdown => Ok(mind_map_markdown(mind_map).into_bytes()),
        MindMapExportFormat::Svg => Ok(render_svg(mind_map).into_bytes()),
        MindMapExportFormat::Png => render_png(mind_map),
    }
}

fn mind_map_markdown(mind_map: &MindMap) -> String {
    let mut out = String::new();
    render_markdown_node(mind_map, &mind_map.root_node, &mut out, true);
    out
}

fn render_markdown_node(mind_map: &MindMap, node_id: &MindMapNodeId, out: &mut String, is_root: bool) {
    let Some(node) = mind_map.nodes.get(node_id) else { return };

    if is_root {
        out.push_str(&format!("# {}\n\n", node.content));
    } else {
        let indent = "  ".repeat((node.level as usize).saturating_sub(1));
        let refs = if node.message_references.is_empty() {
            String::new()
        } else {
            format!(" *[{}]*", node.message_references.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", "))
        };
        out.push_str(&format!("{indent}- {}{refs}\n", node.content));
    }

    for child_id in &node.children_ids {
        render_markdown_node(mind_map, child_id, out, false);
    }
}

struct Layout {
    positions: HashMap<MindMapNodeId, (f32, f32)>,
    leaf_span: HashMap<MindMapNodeId, u32>,
}

/// Assign each node a unit-width leaf span (for horizontal placement) and
/// an (x, y) center in a `[0, 1] x [0, 1]` normalized canvas.
fn compute_layout(mind_map: &MindMap) -> Layout {
    let mut leaf_span = HashMap::new();
    count_leaf_spans(mind_map, &mind_map.root_node, &mut leaf_span);

    let total_span = leaf_span.get(&mind_map.root_node).copied().unwrap_or(1).max(1);
    let max_level = mind_map.nodes.values().map(|n| n.level).max().unwrap_or(0).max(1);

    let mut positions = HashMap::new();
    assign_positions(mind_map, &mind_map.root_node, 0, total_span, max_level, &leaf_span, &mut positions);

    Layout { positions, leaf_span }
}

fn count_leaf_spans(mind_map: &MindMap, node_id: &MindMapNodeId, out: &mut HashMap<MindMapNodeId, u32>) -> u32 {
    let Some(node) = mind_map.nodes.get(node_id) else {
        return 1;
    };
    if node.children_ids.is_empty() {
        out.insert(node_id.clone(), 1);
        return 1;
    }
    let span: u32 = node.children_ids.iter().map(|c| count_leaf_spans(mind_map, c, out)).sum();
    out.insert(node_id.clone(), span.max(1));
    span.max(1)
}

#[allow(clippy::too_many_arguments)]
fn assign_positions(
    mind_map: &MindMap,
    node_id: &MindMapNodeId,
    x_start: u32,
    total_span: u32,
    max_level: u32,
    leaf_span: &HashMap<MindMapNodeId, u32>,
    out: &mut HashMap<MindMapNodeId, (f32, f32)>,
) {
    let Some(node) = mind_map.nodes.get(node_id) else { return };
    let span = leaf_span.get(node_id).copied().unwrap_or(1);
    let x_center = (x_start as f32 + span as f32 / 2.0) / total_span as f32;
    let y_center = node.level as f32 / max_level as f32;
    out.insert(node_id.clone(), (x_center, y_center));

    let mut cursor = x_start;
    for child in &node.children_ids {
        let child_span = leaf_span.get(child).copied().unwrap_or(1);
        assign_positions(mind_map, child, cursor, total_span, max_level, leaf_span, out);
        cursor += child_span;
    }
}

fn render_svg(mind_map: &MindMap) -> String {
    const WIDTH: f32 = 1200.0;
    const HEIGHT: f32 = 800.0;
    const NODE_RADIUS: f32 = 6.0;

    let layout = compute_layout(mind_map);
    let mut body = String::new();

    for node in mind_map.nodes.values() {
        if let Some(parent_id) = &node.parent_id {
            if let (Some((x1, y1)), Some((x2, y2))) = (layout.positions.get(parent_id), layout.positions.get(&node.id)) {
                body.push_str(&format!(
                    "<line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"#999\" />\n",
                    x1 * WIDTH,
                    y1 * HEIGHT,
                    x2 * WIDTH,
                    y2 * HEIGHT
                ));
            }
        }
    }

    for node in mind_map.nodes.values() {
        if let Some((x, y)) = layout.positions.get(&node.id) {
            let fill = if node.id == mind_map.root_node { "#2b6cb0" } else { "#63b3ed" };
            body.push_str(&format!(
                "<circle cx=\"{:.1}\" cy=\"{:.1}\" r=\"{NODE_RADIUS}\" fill=\"{fill}\" />\n",
                x * WIDTH,
                y * HEIGHT
            ));
        }
    }

    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH}\" height=\"{HEIGHT}\" viewBox=\"0 0 {WIDTH} {HEIGHT}\">\n{body}</svg>\n"
    )
}

fn render_png(mind_map: &MindMap) -> Result<Vec<u8>> {
    const WIDTH: u32 = 1200;
    const HEIGHT: u32 = 800;

    let layout = compute_layout(mind_map);
    let mut image = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([255, 255, 255]));

    for node in mind_map.nodes.values() {
        if let Some(parent_id) = &node.parent_id {
            if let (Some(p1), Some(p2)) = (layout.positions.get(parent_id), layout.positions.get(&node.id)) {
                draw_line(&mut image, scale(*p1, WIDTH, HEIGHT), scale(*p2, WIDTH, HEIGHT), Rgb([150, 150, 150]));
            }
        }
    }

    for node in mind_map.nodes.values() {
        if let Some(p) = layout.positions.get(&node.id) {
            let color = if node.id == mind_map.root_node { Rgb([30, 90, 160]) } else { Rgb([100, 170, 230]) };
            draw_dot(&mut image, scale(*p, WIDTH, HEIGHT), color);
        }
    }

    let mut bytes = Vec::new();
    image::codecs::png::PngEncoder::new(&mut bytes)
        .write_image(image.as_raw(), WIDTH, HEIGHT, image::ExtendedColorType::Rgb8)
        .map_err(|e| MeetingError::Internal(e.to_string()))?;
    Ok(bytes)
}

fn scale((x, y): (f32, f32), width: u32, height: u32) -> (i64, i64) {
    ((x * width as f32) as i64, (y * height as f32) as i64)
}

fn draw_dot(image: &mut RgbImage, (cx, cy): (i64, i64), color: Rgb<u8>) {
    const RADIUS: i64 = 6;
    for dy in -RADIUS..=RADIUS {
        for dx in -RADIUS..=RADIUS {
            if dx * dx + dy * dy > RADIUS * RADIUS {
                continue;
            }
            put_if_in_bounds(image, cx + dx, cy + dy, color);
        }
    }
}

/// Bresenham's line algorithm — no external drawing crate pulled in for a
/// single primitive.
fn draw_line(image: &mut RgbImage, (mut x0, mut y0): (i64, i64), (x1, y1): (i64, i64), color: Rgb<u8>) {
    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put_if_in_bounds(image, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn put_if_in_bounds(image: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x < 0 || y < 0 || x as u32 >= image.width() || y as u32 >= image.height() {
        return;
    }
    image.put_pixel(x as u32, y as u32, color);
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use meeting_core::types::{
        Agent, MeetingConfig, MeetingStatus, Message, MessageId, Moderator, ModelConfig, Provider, Role, SpeakerType,
    };
    use meeting_core::{AgentId, MeetingId, MindMapId};

    use super::*;

    fn meeting() -> Meeting {
        let now = Utc::now();
        let mut meeting = Meeting {
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
            agenda: Vec::new(),
            messages: Vec::new(),
            current_round: 0,
            minutes_history: Vec::new(),
            current_minutes: None,
            mind_map: None,
            created_at: now,
            updated_at: now,
        };
        meeting.messages.push(Message {
            id: MessageId::new(),
            speaker_id: Some(AgentId::from("1")),
            speaker_name: "Alice".to_string(),
            speaker_type: SpeakerType::Agent,
            content: "Let's begin.".to_string(),
            reasoning_content: None,
            timestamp: now,
            round_number: 0,
            mentions: Vec::new(),
        });
        meeting
    }

    fn simple_mind_map() -> MindMap {
        let root = MindMapNodeId::new();
        let child = MindMapNodeId::new();
        let mut nodes = HashMap::new();
        nodes.insert(
            root.clone(),
            MindMapNode { id: root.clone(), content: "Root".to_string(), level: 0, parent_id: None, children_ids: vec![child.clone()], message_references: Vec::new(), metadata: HashMap::new() },
        );
        nodes.insert(
            child.clone(),
            MindMapNode { id: child.clone(), content: "Child".to_string(), level: 1, parent_id: Some(root.clone()), children_ids: Vec::new(), message_references: Vec::new(), metadata: HashMap::new() },
        );
        MindMap { id: MindMapId::new(), meeting_id: MeetingId::new(), root_node: root, nodes, version: 1, created_at: Utc::now(), created_by: "user".to_string() }
    }

    #[test]
    fn markdown_export_includes_topic_and_messages() {
        let out = export_meeting(&meeting(), MeetingExportFormat::Markdown).unwrap();
        assert!(out.starts_with("# Launch plan"));
        assert!(out.contains("Let's begin."));
        assert!(out.contains("Alice"));
    }

    #[test]
    fn json_export_round_trips_through_serde() {
        let meeting = meeting();
        let out = export_meeting(&meeting, MeetingExportFormat::Json).unwrap();
        let parsed: Meeting = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, meeting);
    }

    #[test]
    fn mind_map_markdown_nests_by_level() {
        let mind_map = simple_mind_map();
        let bytes = export_mind_map(&mind_map, MindMapExportFormat::Markdown).unwrap();
        let out = String::from_utf8(bytes).unwrap();
        assert!(out.starts_with("# Root"));
        assert!(out.contains("- Child"));
    }

    #[test]
    fn svg_export_contains_one_circle_per_node() {
        let mind_map = simple_mind_map();
        let bytes = export_mind_map(&mind_map, MindMapExportFormat::Svg).unwrap();
        let out = String::from_utf8(bytes).unwrap();
        assert_eq!(out.matches("<circle").count(), 2);
    }

    #[test]
    fn png_export_produces_a_decodable_image() {
        let mind_map = simple_mind_map();
        let bytes = export_mind_map(&mind_map, MindMapExportFormat::Png).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 1200);
        assert_eq!(decoded.height(), 800);
    }
}
