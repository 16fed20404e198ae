pub mod context;
pub mod coordinator;
pub mod export;
pub mod meeting;
pub mod mentions;
pub mod mindmap;
pub mod minutes;
pub mod orchestrator;
pub mod selector;
pub mod turn;

pub use coordinator::TurnCoordinator;
pub use export::{export_meeting, export_mind_map, MeetingExportFormat, MindMapExportFormat};
pub use mentions::{parse_mentions, ParsedMention};
pub use orchestrator::MeetingOrchestrator;
pub use selector::{select_next_speakers, SelectionMode};
pub use turn::{execute_turn, TurnMode, TurnOutcome};
