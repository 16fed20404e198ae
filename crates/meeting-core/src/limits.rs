//! Tunable constants, centralized so the rest of the workspace reads from
//! one place instead of scattering magic numbers across call sites.

/// Retry policy.
pub const RETRY_MAX_ATTEMPTS: u32 = 3;
pub const RETRY_BASE_DELAY_MS: u64 = 500;
pub const RETRY_CAP_MS: u64 = 8_000;

/// Default auto-response chain depth.
pub const DEFAULT_CHAIN_DEPTH: u32 = 4;

/// Per-subscriber broadcast buffer capacity.
pub const BROADCAST_CAPACITY: usize = 256;

/// Default adapter deadlines.
pub const STREAMING_TIMEOUT_SECS: u64 = 120;
pub const COMPLETION_TIMEOUT_SECS: u64 = 60;

/// "Mentioned in any of the last N persisted messages" notice window.
pub const MENTION_NOTICE_WINDOW: usize = 5;

/// Field-length bounds.
pub const AGENT_NAME_MAX: usize = 50;
pub const ROLE_NAME_MAX: usize = 50;
pub const ROLE_DESCRIPTION_MAX: usize = 2000;
pub const ROLE_SYSTEM_PROMPT_MAX: usize = 2000;
pub const MEETING_TOPIC_MAX: usize = 200;
pub const AGENDA_TITLE_MAX: usize = 200;

/// Truncation marker, appended verbatim when content is cut to the
/// configured length limit.
pub const TRUNCATION_MARKER: &str = " …[truncated]";
