use serde::{Deserialize, Serialize};

use crate::limits;

/// Tunables a deployment may want to override without a rebuild: retry
/// shape, default auto-response chain depth, broadcast buffer capacity, and
/// per-provider adapter deadlines. Loadable from a TOML file layered under
/// environment variables via `figment`; not wired to a CLI (out of scope
/// here) — just a plain constructor a host application calls before
/// building an orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundTableConfig {
    /// Retry policy: attempts, exponential backoff base/cap (full jitter).
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_cap_ms: u64,

    /// Default auto-response chain depth.
    pub chain_depth: u32,

    /// Per-subscriber broadcast buffer capacity.
    pub broadcast_capacity: usize,

    /// Default adapter deadlines.
    pub streaming_timeout_secs: u64,
    pub completion_timeout_secs: u64,
}

impl Default for RoundTableConfig {
    fn default() -> Self {
        Self {
            retry_max_attempts: limits::RETRY_MAX_ATTEMPTS,
            retry_base_delay_ms: limits::RETRY_BASE_DELAY_MS,
            retry_cap_ms: limits::RETRY_CAP_MS,
            chain_depth: limits::DEFAULT_CHAIN_DEPTH,
            broadcast_capacity: limits::BROADCAST_CAPACITY,
            streaming_timeout_secs: limits::STREAMING_TIMEOUT_SECS,
            completion_timeout_secs: limits::COMPLETION_TIMEOUT_SECS,
        }
    }
}

impl RoundTableConfig {
    /// Load configuration from a TOML file at `path`, then layer
    /// `ROUNDTABLE_`-prefixed environment variables on top (e.g.
    /// `ROUNDTABLE_CHAIN_DEPTH=6`). Missing file or unset keys fall back to
    /// [`Default::default`] — the file need not exist for this to succeed.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, figment::Error> {
        use figment::providers::{Env, Format, Serialized, Toml};
        use figment::Figment;

        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("ROUNDTABLE_"))
            .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_limits_constants() {
        let config = RoundTableConfig::default();
        assert_eq!(config.retry_max_attempts, limits::RETRY_MAX_ATTEMPTS);
        assert_eq!(config.chain_depth, limits::DEFAULT_CHAIN_DEPTH);
        assert_eq!(config.broadcast_capacity, limits::BROADCAST_CAPACITY);
    }

    #[test]
    fn load_falls_back_to_defaults_when_file_is_absent() {
        let config = RoundTableConfig::load("/nonexistent/roundtable.toml").unwrap();
        assert_eq!(config, RoundTableConfig::default());
    }

    #[test]
    fn env_override_takes_precedence_over_default() {
        std::env::set_var("ROUNDTABLE_CHAIN_DEPTH", "9");
        let config = RoundTableConfig::load("/nonexistent/roundtable.toml").unwrap();
        std::env::remove_var("ROUNDTABLE_CHAIN_DEPTH");
        assert_eq!(config.chain_depth, 9);
    }
}
