//! Engine-wide configuration (SPEC_FULL.md §D).
//!
//! Replaces the teacher's GUC variables (registered with PostgreSQL at
//! extension load) with a plain struct an embedder constructs and passes to
//! [`crate::engine::Engine::new`]. Every field has a default matching the
//! teacher's GUC defaults where a direct analogue exists.

use serde::{Deserialize, Serialize};

/// Tunables for one engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cooperative scheduler time slice before a `yieldProcess` is forced
    /// (§4.6 `YIELD_THRESHOLD_MS`).
    pub yield_threshold_ms: u64,

    /// Base delay for the change-source reconnect backoff (§4.7, §7).
    pub retry_base_delay_ms: u64,
    /// Ceiling for the change-source reconnect backoff.
    pub retry_max_delay_ms: u64,
    /// Attempts before a change-source reconnect is abandoned and surfaced
    /// to the caller as exhausted.
    pub retry_max_attempts: u32,

    /// Default time-to-live for a `preload`d graph with no active view
    /// subscription, in milliseconds (§4.3).
    pub preload_ttl_ms: u64,

    /// Whether `run(ast, {type: "complete"})` is permitted to block
    /// indefinitely, or must be bounded by a deadline.
    pub default_run_deadline_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            yield_threshold_ms: 250,
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 30_000,
            retry_max_attempts: 8,
            preload_ttl_ms: 60_000,
            default_run_deadline_ms: None,
        }
    }
}

impl EngineConfig {
    pub fn retry_policy(&self) -> crate::error::RetryPolicy {
        crate::error::RetryPolicy {
            base_delay_ms: self.retry_base_delay_ms,
            max_delay_ms: self.retry_max_delay_ms,
            max_attempts: self.retry_max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_spec_yield_threshold() {
        assert_eq!(EngineConfig::default().yield_threshold_ms, 250);
    }

    #[test]
    fn test_deserialize_partial_overrides_fill_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"yield_threshold_ms": 50}"#).unwrap();
        assert_eq!(cfg.yield_threshold_ms, 50);
        assert_eq!(cfg.retry_max_attempts, 8);
    }
}
