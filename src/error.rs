//! Error types for the engine.
//!
//! All errors produced by the engine are represented by [`EngineError`].
//! Errors are propagated via `Result<T, EngineError>` throughout the crate.
//!
//! # Error Classification
//!
//! Errors are classified into kinds that determine retry behavior:
//! - **Validation** — bad arguments, AST invariant violations. Never retried.
//! - **Schema** — unknown table/column/relationship. Never retried.
//! - **Store** — primary-key conflicts, missing rows. Never retried.
//! - **OperatorInvariant** — impossible operator state. Fatal to the owning view.
//! - **ChangeSource** — reset required, version gap. Retried with backoff.
//! - **Cancellation** — cooperative cancel, deadline exceeded. Never retried.
//! - **Planner** — statistics unavailable; never surfaces as a query failure.
//!
//! # Retry Policy
//!
//! [`RetryPolicy`] encapsulates exponential backoff with jitter for change-source
//! errors. The scheduler uses this to decide whether and when to reconnect.

use std::fmt;

/// Primary error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    // ── Validation errors — fail, don't retry ────────────────────────────
    /// An argument failed a query's validator.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An AST violates a structural invariant.
    #[error("invalid query: {0}")]
    QueryParseError(String),

    /// `limit`/`orderBy` appeared on the inner edge of a junction relationship.
    #[error("limit/orderBy not allowed on junction inner edge: {0}")]
    UnsupportedJunctionModifier(String),

    /// A query registered with an async validator.
    #[error("async validators are not supported: {0}")]
    AsyncValidatorUnsupported(String),

    /// Lookup of an unregistered query name.
    #[error("unknown query: {0}")]
    UnknownQuery(String),

    /// `mapAST` referenced a table/column absent from the name map.
    #[error("unknown name: {0}")]
    UnknownName(String),

    /// Two registrations under the same key disagree.
    #[error("conflicting registration: {0}")]
    ConflictingRegistration(String),

    // ── Schema errors ─────────────────────────────────────────────────────
    /// Referenced table does not exist in the schema.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// Referenced column does not exist on its table.
    #[error("unknown column: {0}.{1}")]
    UnknownColumn(String, String),

    /// Referenced relationship does not exist on its table.
    #[error("unknown relationship: {0}.{1}")]
    UnknownRelationship(String, String),

    // ── Store errors ───────────────────────────────────────────────────────
    /// `add` attempted on a key already present.
    #[error("primary key conflict in {table}: {key}")]
    PrimaryKeyConflict { table: String, key: String },

    /// `remove`/`edit` attempted on a key absent from the store.
    #[error("row not found in {table}: {key}")]
    NotFound { table: String, key: String },

    // ── Operator invariant errors — fatal to the owning view ──────────────
    /// An operator reached a state its invariants forbid (negative ref-count,
    /// duplicate add, missing parent on a `child` change, ...).
    #[error("operator invariant violated: {0}")]
    OperatorInvariant(String),

    /// A predicate raised during evaluation on a single row.
    #[error("evaluation error: {0}")]
    EvaluationError(String),

    // ── Change source errors — retried with backoff ────────────────────────
    /// The change source signaled it can no longer continue incrementally.
    #[error("change source reset required: {0}")]
    ChangeSourceReset(String),

    /// The consumer observed a version gap in the transaction stream.
    #[error("version gap in change source: {0}")]
    VersionGap(String),

    /// The change source sent a message the consumer does not understand.
    #[error("unknown change source message: {0}")]
    UnknownMessage(String),

    // ── Cancellation errors ─────────────────────────────────────────────────
    /// A caller-supplied `shouldYield` observed a cooperative cancel.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// A caller-supplied `shouldYield` observed a deadline.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    // ── Internal errors — should not happen ─────────────────────────────────
    /// An unexpected internal error. Indicates a bug.
    #[error("internal error: {0}")]
    InternalError(String),
}

impl EngineError {
    /// Whether this error is retryable (by the change-source reconnect loop).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::ChangeSourceReset(_)
                | EngineError::VersionGap(_)
                | EngineError::UnknownMessage(_)
        )
    }

    /// Whether this error is fatal to the owning view and should destroy it.
    pub fn is_fatal_to_view(&self) -> bool {
        matches!(
            self,
            EngineError::OperatorInvariant(_) | EngineError::ChangeSourceReset(_)
        )
    }

    /// Whether this error should count toward a consecutive-failure limit.
    pub fn counts_toward_suspension(&self) -> bool {
        !matches!(self, EngineError::EvaluationError(_))
    }
}

/// Classification of error kind for monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    Validation,
    Schema,
    Store,
    OperatorInvariant,
    ChangeSource,
    Cancellation,
    Planner,
    Internal,
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineErrorKind::Validation => write!(f, "VALIDATION"),
            EngineErrorKind::Schema => write!(f, "SCHEMA"),
            EngineErrorKind::Store => write!(f, "STORE"),
            EngineErrorKind::OperatorInvariant => write!(f, "OPERATOR_INVARIANT"),
            EngineErrorKind::ChangeSource => write!(f, "CHANGE_SOURCE"),
            EngineErrorKind::Cancellation => write!(f, "CANCELLATION"),
            EngineErrorKind::Planner => write!(f, "PLANNER"),
            EngineErrorKind::Internal => write!(f, "INTERNAL"),
        }
    }
}

impl EngineError {
    /// Classify the error for monitoring and alerting.
    pub fn kind(&self) -> EngineErrorKind {
        match self {
            EngineError::InvalidArgument(_)
            | EngineError::QueryParseError(_)
            | EngineError::UnsupportedJunctionModifier(_)
            | EngineError::AsyncValidatorUnsupported(_)
            | EngineError::UnknownQuery(_)
            | EngineError::UnknownName(_)
            | EngineError::ConflictingRegistration(_) => EngineErrorKind::Validation,

            EngineError::UnknownTable(_)
            | EngineError::UnknownColumn(_, _)
            | EngineError::UnknownRelationship(_, _) => EngineErrorKind::Schema,

            EngineError::PrimaryKeyConflict { .. } | EngineError::NotFound { .. } => {
                EngineErrorKind::Store
            }

            EngineError::OperatorInvariant(_) | EngineError::EvaluationError(_) => {
                EngineErrorKind::OperatorInvariant
            }

            EngineError::ChangeSourceReset(_)
            | EngineError::VersionGap(_)
            | EngineError::UnknownMessage(_) => EngineErrorKind::ChangeSource,

            EngineError::Cancelled(_) | EngineError::DeadlineExceeded(_) => {
                EngineErrorKind::Cancellation
            }

            EngineError::InternalError(_) => EngineErrorKind::Internal,
        }
    }
}

// ── Retry Policy ───────────────────────────────────────────────────────────

/// Retry policy with exponential backoff for change-source reconnects.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Base delay in milliseconds (doubled each attempt).
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds (cap for backoff).
    pub max_delay_ms: u64,
    /// Maximum number of retry attempts before giving up.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Calculate the backoff delay in milliseconds for the given attempt number (0-based).
    ///
    /// Uses exponential backoff: `base_delay * 2^attempt`, capped at `max_delay`.
    /// Adds simple jitter by varying ±25%.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let delay = self.base_delay_ms.saturating_mul(1u64 << attempt.min(16));
        let capped = delay.min(self.max_delay_ms);

        if attempt.is_multiple_of(2) {
            capped.saturating_mul(3) / 4
        } else {
            capped.saturating_mul(5) / 4
        }
    }

    /// Whether the given attempt (0-based) is within the retry limit.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

// ── Reconnect retry state ──────────────────────────────────────────────────

/// Tracks retry state for a single change source's reconnect loop.
#[derive(Debug, Clone)]
pub struct RetryState {
    /// Number of consecutive retryable failures.
    pub attempts: u32,
    /// Timestamp (epoch millis) when the next retry is allowed.
    pub next_retry_at_ms: u64,
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryState {
    pub fn new() -> Self {
        Self {
            attempts: 0,
            next_retry_at_ms: 0,
        }
    }

    /// Record a retryable failure and compute the next retry time.
    ///
    /// Returns `true` if another retry is allowed, `false` if max attempts exhausted.
    pub fn record_failure(&mut self, policy: &RetryPolicy, now_ms: u64) -> bool {
        self.attempts += 1;
        if policy.should_retry(self.attempts) {
            self.next_retry_at_ms = now_ms + policy.backoff_ms(self.attempts - 1);
            true
        } else {
            false
        }
    }

    /// Reset retry state after a successful reconnect.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.next_retry_at_ms = 0;
    }

    /// Whether the source is currently in a retry-backoff period.
    pub fn is_in_backoff(&self, now_ms: u64) -> bool {
        self.attempts > 0 && now_ms < self.next_retry_at_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert_eq!(
            EngineError::QueryParseError("x".into()).kind(),
            EngineErrorKind::Validation
        );
        assert_eq!(
            EngineError::UnknownTable("x".into()).kind(),
            EngineErrorKind::Schema
        );
        assert_eq!(
            EngineError::PrimaryKeyConflict {
                table: "t".into(),
                key: "1".into()
            }
            .kind(),
            EngineErrorKind::Store
        );
        assert_eq!(
            EngineError::ChangeSourceReset("x".into()).kind(),
            EngineErrorKind::ChangeSource
        );
        assert_eq!(
            EngineError::InternalError("x".into()).kind(),
            EngineErrorKind::Internal
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(EngineError::ChangeSourceReset("x".into()).is_retryable());
        assert!(EngineError::VersionGap("x".into()).is_retryable());
        assert!(EngineError::UnknownMessage("x".into()).is_retryable());

        assert!(!EngineError::QueryParseError("x".into()).is_retryable());
        assert!(!EngineError::OperatorInvariant("x".into()).is_retryable());
    }

    #[test]
    fn test_fatal_to_view() {
        assert!(EngineError::OperatorInvariant("x".into()).is_fatal_to_view());
        assert!(EngineError::ChangeSourceReset("x".into()).is_fatal_to_view());
        assert!(!EngineError::EvaluationError("x".into()).is_fatal_to_view());
    }

    #[test]
    fn test_retry_policy_backoff() {
        let policy = RetryPolicy {
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            max_attempts: 5,
        };

        assert_eq!(policy.backoff_ms(0), 750);
        assert_eq!(policy.backoff_ms(1), 2500);
        assert_eq!(policy.backoff_ms(2), 3000);
        assert_eq!(policy.backoff_ms(3), 10_000);
        assert_eq!(policy.backoff_ms(4), 7500);
    }

    #[test]
    fn test_retry_policy_should_retry() {
        let policy = RetryPolicy {
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            max_attempts: 3,
        };

        assert!(policy.should_retry(0));
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_retry_state_lifecycle() {
        let policy = RetryPolicy::default();
        let mut state = RetryState::new();

        assert!(!state.is_in_backoff(1000));

        let now = 10_000;
        assert!(state.record_failure(&policy, now));
        assert_eq!(state.attempts, 1);
        assert!(state.is_in_backoff(now + 100));
        assert!(!state.is_in_backoff(now + 100_000));

        state.reset();
        assert_eq!(state.attempts, 0);
        assert!(!state.is_in_backoff(0));
    }

    #[test]
    fn test_retry_state_max_attempts_exhausted() {
        let policy = RetryPolicy {
            base_delay_ms: 100,
            max_delay_ms: 1000,
            max_attempts: 2,
        };
        let mut state = RetryState::new();

        assert!(state.record_failure(&policy, 1000));
        assert_eq!(state.attempts, 1);
        assert!(!state.record_failure(&policy, 2000));
        assert_eq!(state.attempts, 2);
    }
}
