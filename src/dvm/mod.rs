//! The incremental operator graph (C3, §4.2).
//!
//! Operators are stateful dataflow nodes. Each accepts one upstream [`Change`]
//! via `push` and emits zero or more downstream `Change`s; a subset also
//! support `pull`, used only during hydration to build initial state from an
//! ordered scan of their upstream (§4.2 "Hydration").
//!
//! This module keeps the teacher's differential-view-maintenance framing —
//! every operator here implements the same per-operator rewrite rule the
//! teacher's SQL delta generator encoded as text (e.g. `ΔI(σP(Q)) =
//! σP(ΔI(Q))` for filter) — but executes it directly over in-memory
//! [`Change`] values instead of generating SQL.

pub mod graph;
pub mod operators;
pub mod row_id;

use crate::change::Change;
use crate::error::EngineError;

/// A stateful dataflow node.
///
/// `push` must not be called with a `Change` the operator cannot interpret
/// (e.g. a `Child` change addressed to a relationship the operator does not
/// own); implementations return `OperatorInvariant` rather than panic, since
/// an operator invariant violation is fatal to the owning view, not the
/// process (§4.2 "Failure semantics").
pub trait Operator {
    fn push(&mut self, change: Change) -> Result<Vec<Change>, EngineError>;

    /// Pull the operator's current output as a batch of `add`s, used during
    /// hydration. The default implementation returns nothing, appropriate
    /// for operators with no independent state (e.g. `Filter`, which simply
    /// re-evaluates whatever its upstream pulls).
    fn pull(&mut self) -> Result<Vec<Change>, EngineError> {
        Ok(Vec::new())
    }
}
