//! TableSource: the operator graph's leaf, reading from C2 (§4.2).
//!
//! Emits rows from a [`crate::source::Source`] in a chosen ordering. Output
//! order equals the requested order; the only side effect is pinning that
//! ordering on the source via `connect` (done by the caller that builds the
//! graph, not by this operator, since pinning requires mutable access to the
//! shared `Source`).

use crate::change::Change;
use crate::dvm::Operator;
use crate::error::EngineError;
use crate::value::Row;

pub struct TableSource {
    pub table: String,
    /// Rows pulled during hydration, in the pinned ordering. Consumed by
    /// `pull`; empty afterward.
    pending_hydration: Vec<Row>,
}

impl TableSource {
    pub fn new(table: impl Into<String>, hydration_snapshot: Vec<Row>) -> Self {
        Self {
            table: table.into(),
            pending_hydration: hydration_snapshot,
        }
    }
}

impl Operator for TableSource {
    fn push(&mut self, change: Change) -> Result<Vec<Change>, EngineError> {
        // TableSource performs no transformation of its own; it simply
        // relays whatever the source fed it (§4.2: "Output order = requested
        // order").
        Ok(vec![change])
    }

    fn pull(&mut self) -> Result<Vec<Change>, EngineError> {
        Ok(std::mem::take(&mut self.pending_hydration)
            .into_iter()
            .map(Change::Add)
            .collect())
    }
}
