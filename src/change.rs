//! Row-level change messages (§3).
//!
//! A [`Change`] is the unit of propagation through the operator graph: every
//! operator's `push` consumes one and emits zero or more.

use crate::value::Row;

/// A row-level delta.
#[derive(Debug, Clone)]
pub enum Change {
    /// Introduces a row in the node's output.
    Add(Row),
    /// Withdraws a previously emitted row.
    Remove(Row),
    /// Same key, different non-key columns; preserves identity.
    Edit { old: Row, new: Row },
    /// A recursive change into a nested subquery, tagged with the parent row
    /// and the relationship it arrived through.
    Child {
        parent: Row,
        relationship: String,
        change: Box<Change>,
    },
}

impl Change {
    /// The row this change directly concerns (for `Child`, the parent row —
    /// callers that need the nested row should match through to `change`).
    pub fn primary_row(&self) -> &Row {
        match self {
            Change::Add(r) | Change::Remove(r) => r,
            Change::Edit { new, .. } => new,
            Change::Child { parent, .. } => parent,
        }
    }

    pub fn wrap_child(self, parent: Row, relationship: impl Into<String>) -> Change {
        Change::Child {
            parent,
            relationship: relationship.into(),
            change: Box::new(self),
        }
    }
}
