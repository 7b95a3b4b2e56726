//! Row identity strategies for derived operator output.
//!
//! A `TableSource`'s row identity is just its table's primary key. Every
//! operator downstream of a join, fan-in, or group-by needs a strategy for
//! computing a stable identity over a row whose shape it invented — not
//! from declared PK columns. This generalizes the teacher's per-query row-id
//! strategy selection to the operator graph.

use crate::value::{Row, RowKey};

#[derive(Debug, Clone)]
pub enum RowIdStrategy {
    /// Use the declared primary-key columns of the underlying table.
    PrimaryKey { pk_columns: Vec<String> },
    /// Hash every column; used when no declared key columns apply (e.g. a
    /// fan-out branch with no new columns).
    AllColumns { columns: Vec<String> },
    /// Combine a parent key with a child key, used by `Join`'s nested child
    /// sequences and by `FanIn`'s cross-branch dedup.
    CombineKeys { parent: Box<RowIdStrategy>, child: Box<RowIdStrategy> },
    /// Pass through an upstream operator's own identity unchanged (`Filter`,
    /// `Skip`, `Take` all reuse their input's identity).
    PassThrough { inner: Box<RowIdStrategy> },
}

impl RowIdStrategy {
    pub fn row_key(&self, row: &Row) -> RowKey {
        match self {
            RowIdStrategy::PrimaryKey { pk_columns } => row.key(pk_columns),
            RowIdStrategy::AllColumns { columns } => row.key(columns),
            RowIdStrategy::CombineKeys { parent, child } => {
                let p = parent.row_key(row);
                let c = child.row_key(row);
                RowKey::new([Some(&crate::value::Value::String(p.to_string())), Some(&crate::value::Value::String(c.to_string()))])
            }
            RowIdStrategy::PassThrough { inner } => inner.row_key(row),
        }
    }
}
