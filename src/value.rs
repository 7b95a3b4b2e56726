//! Row values and rows.
//!
//! A [`Value`] is the scalar domain column values are drawn from (§3: "A
//! mapping from column name to a value drawn from {string, integer, double,
//! boolean, null, JSON tree}"). A [`Row`] is an ordered mapping from column
//! name to `Value`; ordering is by column name so that two rows with the
//! same columns always compare and hash identically regardless of
//! construction order.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::hash::hash_multi;

/// A single column value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Json(Json),
}

impl Value {
    /// A stable text rendering used for hashing and the NULL-sentinel in
    /// composite key construction. Distinct variants never collide.
    pub fn hash_repr(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Bool(b) => Some(format!("b:{b}")),
            Value::Int(i) => Some(format!("i:{i}")),
            Value::Float(f) => Some(format!("f:{f}")),
            Value::String(s) => Some(format!("s:{s}")),
            Value::Json(j) => Some(format!("j:{j}")),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(d) => write!(f, "{d}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Json(j) => write!(f, "{j}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

/// Total order over values for `orderBy`/`start` comparisons.
///
/// `NULL` sorts first (matches the SQL convention the planner's index scans
/// rely on); numeric variants compare by value even across `Int`/`Float`;
/// mismatched non-numeric variants fall back to a stable type-rank order so
/// comparisons never panic.
impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use Value::*;
        Some(match (self, other) {
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.partial_cmp(b)?,
            (Int(a), Float(b)) => (*a as f64).partial_cmp(b)?,
            (Float(a), Int(b)) => a.partial_cmp(&(*b as f64))?,
            (String(a), String(b)) => a.cmp(b),
            (Json(a), Json(b)) => a.to_string().cmp(&b.to_string()),
            (a, b) => type_rank(a).cmp(&type_rank(b)),
        })
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int(_) => 2,
        Value::Float(_) => 2,
        Value::String(_) => 3,
        Value::Json(_) => 4,
    }
}

/// A row: an ordered mapping from column name to value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Row(pub BTreeMap<String, Value>);

impl Row {
    pub fn new() -> Self {
        Row(BTreeMap::new())
    }

    pub fn get(&self, col: &str) -> Option<&Value> {
        self.0.get(col)
    }

    pub fn set(&mut self, col: impl Into<String>, val: Value) {
        self.0.insert(col.into(), val);
    }

    pub fn with(mut self, col: impl Into<String>, val: Value) -> Self {
        self.set(col, val);
        self
    }

    /// Project the primary-key columns out of this row, in declared order.
    pub fn key(&self, pk_columns: &[String]) -> RowKey {
        RowKey::new(pk_columns.iter().map(|c| self.get(c)))
    }

    /// Project an arbitrary ordered column list into a sort key for
    /// `orderBy`/`start` comparisons.
    pub fn sort_key(&self, columns: &[String]) -> Vec<Value> {
        columns
            .iter()
            .map(|c| self.get(c).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

/// A hashed, totally-ordered primary-key value.
///
/// Rows are unique on this key within a source (§3, §4.1). Two rows with the
/// same key columns but supplied in different order hash and compare
/// identically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowKey(pub u64, pub String);

impl RowKey {
    pub fn new<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a Value>>,
    {
        let reprs: Vec<Option<String>> = values.into_iter().map(|v| v.and_then(Value::hash_repr)).collect();
        let text = reprs
            .iter()
            .map(|r| r.as_deref().unwrap_or(""))
            .collect::<Vec<_>>()
            .join("\x1E");
        let hash = hash_multi(reprs.iter().map(|r| r.as_deref()));
        RowKey(hash, text)
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.1)
    }
}
