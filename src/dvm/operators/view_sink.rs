//! Snapshot/View sink: folds the change stream into a materialized result
//! and tracks `ResultType` (§4.2, §4.3).

use std::collections::{BTreeMap, HashMap};

use crate::ast::Direction;
use crate::change::Change;
use crate::error::EngineError;
use crate::value::{Row, RowKey, Value};

/// `unknown` while at least one source is still catching up; `complete`
/// once all sources have acknowledged the baseline version. Transitions at
/// most once, monotonically (§3, §8 invariant 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    Unknown,
    Complete,
}

pub struct ViewSink {
    columns: Vec<String>,
    dirs: Vec<Direction>,
    pk_columns: Vec<String>,
    rows: BTreeMap<(Vec<Value>, RowKey), Row>,
    related: HashMap<RowKey, HashMap<String, Vec<Row>>>,
    result_type: ResultType,
}

impl ViewSink {
    pub fn new(columns: Vec<String>, dirs: Vec<Direction>, pk_columns: Vec<String>) -> Self {
        Self {
            columns,
            dirs,
            pk_columns,
            rows: BTreeMap::new(),
            related: HashMap::new(),
            result_type: ResultType::Unknown,
        }
    }

    pub fn result_type(&self) -> ResultType {
        self.result_type
    }

    /// Called once all of the view's `TableSource`s have reported
    /// `gotCallback` at or past the view's baseline version.
    pub fn mark_complete(&mut self) {
        self.result_type = ResultType::Complete;
    }

    /// Folds one change into the snapshot. Returns `true` if the visible
    /// snapshot changed (used by the materializer to decide whether to
    /// notify listeners after a `commit()`).
    pub fn apply(&mut self, change: Change) -> Result<bool, EngineError> {
        match change {
            Change::Add(row) => {
                let key = self.entry_key(&row);
                let changed = self.rows.insert(key, row).is_none();
                Ok(changed)
            }
            Change::Remove(row) => {
                let key = self.entry_key(&row);
                let pk = row.key(&self.pk_columns);
                self.related.remove(&pk);
                Ok(self.rows.remove(&key).is_some())
            }
            Change::Edit { old, new } => {
                let old_key = self.entry_key(&old);
                let new_key = self.entry_key(&new);
                self.rows.remove(&old_key);
                self.rows.insert(new_key, new);
                Ok(true)
            }
            Change::Child { parent, relationship, change } => {
                let pk = parent.key(&self.pk_columns);
                let bucket = self.related.entry(pk).or_default().entry(relationship).or_default();
                match *change {
                    Change::Add(child) => {
                        bucket.push(child);
                        Ok(true)
                    }
                    Change::Remove(child) => {
                        let child_pk_guess = child.clone();
                        let before = bucket.len();
                        bucket.retain(|r| *r != child_pk_guess);
                        Ok(bucket.len() != before)
                    }
                    Change::Edit { old, new } => {
                        if let Some(slot) = bucket.iter_mut().find(|r| **r == old) {
                            *slot = new;
                        }
                        Ok(true)
                    }
                    Change::Child { .. } => Err(EngineError::OperatorInvariant(
                        "ViewSink does not support doubly-nested relationships".into(),
                    )),
                }
            }
        }
    }

    fn entry_key(&self, row: &Row) -> (Vec<Value>, RowKey) {
        (row.sort_key(&self.columns), row.key(&self.pk_columns))
    }

    /// The current ordered snapshot, with each row's related rows attached
    /// under their relationship name.
    pub fn snapshot(&self) -> Vec<(Row, HashMap<String, Vec<Row>>)> {
        self.rows
            .values()
            .map(|row| {
                let pk = row.key(&self.pk_columns);
                let related = self.related.get(&pk).cloned().unwrap_or_default();
                (row.clone(), related)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dvm::operators::test_helpers::{comment, issue};

    fn sink() -> ViewSink {
        ViewSink::new(vec!["id".into()], vec![Direction::Asc], vec!["id".into()])
    }

    #[test]
    fn test_apply_add_then_snapshot_ordered() {
        let mut s = sink();
        s.apply(Change::Add(issue("2", "b", false))).unwrap();
        s.apply(Change::Add(issue("1", "a", false))).unwrap();
        let snap = s.snapshot();
        assert_eq!(snap[0].0.get("id").unwrap().to_string(), "1");
    }

    #[test]
    fn test_result_type_starts_unknown_and_is_monotone() {
        let mut s = sink();
        assert_eq!(s.result_type(), ResultType::Unknown);
        s.mark_complete();
        assert_eq!(s.result_type(), ResultType::Complete);
    }

    #[test]
    fn test_child_change_attaches_related_rows() {
        let mut s = sink();
        s.apply(Change::Add(issue("1", "a", false))).unwrap();
        s.apply(Change::Add(comment("c1", "1", "bug")).wrap_child(issue("1", "a", false), "comments"))
            .unwrap();
        let snap = s.snapshot();
        assert_eq!(snap[0].1.get("comments").unwrap().len(), 1);
    }

    #[test]
    fn test_remove_drops_row_and_its_related() {
        let mut s = sink();
        s.apply(Change::Add(issue("1", "a", false))).unwrap();
        s.apply(Change::Add(comment("c1", "1", "bug")).wrap_child(issue("1", "a", false), "comments"))
            .unwrap();
        s.apply(Change::Remove(issue("1", "a", false))).unwrap();
        assert_eq!(s.len(), 0);
    }
}
