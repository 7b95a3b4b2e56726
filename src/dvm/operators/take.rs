//! Take: limit the output to the first `k` rows of an ordering (§4.2).
//!
//! Maintains the full candidate set seen so far, not just the current
//! window, so that a removal inside the window can be compensated by
//! promoting the next candidate from just outside it, and an insertion
//! ahead of the boundary can emit the matching eviction.

use std::collections::HashMap;

use crate::ast::Direction;
use crate::change::Change;
use crate::dvm::row_id::RowIdStrategy;
use crate::dvm::Operator;
use crate::error::EngineError;
use crate::ordering::compare_keys;
use crate::value::{Row, RowKey};

pub struct Take {
    k: usize,
    columns: Vec<String>,
    dirs: Vec<Direction>,
    row_id: RowIdStrategy,
    candidates: HashMap<RowKey, Row>,
}

impl Take {
    pub fn new(k: usize, columns: Vec<String>, dirs: Vec<Direction>, row_id: RowIdStrategy) -> Self {
        Self { k, columns, dirs, row_id, candidates: HashMap::new() }
    }

    fn sorted_keys(&self) -> Vec<RowKey> {
        let mut entries: Vec<(Vec<crate::value::Value>, RowKey)> = self
            .candidates
            .iter()
            .map(|(key, row)| (row.sort_key(&self.columns), key.clone()))
            .collect();
        entries.sort_by(|a, b| compare_keys(&a.0, &b.0, &self.dirs));
        entries.into_iter().map(|(_, k)| k).collect()
    }

    fn window(&self) -> Vec<RowKey> {
        self.sorted_keys().into_iter().take(self.k).collect()
    }

    fn diff_windows(&self, before: &[RowKey], after: &[RowKey]) -> Vec<Change> {
        let before_set: std::collections::HashSet<_> = before.iter().collect();
        let after_set: std::collections::HashSet<_> = after.iter().collect();
        let mut changes = Vec::new();
        for key in before {
            if !after_set.contains(key) {
                if let Some(row) = self.candidates.get(key) {
                    changes.push(Change::Remove(row.clone()));
                }
            }
        }
        for key in after {
            if !before_set.contains(key) {
                if let Some(row) = self.candidates.get(key) {
                    changes.push(Change::Add(row.clone()));
                }
            }
        }
        changes
    }

    fn apply(&mut self, f: impl FnOnce(&mut Self)) -> Vec<Change> {
        let before = self.window();
        f(self);
        let after = self.window();
        self.diff_windows(&before, &after)
    }
}

impl Operator for Take {
    fn push(&mut self, change: Change) -> Result<Vec<Change>, EngineError> {
        Ok(match change {
            Change::Add(row) => {
                let key = self.row_id.row_key(&row);
                self.apply(|t| {
                    t.candidates.insert(key, row);
                })
            }
            Change::Remove(row) => {
                let key = self.row_id.row_key(&row);
                self.apply(|t| {
                    t.candidates.remove(&key);
                })
            }
            Change::Edit { old, new } => {
                let old_key = self.row_id.row_key(&old);
                let new_key = self.row_id.row_key(&new);
                let before = self.window();
                self.candidates.remove(&old_key);
                self.candidates.insert(new_key.clone(), new.clone());
                let after = self.window();

                if before.contains(&old_key) && after.contains(&new_key) && old_key == new_key {
                    vec![Change::Edit { old, new }]
                } else {
                    self.diff_windows(&before, &after)
                }
            }
            Change::Child { parent, relationship, change } => {
                let inner = self.push(*change)?;
                inner.into_iter().map(|c| c.wrap_child(parent.clone(), relationship.clone())).collect()
            }
        })
    }

    fn pull(&mut self) -> Result<Vec<Change>, EngineError> {
        Ok(self
            .window()
            .into_iter()
            .filter_map(|k| self.candidates.get(&k).cloned())
            .map(Change::Add)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dvm::operators::test_helpers::issue;

    fn pk() -> RowIdStrategy {
        RowIdStrategy::PrimaryKey { pk_columns: vec!["id".into()] }
    }

    #[test]
    fn test_take_emits_add_within_window() {
        let mut t = Take::new(2, vec!["id".into()], vec![Direction::Asc], pk());
        let out = t.push(Change::Add(issue("1", "a", false))).unwrap();
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Change::Add(_)));
    }

    #[test]
    fn test_take_evicts_when_window_exceeded() {
        let mut t = Take::new(1, vec!["id".into()], vec![Direction::Asc], pk());
        t.push(Change::Add(issue("2", "b", false))).unwrap();
        // "1" sorts before "2" and should evict it from a window of size 1.
        let out = t.push(Change::Add(issue("1", "a", false))).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().any(|c| matches!(c, Change::Add(r) if r.get("id").unwrap().to_string() == "1")));
        assert!(out.iter().any(|c| matches!(c, Change::Remove(r) if r.get("id").unwrap().to_string() == "2")));
    }

    #[test]
    fn test_take_promotes_next_candidate_on_removal() {
        let mut t = Take::new(1, vec!["id".into()], vec![Direction::Asc], pk());
        t.push(Change::Add(issue("1", "a", false))).unwrap();
        t.push(Change::Add(issue("2", "b", false))).unwrap();
        let out = t.push(Change::Remove(issue("1", "a", false))).unwrap();
        assert!(out.iter().any(|c| matches!(c, Change::Remove(r) if r.get("id").unwrap().to_string() == "1")));
        assert!(out.iter().any(|c| matches!(c, Change::Add(r) if r.get("id").unwrap().to_string() == "2")));
    }

    #[test]
    fn test_take_pull_respects_k() {
        let mut t = Take::new(1, vec!["id".into()], vec![Direction::Asc], pk());
        t.push(Change::Add(issue("1", "a", false))).unwrap();
        t.push(Change::Add(issue("2", "b", false))).unwrap();
        let pulled = t.pull().unwrap();
        assert_eq!(pulled.len(), 1);
    }
}
