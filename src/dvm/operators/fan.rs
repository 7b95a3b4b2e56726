//! FanOut/FanIn: share a subtree across branches of a disjunction (§4.2).
//!
//! `FanOut` duplicates a change stream so multiple branches (e.g. the two
//! sides of an `OR` of `EXISTS` subqueries) can each run their own subtree
//! against the same upstream changes. `FanIn` merges the branches back,
//! applying distinct-by-key with a reference count per key so a row visible
//! through more than one branch is reported exactly once (§8 S3, invariant 6).

use std::collections::HashMap;

use crate::change::Change;
use crate::dvm::Operator;
use crate::error::EngineError;
use crate::value::{Row, RowKey};

/// Duplicates every change it receives once per branch.
pub struct FanOut {
    branch_count: usize,
}

impl FanOut {
    pub fn new(branch_count: usize) -> Self {
        Self { branch_count }
    }
}

impl Operator for FanOut {
    fn push(&mut self, change: Change) -> Result<Vec<Change>, EngineError> {
        Ok(std::iter::repeat(change).take(self.branch_count).collect())
    }
}

/// Merges multiple fan-out branches, deduplicating by row key with a
/// reference count.
pub struct FanIn {
    row_id: crate::dvm::row_id::RowIdStrategy,
    ref_counts: HashMap<RowKey, (i64, Row)>,
}

impl FanIn {
    pub fn new(row_id: crate::dvm::row_id::RowIdStrategy) -> Self {
        Self { row_id, ref_counts: HashMap::new() }
    }

    /// Accept a change from a specific branch. Branch identity only matters
    /// to the caller's wiring (which branch produced this push); FanIn
    /// itself only needs the row key to maintain its reference counts.
    pub fn push_from_branch(&mut self, change: Change) -> Result<Vec<Change>, EngineError> {
        match change {
            Change::Add(row) => {
                let key = self.row_id.row_key(&row);
                let entry = self.ref_counts.entry(key).or_insert((0, row.clone()));
                entry.0 += 1;
                entry.1 = row.clone();
                if entry.0 == 1 {
                    Ok(vec![Change::Add(row)])
                } else {
                    Ok(vec![])
                }
            }
            Change::Remove(row) => {
                let key = self.row_id.row_key(&row);
                let Some(entry) = self.ref_counts.get_mut(&key) else {
                    return Err(EngineError::OperatorInvariant(format!(
                        "FanIn: remove of untracked key {key}"
                    )));
                };
                entry.0 -= 1;
                if entry.0 < 0 {
                    return Err(EngineError::OperatorInvariant(format!(
                        "FanIn: reference count went negative for key {key}"
                    )));
                }
                if entry.0 == 0 {
                    self.ref_counts.remove(&key);
                    Ok(vec![Change::Remove(row)])
                } else {
                    Ok(vec![])
                }
            }
            Change::Edit { old, new } => {
                let old_key = self.row_id.row_key(&old);
                let new_key = self.row_id.row_key(&new);
                if old_key != new_key {
                    return Err(EngineError::OperatorInvariant(
                        "FanIn: edit must preserve row identity".into(),
                    ));
                }
                match self.ref_counts.get_mut(&old_key) {
                    Some(entry) => {
                        entry.1 = new.clone();
                        if entry.0 <= 1 {
                            Ok(vec![Change::Edit { old, new }])
                        } else {
                            // Already visible via another branch with the
                            // same content; a single branch's edit does not
                            // change what is reported.
                            Ok(vec![])
                        }
                    }
                    None => Err(EngineError::OperatorInvariant(format!(
                        "FanIn: edit of untracked key {old_key}"
                    ))),
                }
            }
            Change::Child { .. } => Err(EngineError::OperatorInvariant(
                "FanIn does not merge child changes directly".into(),
            )),
        }
    }

    pub fn ref_count(&self, key: &RowKey) -> i64 {
        self.ref_counts.get(key).map(|(c, _)| *c).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dvm::operators::test_helpers::issue;
    use crate::dvm::row_id::RowIdStrategy;

    fn pk() -> RowIdStrategy {
        RowIdStrategy::PrimaryKey { pk_columns: vec!["id".into()] }
    }

    #[test]
    fn test_fan_out_duplicates_per_branch() {
        let mut fo = FanOut::new(2);
        let out = fo.push(Change::Add(issue("1", "a", false))).unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_fan_in_dedups_add_seen_via_two_branches() {
        let mut fi = FanIn::new(pk());
        let first = fi.push_from_branch(Change::Add(issue("1", "a", false))).unwrap();
        let second = fi.push_from_branch(Change::Add(issue("1", "a", false))).unwrap();
        assert_eq!(first.len(), 1);
        assert!(second.is_empty(), "second branch's add of the same key must not re-emit");
    }

    #[test]
    fn test_fan_in_remove_from_one_branch_does_not_retract() {
        let mut fi = FanIn::new(pk());
        fi.push_from_branch(Change::Add(issue("1", "a", false))).unwrap();
        fi.push_from_branch(Change::Add(issue("1", "a", false))).unwrap();
        let out = fi.push_from_branch(Change::Remove(issue("1", "a", false))).unwrap();
        assert!(out.is_empty(), "row still justified by the other branch");
    }

    #[test]
    fn test_fan_in_remove_from_all_branches_retracts() {
        let mut fi = FanIn::new(pk());
        fi.push_from_branch(Change::Add(issue("1", "a", false))).unwrap();
        fi.push_from_branch(Change::Add(issue("1", "a", false))).unwrap();
        fi.push_from_branch(Change::Remove(issue("1", "a", false))).unwrap();
        let out = fi.push_from_branch(Change::Remove(issue("1", "a", false))).unwrap();
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Change::Remove(_)));
    }

    #[test]
    fn test_fan_in_remove_untracked_key_is_operator_invariant() {
        let mut fi = FanIn::new(pk());
        let err = fi.push_from_branch(Change::Remove(issue("1", "a", false))).unwrap_err();
        assert!(matches!(err, EngineError::OperatorInvariant(_)));
    }
}
