//! Exists: filter a parent stream by correlated subquery non-emptiness (§4.2).
//!
//! Semantically a semi-join: each parent row is admitted iff the number of
//! child rows sharing its correlation key is non-zero (or zero, if
//! `negated`). `flip` is a planner concern only — it chooses which side
//! drives the join, not what this operator computes — so it has no
//! observable effect here; both driving strategies produce the same
//! `Exists` state machine.

use std::collections::HashMap;

use crate::change::Change;
use crate::error::EngineError;
use crate::value::{Row, RowKey};

pub struct Exists {
    parent_field: Vec<String>,
    child_field: Vec<String>,
    parent_pk: Vec<String>,
    negated: bool,
    child_counts: HashMap<RowKey, i64>,
    parent_rows: HashMap<RowKey, HashMap<RowKey, Row>>,
    admitted: std::collections::HashSet<RowKey>,
}

impl Exists {
    pub fn new(parent_field: Vec<String>, child_field: Vec<String>, parent_pk: Vec<String>, negated: bool) -> Self {
        Self {
            parent_field,
            child_field,
            parent_pk,
            negated,
            child_counts: HashMap::new(),
            parent_rows: HashMap::new(),
            admitted: std::collections::HashSet::new(),
        }
    }

    fn corr_key_of_parent(&self, row: &Row) -> RowKey {
        row.key(&self.parent_field)
    }

    fn corr_key_of_child(&self, row: &Row) -> RowKey {
        row.key(&self.child_field)
    }

    fn should_admit(&self, corr_key: &RowKey) -> bool {
        let exists = self.child_counts.get(corr_key).copied().unwrap_or(0) > 0;
        exists != self.negated
    }

    pub fn push_parent(&mut self, change: Change) -> Result<Vec<Change>, EngineError> {
        match change {
            Change::Add(row) => {
                let corr = self.corr_key_of_parent(&row);
                let pk = row.key(&self.parent_pk);
                self.parent_rows.entry(corr.clone()).or_default().insert(pk.clone(), row.clone());
                if self.should_admit(&corr) {
                    self.admitted.insert(pk);
                    Ok(vec![Change::Add(row)])
                } else {
                    Ok(vec![])
                }
            }
            Change::Remove(row) => {
                let corr = self.corr_key_of_parent(&row);
                let pk = row.key(&self.parent_pk);
                if let Some(by_pk) = self.parent_rows.get_mut(&corr) {
                    by_pk.remove(&pk);
                }
                if self.admitted.remove(&pk) {
                    Ok(vec![Change::Remove(row)])
                } else {
                    Ok(vec![])
                }
            }
            Change::Edit { old, new } => {
                let old_corr = self.corr_key_of_parent(&old);
                let new_corr = self.corr_key_of_parent(&new);
                let pk = new.key(&self.parent_pk);
                if old_corr != new_corr {
                    if let Some(by_pk) = self.parent_rows.get_mut(&old_corr) {
                        by_pk.remove(&pk);
                    }
                }
                self.parent_rows.entry(new_corr.clone()).or_default().insert(pk.clone(), new.clone());
                let was_admitted = self.admitted.contains(&pk);
                let now_admitted = self.should_admit(&new_corr);
                match (was_admitted, now_admitted) {
                    (true, true) => Ok(vec![Change::Edit { old, new }]),
                    (true, false) => {
                        self.admitted.remove(&pk);
                        Ok(vec![Change::Remove(old)])
                    }
                    (false, true) => {
                        self.admitted.insert(pk);
                        Ok(vec![Change::Add(new)])
                    }
                    (false, false) => Ok(vec![]),
                }
            }
            Change::Child { .. } => Err(EngineError::OperatorInvariant(
                "Exists received a Child change on its parent edge".into(),
            )),
        }
    }

    pub fn push_child(&mut self, change: Change) -> Result<Vec<Change>, EngineError> {
        let (corr, delta) = match &change {
            Change::Add(row) => (self.corr_key_of_child(row), 1),
            Change::Remove(row) => (self.corr_key_of_child(row), -1),
            Change::Edit { old, new } => {
                let old_corr = self.corr_key_of_child(old);
                let new_corr = self.corr_key_of_child(new);
                if old_corr == new_corr {
                    return Ok(vec![]);
                }
                let out_old = self.adjust_count(&old_corr, -1)?;
                let out_new = self.adjust_count(&new_corr, 1)?;
                return Ok([out_old, out_new].concat());
            }
            Change::Child { .. } => {
                return Err(EngineError::OperatorInvariant(
                    "Exists received a doubly-nested Child change on its child edge".into(),
                ))
            }
        };
        self.adjust_count(&corr, delta)
    }

    fn adjust_count(&mut self, corr: &RowKey, delta: i64) -> Result<Vec<Change>, EngineError> {
        let before = self.child_counts.get(corr).copied().unwrap_or(0);
        let after = before + delta;
        if after < 0 {
            return Err(EngineError::OperatorInvariant(format!(
                "Exists: child reference count went negative for {corr}"
            )));
        }
        if after == 0 {
            self.child_counts.remove(corr);
        } else {
            self.child_counts.insert(corr.clone(), after);
        }

        let admits_before = (before > 0) != self.negated;
        let admits_after = (after > 0) != self.negated;
        if admits_before == admits_after {
            return Ok(vec![]);
        }

        let mut out = Vec::new();
        if let Some(by_pk) = self.parent_rows.get(corr) {
            for (pk, row) in by_pk {
                if admits_after {
                    self.admitted.insert(pk.clone());
                    out.push(Change::Add(row.clone()));
                } else {
                    self.admitted.remove(pk);
                    out.push(Change::Remove(row.clone()));
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dvm::operators::test_helpers::{comment, issue};

    fn new_exists() -> Exists {
        Exists::new(vec!["id".into()], vec!["issueId".into()], vec!["id".into()], false)
    }

    #[test]
    fn test_parent_not_admitted_before_matching_child() {
        let mut e = new_exists();
        let out = e.push_parent(Change::Add(issue("1", "a", false))).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_child_arrival_admits_existing_parent() {
        let mut e = new_exists();
        e.push_parent(Change::Add(issue("1", "a", false))).unwrap();
        let out = e.push_child(Change::Add(comment("c1", "1", "bug"))).unwrap();
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Change::Add(_)));
    }

    #[test]
    fn test_child_removal_retracts_parent() {
        let mut e = new_exists();
        e.push_parent(Change::Add(issue("1", "a", false))).unwrap();
        e.push_child(Change::Add(comment("c1", "1", "bug"))).unwrap();
        let out = e.push_child(Change::Remove(comment("c1", "1", "bug"))).unwrap();
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Change::Remove(_)));
    }

    #[test]
    fn test_negated_exists_admits_when_no_children() {
        let mut e = Exists::new(vec!["id".into()], vec!["issueId".into()], vec!["id".into()], true);
        let out = e.push_parent(Change::Add(issue("1", "a", false))).unwrap();
        assert_eq!(out.len(), 1);
        let out2 = e.push_child(Change::Add(comment("c1", "1", "bug"))).unwrap();
        assert_eq!(out2.len(), 1);
        assert!(matches!(out2[0], Change::Remove(_)));
    }

    #[test]
    fn test_negative_child_count_is_operator_invariant() {
        let mut e = new_exists();
        let err = e.push_child(Change::Remove(comment("c1", "1", "bug"))).unwrap_err();
        assert!(matches!(err, EngineError::OperatorInvariant(_)));
    }
}
