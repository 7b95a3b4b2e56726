//! Join: attach a correlated nested child sequence to each parent row (§4.2).
//!
//! A child-side change produces a `Child` change tagged with the owning
//! parent's key, routed to every parent currently correlated with it. A
//! parent-side `add` must also prime the nested sequence from whatever
//! matching children the join already knows about, since a client observing
//! the new parent row expects its `related` array populated immediately,
//! not only after the next child-side change.

use std::collections::HashMap;

use crate::change::Change;
use crate::error::EngineError;
use crate::value::{Row, RowKey};

pub struct Join {
    parent_field: Vec<String>,
    child_field: Vec<String>,
    parent_pk: Vec<String>,
    child_pk: Vec<String>,
    relationship: String,
    children_by_corr: HashMap<RowKey, HashMap<RowKey, Row>>,
    parents_by_corr: HashMap<RowKey, HashMap<RowKey, Row>>,
}

impl Join {
    pub fn new(
        parent_field: Vec<String>,
        child_field: Vec<String>,
        parent_pk: Vec<String>,
        child_pk: Vec<String>,
        relationship: impl Into<String>,
    ) -> Self {
        Self {
            parent_field,
            child_field,
            parent_pk,
            child_pk,
            relationship: relationship.into(),
            children_by_corr: HashMap::new(),
            parents_by_corr: HashMap::new(),
        }
    }

    fn corr_of_parent(&self, row: &Row) -> RowKey {
        row.key(&self.parent_field)
    }

    fn corr_of_child(&self, row: &Row) -> RowKey {
        row.key(&self.child_field)
    }

    pub fn push_parent(&mut self, change: Change) -> Result<Vec<Change>, EngineError> {
        match change {
            Change::Add(row) => {
                let corr = self.corr_of_parent(&row);
                let pk = row.key(&self.parent_pk);
                self.parents_by_corr.entry(corr.clone()).or_default().insert(pk, row.clone());

                let mut out = vec![Change::Add(row.clone())];
                if let Some(children) = self.children_by_corr.get(&corr) {
                    for child in children.values() {
                        out.push(
                            Change::Add(child.clone()).wrap_child(row.clone(), self.relationship.clone()),
                        );
                    }
                }
                Ok(out)
            }
            Change::Remove(row) => {
                let corr = self.corr_of_parent(&row);
                let pk = row.key(&self.parent_pk);
                if let Some(by_pk) = self.parents_by_corr.get_mut(&corr) {
                    by_pk.remove(&pk);
                }
                Ok(vec![Change::Remove(row)])
            }
            Change::Edit { old, new } => {
                let old_corr = self.corr_of_parent(&old);
                let new_corr = self.corr_of_parent(&new);
                let pk = new.key(&self.parent_pk);
                if old_corr == new_corr {
                    self.parents_by_corr.entry(new_corr).or_default().insert(pk, new.clone());
                    // Same child sequence identity: no Child changes needed.
                    Ok(vec![Change::Edit { old, new }])
                } else {
                    if let Some(by_pk) = self.parents_by_corr.get_mut(&old_corr) {
                        by_pk.remove(&pk);
                    }
                    let mut out = vec![Change::Remove(old)];
                    out.extend(self.push_parent(Change::Add(new))?);
                    Ok(out)
                }
            }
            Change::Child { .. } => Err(EngineError::OperatorInvariant(
                "Join received a Child change on its parent edge".into(),
            )),
        }
    }

    pub fn push_child(&mut self, change: Change) -> Result<Vec<Change>, EngineError> {
        match change {
            Change::Add(row) => {
                let corr = self.corr_of_child(&row);
                let pk = row.key(&self.child_pk);
                self.children_by_corr.entry(corr.clone()).or_default().insert(pk, row.clone());
                Ok(self.route(&corr, Change::Add(row)))
            }
            Change::Remove(row) => {
                let corr = self.corr_of_child(&row);
                let pk = row.key(&self.child_pk);
                if let Some(by_pk) = self.children_by_corr.get_mut(&corr) {
                    by_pk.remove(&pk);
                }
                Ok(self.route(&corr, Change::Remove(row)))
            }
            Change::Edit { old, new } => {
                let old_corr = self.corr_of_child(&old);
                let new_corr = self.corr_of_child(&new);
                let pk = new.key(&self.child_pk);
                if old_corr == new_corr {
                    self.children_by_corr.entry(new_corr.clone()).or_default().insert(pk, new.clone());
                    Ok(self.route(&new_corr, Change::Edit { old, new }))
                } else {
                    if let Some(by_pk) = self.children_by_corr.get_mut(&old_corr) {
                        by_pk.remove(&pk);
                    }
                    self.children_by_corr.entry(new_corr.clone()).or_default().insert(pk, new.clone());
                    let mut out = self.route(&old_corr, Change::Remove(old));
                    out.extend(self.route(&new_corr, Change::Add(new)));
                    Ok(out)
                }
            }
            Change::Child { .. } => Err(EngineError::OperatorInvariant(
                "Join received a doubly-nested Child change on its child edge".into(),
            )),
        }
    }

    /// Wraps `change` as a `Child` addressed to every parent currently
    /// correlated with `corr`.
    fn route(&self, corr: &RowKey, change: Change) -> Vec<Change> {
        let Some(parents) = self.parents_by_corr.get(corr) else {
            return vec![];
        };
        parents
            .values()
            .map(|parent| change.clone().wrap_child(parent.clone(), self.relationship.clone()))
            .collect()
    }
}
