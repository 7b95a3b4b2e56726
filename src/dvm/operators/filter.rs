//! Filter/WHERE differentiation.
//!
//! ΔI(σP(Q)) = σP(ΔI(Q))
//!
//! Apply predicate `P` to the upstream's change stream. A row that doesn't
//! satisfy `P` is dropped from both `add`s and `remove`s; an `edit` is
//! re-evaluated on both sides and translated into whichever of
//! `add`/`remove`/`edit` keeps the downstream state consistent (§4.2, §9
//! Open Question on edit-across-filter-boundary semantics — resolved in
//! DESIGN.md as: old passed & new fails -> remove(old); both pass -> edit;
//! neither passes -> drop).

use crate::ast::Expr;
use crate::change::Change;
use crate::dvm::Operator;
use crate::error::EngineError;
use crate::eval::eval;

pub struct Filter {
    predicate: Expr,
}

impl Filter {
    pub fn new(predicate: Expr) -> Self {
        Self { predicate }
    }
}

impl Operator for Filter {
    fn push(&mut self, change: Change) -> Result<Vec<Change>, EngineError> {
        match change {
            Change::Add(row) => {
                if eval(&self.predicate, &row)? {
                    Ok(vec![Change::Add(row)])
                } else {
                    Ok(vec![])
                }
            }
            Change::Remove(row) => {
                if eval(&self.predicate, &row)? {
                    Ok(vec![Change::Remove(row)])
                } else {
                    Ok(vec![])
                }
            }
            Change::Edit { old, new } => {
                let old_passes = eval(&self.predicate, &old)?;
                let new_passes = eval(&self.predicate, &new)?;
                Ok(match (old_passes, new_passes) {
                    (true, true) => vec![Change::Edit { old, new }],
                    (true, false) => vec![Change::Remove(old)],
                    (false, true) => vec![Change::Add(new)],
                    (false, false) => vec![],
                })
            }
            Change::Child { parent, relationship, change } => {
                // The filter sits below the relationship boundary; re-run
                // the same translation on the inner change and re-wrap.
                let inner = Filter::new(self.predicate.clone()).push(*change)?;
                Ok(inner
                    .into_iter()
                    .map(|c| c.wrap_child(parent.clone(), relationship.clone()))
                    .collect())
            }
        }
    }
}
