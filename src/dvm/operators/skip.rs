//! Skip: drop rows preceding a pagination anchor (§4.2).

use crate::ast::Direction;
use crate::change::Change;
use crate::dvm::Operator;
use crate::error::EngineError;
use crate::ordering::admits_start;
use crate::value::{Row, Value};

pub struct Skip {
    start: Vec<Value>,
    inclusive: bool,
    dirs: Vec<Direction>,
    columns: Vec<String>,
}

impl Skip {
    pub fn new(columns: Vec<String>, dirs: Vec<Direction>, start: Vec<Value>, inclusive: bool) -> Self {
        Self { start, inclusive, dirs, columns }
    }

    fn admits(&self, row: &Row) -> bool {
        let key = row.sort_key(&self.columns);
        admits_start(&key, &self.start, &self.dirs, self.inclusive)
    }
}

impl Operator for Skip {
    fn push(&mut self, change: Change) -> Result<Vec<Change>, EngineError> {
        Ok(match change {
            Change::Add(row) => {
                if self.admits(&row) {
                    vec![Change::Add(row)]
                } else {
                    vec![]
                }
            }
            Change::Remove(row) => {
                if self.admits(&row) {
                    vec![Change::Remove(row)]
                } else {
                    vec![]
                }
            }
            Change::Edit { old, new } => match (self.admits(&old), self.admits(&new)) {
                (true, true) => vec![Change::Edit { old, new }],
                (true, false) => vec![Change::Remove(old)],
                (false, true) => vec![Change::Add(new)],
                (false, false) => vec![],
            },
            Change::Child { parent, relationship, change } => {
                let inner = self.push(*change)?;
                inner.into_iter().map(|c| c.wrap_child(parent.clone(), relationship.clone())).collect()
            }
        })
    }
}
