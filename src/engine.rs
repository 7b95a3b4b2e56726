//! Engine: the explicit, instantiable owner of schema, sources, and the
//! query registry (§9 "Global state" — avoid true singletons).
//!
//! This is the `SourceHost` the graph compiler needs, and the place an
//! embedder applies upstream transactions and advances materialized views.

use std::collections::HashMap;

use crate::ast::{Ast, Direction};
use crate::change::Change;
use crate::change_source::{ChangeSource, TableChange, Transaction};
use crate::config::EngineConfig;
use crate::dvm::graph::{self, Node, SourceHost};
use crate::error::EngineError;
use crate::planner::{self, StatsOracle};
use crate::registry::Registry;
use crate::schema::Schema;
use crate::source::{FilterHint, Source, SubscriberId};
use crate::value::Row;
use crate::version::{Frontier, Version};

/// One engine instance: schema, per-table sources, and the query registry,
/// instantiated explicitly rather than reached through global state.
pub struct Engine {
    pub schema: Schema,
    pub config: EngineConfig,
    pub registry: Registry,
    sources: HashMap<String, Source>,
    caught_up: Frontier,
}

impl Engine {
    pub fn new(schema: Schema, config: EngineConfig) -> Self {
        Self { schema, config, registry: Registry::new(), sources: HashMap::new(), caught_up: Frontier::new() }
    }

    /// Creates a source for `table`, seeded empty. Sources are created at
    /// engine start and destroyed at shutdown (§3 "Lifecycle").
    pub fn add_source(&mut self, table: &str) -> Result<(), EngineError> {
        let pk = self.schema.table(table)?.primary_key.clone();
        self.sources.insert(table.to_string(), Source::new(table, pk));
        Ok(())
    }

    pub fn source(&self, table: &str) -> Option<&Source> {
        self.sources.get(table)
    }

    /// Plans and compiles `ast` into an operator graph, capturing the
    /// frontier at hydration time as the view's baseline.
    pub fn compile(&mut self, ast: &Ast, stats: &dyn StatsOracle) -> Result<(Node, Frontier), EngineError> {
        ast.validate(&self.schema)?;
        let planned = planner::plan_query(ast, &self.schema, stats)?;
        let mut baseline = Frontier::new();
        record_frontier(&planned, &mut baseline);
        let mut node = graph::compile(&planned, &self.schema, self)?;
        let hydrated = node.pull()?;
        tracing::debug!(table = %planned.table, rows = hydrated.len(), "hydrated view");
        Ok((node, baseline))
    }

    /// Applies one committed upstream transaction to C2, then advances
    /// every node that subscribes to an affected table (§4.2 "Advance").
    /// Returns, per node leaf touched, the root-level changes produced —
    /// callers route these into their views' `ViewSink`s and call
    /// `commit()` once per transaction (§5).
    pub fn apply_transaction(
        &mut self,
        transaction: &Transaction,
        views: &mut [&mut Node],
    ) -> Result<Vec<Vec<Change>>, EngineError> {
        let mut leaf_changes: Vec<(String, SubscriberId, Change)> = Vec::new();
        for TableChange { table, change } in &transaction.changes {
            let source = self
                .sources
                .get_mut(table)
                .ok_or_else(|| EngineError::UnknownTable(table.clone()))?;
            source.push(change.clone())?;
            for view in views.iter() {
                for (leaf_table, leaf_subscriber) in view.leaves() {
                    if &leaf_table == table {
                        if let Some(queued) = source.drain_one(leaf_subscriber) {
                            leaf_changes.push((leaf_table, leaf_subscriber, queued));
                        }
                    }
                }
            }
        }

        let mut out = Vec::with_capacity(views.len());
        for view in views.iter_mut() {
            let mut produced = Vec::new();
            for (table, subscriber, change) in &leaf_changes {
                produced.extend(view.push_at(table, *subscriber, change.clone())?);
            }
            out.push(produced);
        }
        Ok(out)
    }

    /// Records that `table` has caught up to `version`, as reported by a
    /// change source's `gotCallback` (§4.3, §4.7).
    pub fn record_got_callback(&mut self, table: &str, version: Version) {
        self.caught_up.set(table, version);
    }

    /// Whether every table in `baseline` has been caught up to at least its
    /// recorded version — the `ResultType::Complete` transition test.
    pub fn baseline_satisfied(&self, baseline: &Frontier) -> bool {
        baseline.satisfied_by(&self.caught_up)
    }

    /// Drains a change source until exhausted, applying each transaction
    /// and recording `got_callback` state (drives §4.7's ack/reset
    /// protocol). Returns once `poll` reports nothing pending.
    pub fn drain_change_source(
        &mut self,
        source: &mut dyn ChangeSource,
        views: &mut [&mut Node],
    ) -> Result<Vec<Vec<Change>>, EngineError> {
        let mut all = Vec::new();
        while let Some(transaction) = source.poll()? {
            let produced = self.apply_transaction(&transaction, views)?;
            source.ack(&transaction.version);
            for TableChange { table, .. } in &transaction.changes {
                if source.got_callback(&transaction.version) {
                    self.record_got_callback(table, transaction.version.clone());
                }
            }
            all.extend(produced);
        }
        Ok(all)
    }
}

fn record_frontier(ast: &Ast, frontier: &mut Frontier) {
    frontier.set(ast.table.clone(), Version::zero());
    for related in &ast.related {
        record_frontier(&related.subquery, frontier);
    }
    if let Some(filter) = &ast.filter {
        record_frontier_expr(filter, frontier);
    }
}

fn record_frontier_expr(expr: &crate::ast::Expr, frontier: &mut Frontier) {
    use crate::ast::Expr;
    match expr {
        Expr::CorrelatedSubquery { related, .. } => record_frontier(&related.subquery, frontier),
        Expr::And { conditions } | Expr::Or { conditions } => {
            for c in conditions {
                record_frontier_expr(c, frontier);
            }
        }
        Expr::Not { condition } => record_frontier_expr(condition, frontier),
        Expr::Simple { .. } => {}
    }
}

impl SourceHost for Engine {
    fn connect(
        &mut self,
        table: &str,
        ordering: Vec<(String, Direction)>,
        hint: Option<FilterHint>,
    ) -> Result<(SubscriberId, Vec<Row>), EngineError> {
        let source = self.sources.get_mut(table).ok_or_else(|| EngineError::UnknownTable(table.to_string()))?;
        Ok(source.connect(ordering, hint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dvm::operators::test_helpers::{eq_filter, issue};
    use crate::planner::NoStats;
    use crate::schema::{Column, ColumnType, Table};
    use crate::value::Value;

    fn engine() -> Engine {
        let mut schema = Schema::new();
        schema.add_table(Table {
            name: "issue".into(),
            columns: vec![
                Column { name: "id".into(), ty: ColumnType::String },
                Column { name: "title".into(), ty: ColumnType::String },
                Column { name: "closed".into(), ty: ColumnType::Bool },
            ],
            primary_key: vec!["id".into()],
            relationships: vec![],
        });
        let mut engine = Engine::new(schema, EngineConfig::default());
        engine.add_source("issue").unwrap();
        engine
    }

    #[test]
    fn test_compile_hydrates_from_empty_source() {
        let mut engine = engine();
        let ast = Ast::new("issue");
        let (mut node, _baseline) = engine.compile(&ast, &NoStats).unwrap();
        assert!(node.pull().unwrap().is_empty());
    }

    #[test]
    fn test_apply_transaction_routes_into_compiled_view() {
        let mut engine = engine();
        let mut ast = Ast::new("issue");
        ast.filter = Some(eq_filter("closed", Value::Bool(true)));
        let (mut node, _baseline) = engine.compile(&ast, &NoStats).unwrap();

        let txn = Transaction {
            version: Version::new("1"),
            changes: vec![TableChange { table: "issue".into(), change: Change::Add(issue("1", "a", true)) }],
        };
        let mut views = [&mut node];
        let out = engine.apply_transaction(&txn, &mut views).unwrap();
        assert_eq!(out[0].len(), 1);
    }

    #[test]
    fn test_baseline_satisfied_after_got_callback() {
        let mut engine = engine();
        let ast = Ast::new("issue");
        let (_node, baseline) = engine.compile(&ast, &NoStats).unwrap();
        assert!(!engine.baseline_satisfied(&baseline));
        engine.record_got_callback("issue", Version::new("1"));
        assert!(engine.baseline_satisfied(&baseline));
    }
}
