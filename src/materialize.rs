//! Materialization & view (C4, §4.3).
//!
//! Owns one operator graph's lifetime, folds its change stream into a
//! `ViewSink` snapshot, and notifies listeners per the contract: once
//! synchronously on registration, after each committed transaction that
//! changed the snapshot, and once more on the `unknown -> complete`
//! transition.

use std::collections::HashMap;

use crate::ast::Ast;
use crate::change::Change;
use crate::dvm::graph::Node;
use crate::dvm::operators::view_sink::{ResultType, ViewSink};
use crate::engine::Engine;
use crate::error::EngineError;
use crate::planner::StatsOracle;
use crate::value::Row;
use crate::version::Frontier;

/// Listener callback: `(snapshot, resultType)`.
pub type Listener = Box<dyn FnMut(&[(Row, HashMap<String, Vec<Row>>)], ResultType)>;

/// A materialized query: its compiled operator graph, folded snapshot, and
/// registered listeners.
pub struct View {
    graph: Node,
    sink: ViewSink,
    baseline: Frontier,
    listeners: Vec<Listener>,
}

impl View {
    /// `materialize(ast) -> View` (§4.3): builds the graph, hydrates
    /// synchronously, and returns with `ResultType::Unknown`.
    pub fn materialize(ast: &Ast, engine: &mut Engine, stats: &dyn StatsOracle) -> Result<Self, EngineError> {
        let order = ast.with_total_order(&engine.schema)?;
        let pk = engine.schema.table(&ast.table)?.primary_key.clone();
        let columns: Vec<String> = order.iter().map(|(c, _)| c.clone()).collect();
        let dirs = order.iter().map(|(_, d)| *d).collect();

        let (mut graph, baseline) = engine.compile(ast, stats)?;
        let mut sink = ViewSink::new(columns, dirs, pk);
        for change in graph.pull()? {
            sink.apply(change)?;
        }
        Ok(Self { graph, sink, baseline, listeners: Vec::new() })
    }

    /// Registers a listener, firing it once synchronously with the current
    /// snapshot (§4.3 "Listener contract").
    pub fn subscribe(&mut self, mut listener: Listener) {
        listener(&self.sink.snapshot(), self.sink.result_type());
        self.listeners.push(listener);
    }

    /// Feeds one leaf-level change arriving from the engine's advance loop
    /// through this view's graph, folding the result into the snapshot.
    /// Callers must call `commit()` once per transaction, not per change,
    /// so listeners see at most one batched update (§4.2, §5).
    pub fn push_at(&mut self, table: &str, subscriber: u64, change: Change) -> Result<(), EngineError> {
        for produced in self.graph.push_at(table, subscriber, change)? {
            self.sink.apply(produced)?;
        }
        Ok(())
    }

    /// Marks a transactional boundary: notifies listeners if the snapshot
    /// changed since the last commit. Also checks whether the engine's
    /// caught-up frontier now satisfies this view's baseline, firing the
    /// `unknown -> complete` transition at most once (§3, §4.3, §8
    /// invariant 3).
    pub fn commit(&mut self, engine: &Engine, snapshot_changed: bool) {
        let was_complete = self.sink.result_type() == ResultType::Complete;
        if !was_complete && engine.baseline_satisfied(&self.baseline) {
            self.sink.mark_complete();
        }
        let became_complete = !was_complete && self.sink.result_type() == ResultType::Complete;

        if snapshot_changed || became_complete {
            let snapshot = self.sink.snapshot();
            for listener in self.listeners.iter_mut() {
                listener(&snapshot, self.sink.result_type());
            }
        }
    }

    pub fn result_type(&self) -> ResultType {
        self.sink.result_type()
    }

    pub fn snapshot(&self) -> Vec<(Row, HashMap<String, Vec<Row>>)> {
        self.sink.snapshot()
    }

    pub fn leaves(&self) -> Vec<(String, u64)> {
        self.graph.leaves()
    }

    /// `destroy()` (§4.3): tears down the subgraph and drops source
    /// subscriptions. Dropping `View` is itself sufficient since this
    /// engine holds no reference-counted handles back into the view; an
    /// embedder that also tracks subscriptions in `Engine::sources` should
    /// call `Source::disconnect` for each of `leaves()` before dropping.
    pub fn destroy(self) -> Vec<(String, u64)> {
        self.graph.leaves()
    }
}

/// A preloaded graph kept alive without an active view subscription, so a
/// later `materialize` of the same canonicalized AST can reuse it instead of
/// rehydrating (§4.3 `preload`).
pub struct Preloaded {
    pub view: View,
    pub ttl_ms: u64,
}

pub fn preload(ast: &Ast, engine: &mut Engine, stats: &dyn StatsOracle, ttl_ms: u64) -> Result<Preloaded, EngineError> {
    let view = View::materialize(ast, engine, stats)?;
    Ok(Preloaded { view, ttl_ms })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunUntil {
    Unknown,
    Complete,
}

/// `run(ast, {type, ttl}) -> rows` (§4.3): materializes transiently and
/// resolves either as soon as synchronous hydration finishes (`Unknown`) or
/// once `ResultType` reaches `Complete`. Resolving `Complete` requires the
/// caller to have already driven the engine's change source to the point
/// where `baseline_satisfied` holds; this function does not itself block,
/// since the engine's cooperative scheduler owns that loop (§5).
pub fn run(
    ast: &Ast,
    engine: &mut Engine,
    stats: &dyn StatsOracle,
    until: RunUntil,
) -> Result<Option<Vec<(Row, HashMap<String, Vec<Row>>)>>, EngineError> {
    let view = View::materialize(ast, engine, stats)?;
    match until {
        RunUntil::Unknown => Ok(Some(view.snapshot())),
        RunUntil::Complete => {
            if view.result_type() == ResultType::Complete {
                Ok(Some(view.snapshot()))
            } else {
                Ok(None)
            }
        }
    }
}
