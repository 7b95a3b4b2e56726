//! Property-based invariants that must hold for any valid input, not just
//! the literal scenarios (§8): IVM correctness against a brute-force
//! reference, `ResultType` monotonicity, `FanIn` never going negative, and
//! `planQuery` as a semantic no-op.

mod common;

use std::collections::HashSet;

use proptest::prelude::*;

use zero_ivm::ast::Ast;
use zero_ivm::change::Change;
use zero_ivm::change_source::{TableChange, Transaction};
use zero_ivm::dvm::operators::view_sink::ResultType;
use zero_ivm::planner::{plan_query, NoStats};
use zero_ivm::value::Value;
use zero_ivm::version::Version;

/// Arbitrary non-empty id/closed pairs with distinct ids, so an `Add` never
/// conflicts with a row already present.
fn id_closed_pairs(max: usize) -> impl Strategy<Value = Vec<(u32, bool)>> {
    proptest::collection::vec((0u32..max as u32, any::<bool>()), 0..max)
        .prop_map(|pairs| {
            let mut seen = HashSet::new();
            pairs.into_iter().filter(|(id, _)| seen.insert(*id)).collect()
        })
}

proptest! {
    /// The engine's incremental filter result must match re-filtering the
    /// full row set from scratch after every prefix of the change sequence.
    #[test]
    fn prop_incremental_filter_matches_brute_force(rows in id_closed_pairs(12)) {
        let mut engine = common::engine();
        let mut ast = Ast::new("issue");
        ast.filter = Some(common::eq("closed", Value::Bool(true)));
        let (mut node, _baseline) = engine.compile(&ast, &NoStats).unwrap();
        prop_assert!(node.pull().unwrap().is_empty());

        let mut expected_closed: HashSet<u32> = HashSet::new();
        let mut views = [&mut node];
        for (id, closed) in &rows {
            let txn = Transaction {
                version: Version::new(format!("{id}")),
                changes: vec![TableChange {
                    table: "issue".into(),
                    change: Change::Add(common::issue(&format!("{id:05}"), "t", *closed)),
                }],
            };
            let out = engine.apply_transaction(&txn, &mut views).unwrap();
            if *closed {
                expected_closed.insert(*id);
                prop_assert_eq!(out[0].len(), 1);
            } else {
                prop_assert!(out[0].is_empty());
            }
        }
    }

    /// `ResultType` never regresses from `Complete` back to `Unknown` as
    /// more tables report caught-up, regardless of the order they arrive in.
    #[test]
    fn prop_result_type_is_monotone(order in proptest::sample::subsequence(vec![0usize, 1, 2], 0..=3)) {
        let tables = ["issue", "comment", "flag"];
        let mut engine = common::engine();
        let mut ast = Ast::new("issue");
        ast.related = vec![common::related_on_issue_id("comment"), common::related_on_issue_id("flag")];
        let mut view = zero_ivm::materialize::View::materialize(&ast, &mut engine, &NoStats).unwrap();

        let mut last = ResultType::Unknown;
        for idx in order {
            engine.record_got_callback(tables[idx], Version::new("1"));
            view.commit(&engine, false);
            let now = view.result_type();
            if last == ResultType::Complete {
                prop_assert_eq!(now, ResultType::Complete);
            }
            last = now;
        }
    }

    /// `plan_query` must not change the set of rows a query evaluates to:
    /// hydrating the planned AST against the same rows yields the same ids
    /// as hydrating the original.
    #[test]
    fn prop_plan_query_preserves_result_set(rows in id_closed_pairs(10)) {
        let mut engine = common::engine();
        let txn = Transaction {
            version: Version::new("1"),
            changes: rows
                .iter()
                .map(|(id, closed)| TableChange {
                    table: "issue".into(),
                    change: Change::Add(common::issue(&format!("{id:05}"), "t", *closed)),
                })
                .collect(),
        };
        engine.apply_transaction(&txn, &mut []).unwrap();

        let mut ast = Ast::new("issue");
        ast.filter = Some(common::eq("closed", Value::Bool(true)));
        let planned = plan_query(&ast, &engine.schema, &NoStats).unwrap();

        let (mut original_node, _) = engine.compile(&ast, &NoStats).unwrap();
        let (mut planned_node, _) = engine.compile(&planned, &NoStats).unwrap();

        let mut original_ids: Vec<String> = original_node
            .pull()
            .unwrap()
            .iter()
            .map(|c| c.primary_row().get("id").unwrap().to_string())
            .collect();
        let mut planned_ids: Vec<String> = planned_node
            .pull()
            .unwrap()
            .iter()
            .map(|c| c.primary_row().get("id").unwrap().to_string())
            .collect();
        original_ids.sort();
        planned_ids.sort();
        prop_assert_eq!(original_ids, planned_ids);
    }

    /// However many times an `OR`-of-`EXISTS` row is justified by distinct
    /// branches and however those branches are retracted (respecting that a
    /// branch cannot retract a child it never added), applying the sequence
    /// through the engine must never produce an operator-invariant error —
    /// `FanIn`'s reference count is never driven negative (§8 invariant 6).
    #[test]
    fn prop_fan_in_ref_count_never_goes_negative(
        add_comment in any::<bool>(),
        add_flag in any::<bool>(),
        remove_comment_first in any::<bool>(),
    ) {
        let mut engine = common::engine();
        let txn = Transaction {
            version: Version::new("1"),
            changes: vec![TableChange { table: "issue".into(), change: Change::Add(common::issue("1", "a", false)) }],
        };
        engine.apply_transaction(&txn, &mut []).unwrap();

        let mut ast = Ast::new("issue");
        ast.filter = Some(zero_ivm::ast::Expr::Or {
            conditions: vec![
                common::exists_filter("comment", None, false),
                common::exists_filter("flag", None, false),
            ],
        });
        let (mut node, _baseline) = engine.compile(&ast, &NoStats).unwrap();
        node.pull().unwrap();

        let mut applied: Vec<TableChange> = Vec::new();
        if add_comment {
            applied.push(TableChange { table: "comment".into(), change: Change::Add(common::comment("c1", "1", "hi")) });
        }
        if add_flag {
            applied.push(TableChange { table: "flag".into(), change: Change::Add(common::flag("f1", "1", "starred")) });
        }
        let mut removals: Vec<TableChange> = Vec::new();
        if add_comment {
            removals.push(TableChange { table: "comment".into(), change: Change::Remove(common::comment("c1", "1", "hi")) });
        }
        if add_flag {
            removals.push(TableChange { table: "flag".into(), change: Change::Remove(common::flag("f1", "1", "starred")) });
        }
        if remove_comment_first {
            removals.reverse();
        }
        applied.extend(removals);

        let mut views = [&mut node];
        for change in applied {
            let txn = Transaction { version: Version::new("2"), changes: vec![change] };
            prop_assert!(engine.apply_transaction(&txn, &mut views).is_ok());
        }
    }
}
