//! S1: a plain single-table filter hydrates synchronously and tracks
//! subsequent adds/removes one change at a time.

mod common;

use zero_ivm::ast::Ast;
use zero_ivm::change::Change;
use zero_ivm::change_source::TableChange;
use zero_ivm::materialize::View;
use zero_ivm::planner::NoStats;
use zero_ivm::value::Value;
use zero_ivm::version::Version;

#[test]
fn test_filter_hydrates_only_matching_rows() {
    let mut engine = common::engine();
    let txn = zero_ivm::change_source::Transaction {
        version: Version::new("1"),
        changes: vec![
            TableChange { table: "issue".into(), change: Change::Add(common::issue("1", "open one", false)) },
            TableChange { table: "issue".into(), change: Change::Add(common::issue("2", "closed one", true)) },
        ],
    };
    engine.apply_transaction(&txn, &mut []).unwrap();

    let mut ast = Ast::new("issue");
    ast.filter = Some(common::eq("closed", Value::Bool(true)));
    let view = View::materialize(&ast, &mut engine, &NoStats).unwrap();

    let snapshot = view.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].0.get("id").unwrap().to_string(), "2");
}

#[test]
fn test_filter_tracks_add_and_remove_after_hydration() {
    let mut engine = common::engine();
    let mut ast = Ast::new("issue");
    ast.filter = Some(common::eq("closed", Value::Bool(true)));
    let mut node = engine.compile(&ast, &NoStats).unwrap().0;
    assert!(node.pull().unwrap().is_empty());

    let txn = zero_ivm::change_source::Transaction {
        version: Version::new("1"),
        changes: vec![TableChange { table: "issue".into(), change: Change::Add(common::issue("1", "a", true)) }],
    };
    let mut views = [&mut node];
    let out = engine.apply_transaction(&txn, &mut views).unwrap();
    assert_eq!(out[0].len(), 1);
    assert!(matches!(out[0][0], Change::Add(_)));

    let txn2 = zero_ivm::change_source::Transaction {
        version: Version::new("2"),
        changes: vec![TableChange { table: "issue".into(), change: Change::Remove(common::issue("1", "a", true)) }],
    };
    let mut views = [&mut node];
    let out2 = engine.apply_transaction(&txn2, &mut views).unwrap();
    assert_eq!(out2[0].len(), 1);
    assert!(matches!(out2[0][0], Change::Remove(_)));
}
