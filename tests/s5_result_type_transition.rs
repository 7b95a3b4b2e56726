//! S5: a view's `ResultType` starts `Unknown`, stays there across
//! snapshot-changing commits until its baseline is satisfied, then
//! transitions to `Complete` exactly once (§4.3, §8 invariant 3).

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use zero_ivm::ast::Ast;
use zero_ivm::change::Change;
use zero_ivm::dvm::operators::view_sink::ResultType;
use zero_ivm::materialize::View;
use zero_ivm::planner::NoStats;
use zero_ivm::version::Version;

fn ast_with_two_related_tables() -> Ast {
    let mut ast = Ast::new("issue");
    ast.related = vec![common::related_on_issue_id("comment"), common::related_on_issue_id("flag")];
    ast
}

#[test]
fn test_unknown_until_every_table_reports_caught_up() {
    let mut engine = common::engine();
    let ast = ast_with_two_related_tables();
    let mut view = View::materialize(&ast, &mut engine, &NoStats).unwrap();
    assert_eq!(view.result_type(), ResultType::Unknown);

    // issue's source has caught up, but comment/flag (also part of the
    // captured baseline frontier) have not yet — still Unknown.
    engine.record_got_callback("issue", Version::new("1"));
    view.commit(&engine, false);
    assert_eq!(view.result_type(), ResultType::Unknown);

    engine.record_got_callback("comment", Version::new("1"));
    engine.record_got_callback("flag", Version::new("1"));
    view.commit(&engine, false);
    assert_eq!(view.result_type(), ResultType::Complete);
}

#[test]
fn test_transition_fires_listener_exactly_once() {
    let mut engine = common::engine();
    let ast = ast_with_two_related_tables();
    let mut view = View::materialize(&ast, &mut engine, &NoStats).unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_clone = seen.clone();
    view.subscribe(Box::new(move |_snapshot, result_type| {
        seen_clone.borrow_mut().push(result_type);
    }));
    assert_eq!(seen.borrow().as_slice(), &[ResultType::Unknown]);

    engine.record_got_callback("issue", Version::new("1"));
    engine.record_got_callback("comment", Version::new("1"));
    engine.record_got_callback("flag", Version::new("1"));
    view.commit(&engine, false);
    assert_eq!(seen.borrow().as_slice(), &[ResultType::Unknown, ResultType::Complete]);

    // A later commit with no snapshot change and an already-satisfied
    // baseline must not re-fire.
    view.commit(&engine, false);
    assert_eq!(seen.borrow().len(), 2);
}

#[test]
fn test_snapshot_change_fires_independently_of_completeness() {
    let mut engine = common::engine();
    let ast = Ast::new("issue");
    let mut view = View::materialize(&ast, &mut engine, &NoStats).unwrap();

    let (table, subscriber) = view.leaves()[0].clone();
    view.push_at(&table, subscriber, Change::Add(common::issue("1", "a", false))).unwrap();
    view.commit(&engine, true);
    assert_eq!(view.result_type(), ResultType::Unknown);
    assert_eq!(view.snapshot().len(), 1);
}
