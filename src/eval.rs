//! Predicate evaluation over a single row.
//!
//! Evaluation errors on one row propagate as a query-level `EvaluationError`
//! and must not poison other queries (§4.2 "Failure semantics").

use crate::ast::{CompareOp, Expr, Operand};
use crate::error::EngineError;
use crate::value::{Row, Value};

/// Evaluate a boolean expression against a row. Correlated subqueries are
/// not evaluated here — `Exists` is its own operator (§4.2) — so a
/// `CorrelatedSubquery` node reaching this evaluator is a planner/operator
/// wiring bug, not a row-level error.
pub fn eval(expr: &Expr, row: &Row) -> Result<bool, EngineError> {
    match expr {
        Expr::Simple { left, op, right } => {
            let l = resolve(left, row);
            let r = resolve(right, row);
            Ok(compare(&l, *op, &r))
        }
        Expr::And { conditions } => {
            for c in conditions {
                if !eval(c, row)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Expr::Or { conditions } => {
            for c in conditions {
                if eval(c, row)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Expr::Not { condition } => Ok(!eval(condition, row)?),
        Expr::CorrelatedSubquery { .. } => Err(EngineError::EvaluationError(
            "correlated subquery reached row-level evaluator; must be handled by an Exists operator".into(),
        )),
    }
}

fn resolve(operand: &Operand, row: &Row) -> Value {
    match operand {
        Operand::Column { name } => row.get(name).cloned().unwrap_or(Value::Null),
        Operand::Literal { value } => value.clone(),
    }
}

fn compare(left: &Value, op: CompareOp, right: &Value) -> bool {
    match op {
        CompareOp::Is => return values_is(left, right),
        CompareOp::IsNot => return !values_is(left, right),
        CompareOp::Like => return like(left, right, false),
        CompareOp::ILike => return like(left, right, true),
        _ => {}
    }
    // Every remaining operator is unknown (false) when either side is NULL,
    // matching SQL three-valued logic collapsed to a boolean predicate.
    if left.is_null() || right.is_null() {
        return false;
    }
    match op {
        CompareOp::Eq => left == right,
        CompareOp::Ne => left != right,
        CompareOp::Lt => left.partial_cmp(right) == Some(std::cmp::Ordering::Less),
        CompareOp::Lte => matches!(
            left.partial_cmp(right),
            Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
        ),
        CompareOp::Gt => left.partial_cmp(right) == Some(std::cmp::Ordering::Greater),
        CompareOp::Gte => matches!(
            left.partial_cmp(right),
            Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
        ),
        CompareOp::Is | CompareOp::IsNot | CompareOp::Like | CompareOp::ILike => unreachable!(),
    }
}

fn values_is(left: &Value, right: &Value) -> bool {
    // IS/IS NOT treat NULL as a comparable value, unlike every other operator.
    left == right || (left.is_null() && right.is_null())
}

fn like(left: &Value, right: &Value, case_insensitive: bool) -> bool {
    let (Value::String(s), Value::String(pattern)) = (left, right) else {
        return false;
    };
    let (s, pattern) = if case_insensitive {
        (s.to_lowercase(), pattern.to_lowercase())
    } else {
        (s.clone(), pattern.clone())
    };
    like_match(&s, &pattern)
}

/// `%` matches any run of characters, `_` matches exactly one.
fn like_match(s: &str, pattern: &str) -> bool {
    fn rec(s: &[u8], p: &[u8]) -> bool {
        match p.first() {
            None => s.is_empty(),
            Some(b'%') => rec(s, &p[1..]) || (!s.is_empty() && rec(&s[1..], p)),
            Some(b'_') => !s.is_empty() && rec(&s[1..], &p[1..]),
            Some(c) => s.first() == Some(c) && rec(&s[1..], &p[1..]),
        }
    }
    rec(s.as_bytes(), pattern.as_bytes())
}
