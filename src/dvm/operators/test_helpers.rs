//! Shared test fixtures for operator unit tests.

use crate::ast::{CompareOp, Expr, Operand};
use crate::value::{Row, Value};

pub fn issue(id: &str, title: &str, closed: bool) -> Row {
    Row::new()
        .with("id", Value::String(id.into()))
        .with("title", Value::String(title.into()))
        .with("closed", Value::Bool(closed))
}

pub fn label(id: &str, name: &str) -> Row {
    Row::new().with("id", Value::String(id.into())).with("name", Value::String(name.into()))
}

pub fn comment(id: &str, issue_id: &str, text: &str) -> Row {
    Row::new()
        .with("id", Value::String(id.into()))
        .with("issueId", Value::String(issue_id.into()))
        .with("text", Value::String(text.into()))
}

pub fn eq_filter(column: &str, value: Value) -> Expr {
    Expr::Simple {
        left: Operand::Column { name: column.into() },
        op: CompareOp::Eq,
        right: Operand::Literal { value },
    }
}
