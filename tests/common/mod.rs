//! Shared fixtures for the end-to-end scenario tests.
//!
//! These tests exercise the crate only through its public surface
//! (`Engine`, `View`, `ChangeSource`) — the same boundary an embedder
//! crosses — rather than reaching into `dvm::operators` internals.

use zero_ivm::ast::{Ast, CompareOp, Correlation, Direction, Expr, Operand, RelatedSubquery, RelatedSystem, Start};
use zero_ivm::config::EngineConfig;
use zero_ivm::engine::Engine;
use zero_ivm::schema::{Column, ColumnType, Schema, Table};
use zero_ivm::value::{Row, Value};

/// issue(id, title, closed), comment(id, issueId, text), flag(id, issueId, kind).
pub fn schema() -> Schema {
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
    schema.add_table(Table {
        name: "comment".into(),
        columns: vec![
            Column { name: "id".into(), ty: ColumnType::String },
            Column { name: "issueId".into(), ty: ColumnType::String },
            Column { name: "text".into(), ty: ColumnType::String },
        ],
        primary_key: vec!["id".into()],
        relationships: vec![],
    });
    schema.add_table(Table {
        name: "flag".into(),
        columns: vec![
            Column { name: "id".into(), ty: ColumnType::String },
            Column { name: "issueId".into(), ty: ColumnType::String },
            Column { name: "kind".into(), ty: ColumnType::String },
        ],
        primary_key: vec!["id".into()],
        relationships: vec![],
    });
    schema
}

pub fn engine() -> Engine {
    let mut engine = Engine::new(schema(), EngineConfig::default());
    engine.add_source("issue").unwrap();
    engine.add_source("comment").unwrap();
    engine.add_source("flag").unwrap();
    engine
}

pub fn issue(id: &str, title: &str, closed: bool) -> Row {
    Row::new()
        .with("id", Value::String(id.into()))
        .with("title", Value::String(title.into()))
        .with("closed", Value::Bool(closed))
}

pub fn comment(id: &str, issue_id: &str, text: &str) -> Row {
    Row::new()
        .with("id", Value::String(id.into()))
        .with("issueId", Value::String(issue_id.into()))
        .with("text", Value::String(text.into()))
}

pub fn flag(id: &str, issue_id: &str, kind: &str) -> Row {
    Row::new()
        .with("id", Value::String(id.into()))
        .with("issueId", Value::String(issue_id.into()))
        .with("kind", Value::String(kind.into()))
}

pub fn eq(column: &str, value: Value) -> Expr {
    Expr::Simple {
        left: Operand::Column { name: column.into() },
        op: CompareOp::Eq,
        right: Operand::Literal { value },
    }
}

/// `issue.{relationship}` over `child_table`, correlated on `issueId = id`.
pub fn related_on_issue_id(relationship_table: &str) -> RelatedSubquery {
    RelatedSubquery {
        system: RelatedSystem::Client,
        subquery: Box::new(Ast::new(relationship_table)),
        correlation: Correlation {
            parent_field: vec!["id".into()],
            child_field: vec!["issueId".into()],
        },
    }
}

/// A `where exists(...)` / `where not exists(...)` correlated subquery over
/// `child_table`, optionally filtered.
pub fn exists_filter(child_table: &str, child_filter: Option<Expr>, negated: bool) -> Expr {
    let mut subquery = Ast::new(child_table);
    subquery.filter = child_filter;
    Expr::CorrelatedSubquery {
        related: RelatedSubquery {
            system: RelatedSystem::Client,
            subquery: Box::new(subquery),
            correlation: Correlation {
                parent_field: vec!["id".into()],
                child_field: vec!["issueId".into()],
            },
        },
        flip: false,
        negated,
    }
}

pub fn start_at(id: &str, inclusive: bool) -> Start {
    Start { row: vec![Value::String(id.into())], inclusive }
}

pub fn asc(column: &str) -> Vec<(String, Direction)> {
    vec![(column.to_string(), Direction::Asc)]
}
