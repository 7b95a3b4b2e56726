//! Compiles a planned AST into a tree of operator nodes and drives changes
//! through it (§4.2 "Hydration", "Advance").
//!
//! The graph is a plain recursive enum rather than a collection of boxed
//! trait objects, because sibling operators disagree on their push
//! signature (`Join`/`Exists` take a side — parent or child — while
//! `Filter`/`Skip`/`Take` take a single upstream change). Modeling that
//! directly keeps the traversal code exhaustive-checked by the compiler
//! instead of hidden behind `dyn Operator`.

use crate::ast::{Ast, Direction, Expr};
use crate::change::Change;
use crate::dvm::operators::exists::Exists;
use crate::dvm::operators::fan::{FanIn, FanOut};
use crate::dvm::operators::filter::Filter;
use crate::dvm::operators::join::Join;
use crate::dvm::operators::skip::Skip;
use crate::dvm::operators::table_source::TableSource;
use crate::dvm::operators::take::Take;
use crate::dvm::row_id::RowIdStrategy;
use crate::dvm::Operator;
use crate::error::EngineError;
use crate::schema::Schema;
use crate::source::{FilterHint, SubscriberId};
use crate::value::Row;

/// One branch of a disjunction: its own `Exists` state plus the child
/// subtree feeding it.
pub struct Branch {
    exists: Exists,
    child: Node,
}

/// One compiled node. Leaves are `Source`; everything else wraps exactly the
/// upstream(s) it needs.
pub enum Node {
    Source { table: String, subscriber: SubscriberId, op: TableSource },
    Filter { op: Filter, input: Box<Node> },
    Skip { op: Skip, input: Box<Node> },
    Take { op: Take, input: Box<Node> },
    /// `where exists(...)`: `parent` is filtered by whether `child` is non-empty.
    ExistsFilter { op: Exists, parent: Box<Node>, child: Box<Node> },
    /// `.related(...)`: `child` is nested onto `parent` under `relationship`.
    Related { op: Join, parent: Box<Node>, child: Box<Node> },
    /// An `OR` of correlated-subquery branches sharing one upstream,
    /// recombined with distinct-by-key (§4.2 "Or / union").
    Union { fan_out: FanOut, fan_in: FanIn, parent: Box<Node>, branches: Vec<Branch> },
}

impl Node {
    /// Pull this node's current output as a batch of `Add`s (hydration).
    pub fn pull(&mut self) -> Result<Vec<Change>, EngineError> {
        match self {
            Node::Source { op, .. } => op.pull(),
            Node::Filter { op, input } => fold(input.pull()?, |c| op.push(c)),
            Node::Skip { op, input } => fold(input.pull()?, |c| op.push(c)),
            Node::Take { op, input } => {
                for change in input.pull()? {
                    op.push(change)?;
                }
                op.pull()
            }
            Node::ExistsFilter { op, parent, child } => {
                for change in child.pull()? {
                    op.push_child(change)?;
                }
                fold(parent.pull()?, |c| op.push_parent(c))
            }
            Node::Related { op, parent, child } => {
                for change in child.pull()? {
                    op.push_child(change)?;
                }
                fold(parent.pull()?, |c| op.push_parent(c))
            }
            Node::Union { fan_out, fan_in, parent, branches } => {
                for branch in branches.iter_mut() {
                    for change in branch.child.pull()? {
                        branch.exists.push_child(change)?;
                    }
                }
                let mut out = Vec::new();
                for change in parent.pull()? {
                    // `fan_out` returns one copy per branch, in branch order;
                    // each copy belongs to exactly one branch, not all of them.
                    for (duplicated, branch) in fan_out.push(change)?.into_iter().zip(branches.iter_mut()) {
                        for admitted in branch.exists.push_parent(duplicated)? {
                            out.extend(fan_in.push_from_branch(admitted)?);
                        }
                    }
                }
                Ok(out)
            }
        }
    }

    /// Every `(table, subscriber)` leaf reachable from this node, for the
    /// engine to know which source subscriptions feed it.
    pub fn leaves(&self) -> Vec<(String, SubscriberId)> {
        match self {
            Node::Source { table, subscriber, .. } => vec![(table.clone(), *subscriber)],
            Node::Filter { input, .. } | Node::Skip { input, .. } | Node::Take { input, .. } => input.leaves(),
            Node::ExistsFilter { parent, child, .. } | Node::Related { parent, child, .. } => {
                let mut out = parent.leaves();
                out.extend(child.leaves());
                out
            }
            Node::Union { parent, branches, .. } => {
                let mut out = parent.leaves();
                for branch in branches {
                    out.extend(branch.child.leaves());
                }
                out
            }
        }
    }

    /// Push one change arriving at the leaf `(table, subscriber)`, returning
    /// the resulting root-level changes. Every leaf has a globally unique
    /// subscriber id, so at most one path through the tree produces output.
    pub fn push_at(&mut self, table: &str, subscriber: SubscriberId, change: Change) -> Result<Vec<Change>, EngineError> {
        match self {
            Node::Source { table: t, subscriber: s, op } => {
                if t == table && *s == subscriber {
                    op.push(change)
                } else {
                    Ok(vec![])
                }
            }
            Node::Filter { op, input } => fold(input.push_at(table, subscriber, change)?, |c| op.push(c)),
            Node::Skip { op, input } => fold(input.push_at(table, subscriber, change)?, |c| op.push(c)),
            Node::Take { op, input } => fold(input.push_at(table, subscriber, change)?, |c| op.push(c)),
            Node::ExistsFilter { op, parent, child } => {
                let mut out = fold(child.push_at(table, subscriber, change.clone())?, |c| op.push_child(c))?;
                out.extend(fold(parent.push_at(table, subscriber, change)?, |c| op.push_parent(c))?);
                Ok(out)
            }
            Node::Related { op, parent, child } => {
                let mut out = fold(child.push_at(table, subscriber, change.clone())?, |c| op.push_child(c))?;
                out.extend(fold(parent.push_at(table, subscriber, change)?, |c| op.push_parent(c))?);
                Ok(out)
            }
            Node::Union { fan_out, fan_in, parent, branches } => {
                let mut out = Vec::new();
                for branch in branches.iter_mut() {
                    for c in branch.child.push_at(table, subscriber, change.clone())? {
                        for admitted in branch.exists.push_child(c)? {
                            out.extend(fan_in.push_from_branch(admitted)?);
                        }
                    }
                }
                for parent_change in parent.push_at(table, subscriber, change)? {
                    // One copy per branch, in branch order; route copy i to
                    // branch i only, not every copy into every branch.
                    for (duplicated, branch) in fan_out.push(parent_change)?.into_iter().zip(branches.iter_mut()) {
                        for admitted in branch.exists.push_parent(duplicated)? {
                            out.extend(fan_in.push_from_branch(admitted)?);
                        }
                    }
                }
                Ok(out)
            }
        }
    }
}

fn fold<F>(changes: Vec<Change>, mut f: F) -> Result<Vec<Change>, EngineError>
where
    F: FnMut(Change) -> Result<Vec<Change>, EngineError>,
{
    let mut out = Vec::new();
    for change in changes {
        out.extend(f(change)?);
    }
    Ok(out)
}

/// Callback surface a graph compiler needs from whatever owns the sources:
/// connect a fresh subscription over a table.
pub trait SourceHost {
    fn connect(
        &mut self,
        table: &str,
        ordering: Vec<(String, Direction)>,
        hint: Option<FilterHint>,
    ) -> Result<(SubscriberId, Vec<Row>), EngineError>;
}

/// Compiles a validated, normalized AST into a `Node` tree.
pub fn compile(ast: &Ast, schema: &Schema, host: &mut dyn SourceHost) -> Result<Node, EngineError> {
    let table = schema.table(&ast.table)?;
    let pk = table.primary_key.clone();
    let order = ast.with_total_order(schema)?;

    let (subscriber, snapshot) = host.connect(&ast.table, order.clone(), None)?;
    let mut node = Node::Source { table: ast.table.clone(), subscriber, op: TableSource::new(&ast.table, snapshot) };

    if let Some(filter) = &ast.filter {
        node = compile_filter(node, filter, ast, schema, host)?;
    }

    for related in &ast.related {
        let child_node = compile(&related.subquery, schema, host)?;
        let join = Join::new(
            related.correlation.parent_field.clone(),
            related.correlation.child_field.clone(),
            pk.clone(),
            schema.table(&related.subquery.table)?.primary_key.clone(),
            related.subquery.table.clone(),
        );
        node = Node::Related { op: join, parent: Box::new(node), child: Box::new(child_node) };
    }

    if let Some(start) = &ast.start {
        let columns: Vec<String> = order.iter().map(|(c, _)| c.clone()).collect();
        let dirs: Vec<Direction> = order.iter().map(|(_, d)| *d).collect();
        node = Node::Skip { op: Skip::new(columns, dirs, start.row.clone(), start.inclusive), input: Box::new(node) };
    }

    if let Some(limit) = ast.limit {
        let columns: Vec<String> = order.iter().map(|(c, _)| c.clone()).collect();
        let dirs: Vec<Direction> = order.iter().map(|(_, d)| *d).collect();
        node = Node::Take {
            op: Take::new(limit as usize, columns, dirs, RowIdStrategy::PrimaryKey { pk_columns: pk.clone() }),
            input: Box::new(node),
        };
    }

    Ok(node)
}

fn compile_filter(
    node: Node,
    expr: &Expr,
    ast: &Ast,
    schema: &Schema,
    host: &mut dyn SourceHost,
) -> Result<Node, EngineError> {
    match expr {
        Expr::CorrelatedSubquery { related, negated, .. } => {
            let child_node = compile(&related.subquery, schema, host)?;
            let parent_pk = schema.table(&ast.table)?.primary_key.clone();
            let op = Exists::new(
                related.correlation.parent_field.clone(),
                related.correlation.child_field.clone(),
                parent_pk,
                *negated,
            );
            Ok(Node::ExistsFilter { op, parent: Box::new(node), child: Box::new(child_node) })
        }
        Expr::Or { conditions } if conditions.iter().all(is_correlated) && !conditions.is_empty() => {
            let mut branches = Vec::new();
            for cond in conditions {
                let Expr::CorrelatedSubquery { related, negated, .. } = cond else { unreachable!() };
                let child_node = compile(&related.subquery, schema, host)?;
                let parent_pk = schema.table(&ast.table)?.primary_key.clone();
                let exists = Exists::new(
                    related.correlation.parent_field.clone(),
                    related.correlation.child_field.clone(),
                    parent_pk,
                    *negated,
                );
                branches.push(Branch { exists, child: child_node });
            }
            let fan_out = FanOut::new(branches.len());
            let parent_pk = schema.table(&ast.table)?.primary_key.clone();
            let fan_in = FanIn::new(RowIdStrategy::PrimaryKey { pk_columns: parent_pk });
            Ok(Node::Union { fan_out, fan_in, parent: Box::new(node), branches })
        }
        _ => Ok(Node::Filter { op: Filter::new(expr.clone()), input: Box::new(node) }),
    }
}

fn is_correlated(expr: &Expr) -> bool {
    matches!(expr, Expr::CorrelatedSubquery { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dvm::operators::test_helpers::{eq_filter, issue};
    use crate::schema::{Column, ColumnType, Table};
    use crate::value::Value;
    use std::collections::HashMap as Map;

    struct FakeHost {
        rows: Map<String, Vec<Row>>,
        next_id: SubscriberId,
    }

    impl SourceHost for FakeHost {
        fn connect(
            &mut self,
            table: &str,
            _ordering: Vec<(String, Direction)>,
            _hint: Option<FilterHint>,
        ) -> Result<(SubscriberId, Vec<Row>), EngineError> {
            let id = self.next_id;
            self.next_id += 1;
            Ok((id, self.rows.get(table).cloned().unwrap_or_default()))
        }
    }

    fn schema() -> Schema {
        let mut s = Schema::new();
        s.add_table(Table {
            name: "issue".into(),
            columns: vec![
                Column { name: "id".into(), ty: ColumnType::String },
                Column { name: "title".into(), ty: ColumnType::String },
                Column { name: "closed".into(), ty: ColumnType::Bool },
            ],
            primary_key: vec!["id".into()],
            relationships: vec![],
        });
        s
    }

    #[test]
    fn test_compile_simple_filter_and_pull() {
        let schema = schema();
        let mut ast = Ast::new("issue");
        ast.filter = Some(eq_filter("title", Value::String("issue 1".into())));

        let mut host = FakeHost {
            rows: Map::from([(
                "issue".to_string(),
                vec![issue("0001", "issue 1", false), issue("0002", "issue 2", true)],
            )]),
            next_id: 0,
        };

        let mut node = compile(&ast, &schema, &mut host).unwrap();
        let out = node.pull().unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_compile_and_push_advance() {
        let schema = schema();
        let mut ast = Ast::new("issue");
        ast.filter = Some(eq_filter("closed", Value::Bool(true)));

        let mut host = FakeHost { rows: Map::new(), next_id: 0 };
        let mut node = compile(&ast, &schema, &mut host).unwrap();
        assert!(node.pull().unwrap().is_empty());

        let out = node.push_at("issue", 0, Change::Add(issue("1", "a", true))).unwrap();
        assert_eq!(out.len(), 1);
    }
}
