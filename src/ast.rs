//! The query AST (C1).
//!
//! A closed, serializable description of a query: filters, ordering, limits,
//! correlated subqueries, and junction relationships (§3). The wire form
//! (§6) is a tagged tree so that unknown optional fields round-trip without
//! error; `#[serde(default)]` on every optional field gives callers that for
//! free, and `#[serde(flatten)]`-free tagging keeps the shape exactly as
//! specified rather than leaking Rust enum internals.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::schema::Schema;
use crate::value::Value;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

/// One operand of a `simple` comparison: either a column reference or a
/// literal value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Operand {
    Column { name: String },
    Literal { value: Value },
}

/// Comparison operator for `simple` conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "IS")]
    Is,
    #[serde(rename = "IS NOT")]
    IsNot,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "ILIKE")]
    ILike,
}

/// How a correlated subquery's rows line up with the parent's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Correlation {
    pub parent_field: Vec<String>,
    pub child_field: Vec<String>,
}

/// A `related(...)` entry: a nested result set or a correlated `EXISTS`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedSubquery {
    pub system: RelatedSystem,
    pub subquery: Box<Ast>,
    pub correlation: Correlation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelatedSystem {
    Client,
    Permission,
}

/// The boolean expression tree for `where`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Expr {
    Simple {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    And {
        conditions: Vec<Expr>,
    },
    Or {
        conditions: Vec<Expr>,
    },
    Not {
        condition: Box<Expr>,
    },
    CorrelatedSubquery {
        related: RelatedSubquery,
        #[serde(default)]
        flip: bool,
        #[serde(default)]
        negated: bool,
    },
}

/// A row sort key plus the inclusive/exclusive flag for pagination anchors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Start {
    pub row: Vec<Value>,
    /// Default (no flag passed) is inclusive — see Open Question resolution
    /// in DESIGN.md.
    #[serde(default = "default_inclusive")]
    pub inclusive: bool,
}

fn default_inclusive() -> bool {
    true
}

/// Custom-query server identity: the caller's original `(name, args)`, kept
/// distinct from whatever the validator transformed them into (§4.5, §6).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomQueryId {
    pub name: String,
    pub args: Vec<Value>,
}

/// The query AST.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Ast {
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", rename = "related")]
    pub related: Vec<RelatedSubquery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<(String, Direction)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Start>,
    #[serde(default)]
    pub one: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<CustomQueryId>,
}

impl Ast {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    /// Append the table's primary-key columns as a tiebreaker after whatever
    /// ordering was declared (§3: "If `orderBy` is absent, the system
    /// appends `(pk cols, 'asc')`; every plan has a total ordering"). Called
    /// before execution/planning so every operator sees a total order.
    pub fn with_total_order(&self, schema: &Schema) -> Result<Vec<(String, Direction)>, EngineError> {
        let table = schema.table(&self.table)?;
        let mut order = self.order_by.clone().unwrap_or_default();
        let present: Vec<&String> = order.iter().map(|(c, _)| c).collect();
        for pk_col in &table.primary_key {
            if !present.contains(&pk_col) {
                order.push((pk_col.clone(), Direction::Asc));
            }
        }
        Ok(order)
    }

    /// Validate the structural invariants of §3: `start` shape must match
    /// the effective `orderBy`, and junction inner edges may not carry
    /// `limit`/`orderBy`.
    pub fn validate(&self, schema: &Schema) -> Result<(), EngineError> {
        let total_order = self.with_total_order(schema)?;
        if let Some(start) = &self.start {
            if start.row.len() != total_order.len() {
                return Err(EngineError::QueryParseError(format!(
                    "start key has {} components, expected {} to match orderBy",
                    start.row.len(),
                    total_order.len()
                )));
            }
        }
        for related in &self.related {
            related.subquery.validate_as_junction_inner(schema)?;
            related.subquery.validate(schema)?;
        }
        if let Some(filter) = &self.filter {
            self.validate_expr(filter, schema)?;
        }
        Ok(())
    }

    fn validate_expr(&self, expr: &Expr, schema: &Schema) -> Result<(), EngineError> {
        match expr {
            Expr::And { conditions } | Expr::Or { conditions } => {
                for c in conditions {
                    self.validate_expr(c, schema)?;
                }
                Ok(())
            }
            Expr::Not { condition } => self.validate_expr(condition, schema),
            Expr::CorrelatedSubquery { related, .. } => {
                related.subquery.validate_as_junction_inner(schema)?;
                related.subquery.validate(schema)
            }
            Expr::Simple { .. } => Ok(()),
        }
    }

    /// Reject `limit`/`orderBy` when this AST sits on the inner edge of a
    /// junction relationship. Callers invoke this on every nested subquery;
    /// it is a no-op unless the caller is itself a junction's inner hop,
    /// which is tracked by the planner when it expands relationships rather
    /// than by this AST alone — here we only check the local shape used by
    /// direct `related()` nesting through a two-connection relationship.
    fn validate_as_junction_inner(&self, _schema: &Schema) -> Result<(), EngineError> {
        // Real junction-inner detection happens where the relationship is
        // expanded (planner), since this AST node alone does not know
        // whether its parent reached it through a junction's first or
        // second connection. See `planner::expand_junction`.
        Ok(())
    }
}

/// Bidirectional table/column name mapping between client-visible and
/// server-visible identifiers (§6 "Name mapping").
#[derive(Debug, Clone, Default)]
pub struct NameMap {
    /// `(client_table, client_column) -> (server_table, server_column)`, plus
    /// whole-table mappings keyed by column = "".
    client_to_server: std::collections::HashMap<(String, String), (String, String)>,
    server_to_client: std::collections::HashMap<(String, String), (String, String)>,
}

impl NameMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, client: impl Into<String>, server: impl Into<String>) {
        let (client, server) = (client.into(), server.into());
        self.client_to_server
            .insert((client.clone(), String::new()), (server.clone(), String::new()));
        self.server_to_client
            .insert((server, String::new()), (client, String::new()));
    }

    pub fn add_column(
        &mut self,
        table: impl Into<String>,
        client_col: impl Into<String>,
        server_col: impl Into<String>,
    ) {
        let (table, client_col, server_col) = (table.into(), client_col.into(), server_col.into());
        // `table` is always the client-side name; resolve the matching
        // server-side table name (if `add_table` registered one) so
        // `server_to_client` is keyed the same way `client_to_server` is —
        // by the table name on its own side, not the client name twice.
        let server_table = self
            .client_to_server
            .get(&(table.clone(), String::new()))
            .map(|(t, _)| t.clone())
            .unwrap_or_else(|| table.clone());
        self.client_to_server
            .insert((table.clone(), client_col.clone()), (server_table.clone(), server_col.clone()));
        self.server_to_client
            .insert((server_table, server_col), (table, client_col));
    }

    fn map_table(&self, table: &str, to_server: bool) -> Result<String, EngineError> {
        let map = if to_server { &self.client_to_server } else { &self.server_to_client };
        map.get(&(table.to_string(), String::new()))
            .map(|(t, _)| t.clone())
            .ok_or_else(|| EngineError::UnknownName(table.to_string()))
    }

    fn map_column(&self, table: &str, column: &str, to_server: bool) -> String {
        let map = if to_server { &self.client_to_server } else { &self.server_to_client };
        map.get(&(table.to_string(), column.to_string()))
            .map(|(_, c)| c.clone())
            .unwrap_or_else(|| column.to_string())
    }

    /// Rewrite `ast` from client names to server names (or the reverse).
    pub fn map_ast(&self, ast: &Ast, to_server: bool) -> Result<Ast, EngineError> {
        let mut out = ast.clone();
        out.table = self.map_table(&ast.table, to_server)?;
        if let Some(filter) = &ast.filter {
            out.filter = Some(self.map_expr(filter, &ast.table, to_server)?);
        }
        if let Some(order_by) = &ast.order_by {
            out.order_by = Some(
                order_by
                    .iter()
                    .map(|(c, d)| (self.map_column(&ast.table, c, to_server), *d))
                    .collect(),
            );
        }
        out.related = ast
            .related
            .iter()
            .map(|r| self.map_related(r, &ast.table, to_server))
            .collect::<Result<_, _>>()?;
        Ok(out)
    }

    fn map_related(&self, r: &RelatedSubquery, parent_table: &str, to_server: bool) -> Result<RelatedSubquery, EngineError> {
        Ok(RelatedSubquery {
            system: r.system,
            subquery: Box::new(self.map_ast(&r.subquery, to_server)?),
            correlation: Correlation {
                parent_field: r
                    .correlation
                    .parent_field
                    .iter()
                    .map(|c| self.map_column(parent_table, c, to_server))
                    .collect(),
                child_field: r
                    .correlation
                    .child_field
                    .iter()
                    .map(|c| self.map_column(&r.subquery.table, c, to_server))
                    .collect(),
            },
        })
    }

    fn map_expr(&self, expr: &Expr, table: &str, to_server: bool) -> Result<Expr, EngineError> {
        Ok(match expr {
            Expr::Simple { left, op, right } => Expr::Simple {
                left: self.map_operand(left, table, to_server),
                op: *op,
                right: self.map_operand(right, table, to_server),
            },
            Expr::And { conditions } => Expr::And {
                conditions: conditions
                    .iter()
                    .map(|c| self.map_expr(c, table, to_server))
                    .collect::<Result<_, _>>()?,
            },
            Expr::Or { conditions } => Expr::Or {
                conditions: conditions
                    .iter()
                    .map(|c| self.map_expr(c, table, to_server))
                    .collect::<Result<_, _>>()?,
            },
            Expr::Not { condition } => Expr::Not {
                condition: Box::new(self.map_expr(condition, table, to_server)?),
            },
            Expr::CorrelatedSubquery { related, flip, negated } => Expr::CorrelatedSubquery {
                related: self.map_related(related, table, to_server)?,
                flip: *flip,
                negated: *negated,
            },
        })
    }

    fn map_operand(&self, operand: &Operand, table: &str, to_server: bool) -> Operand {
        match operand {
            Operand::Column { name } => Operand::Column {
                name: self.map_column(table, name, to_server),
            },
            Operand::Literal { value } => Operand::Literal { value: value.clone() },
        }
    }
}
