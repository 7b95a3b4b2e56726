//! Table/column/relationship metadata (C1).
//!
//! A [`Schema`] is the catalog of [`Table`]s an engine instance serves
//! queries against. Tables carry typed columns, a primary key, and the
//! [`Relationship`]s (`related(...)`) clauses in an AST may traverse.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Scalar column type. Mirrors the [`crate::value::Value`] domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    String,
    Int,
    Float,
    Bool,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

/// Cardinality of one side of a [`Relationship`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cardinality {
    One,
    Many,
}

/// One hop of a relationship: an equal-length pair of source/destination
/// column lists plus the destination table and cardinality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub source_field: Vec<String>,
    pub dest_field: Vec<String>,
    pub dest_table: String,
    pub cardinality: Cardinality,
}

/// A named traversal from a table to related rows. Two connections encode a
/// junction (many-to-many) relationship through a link table; one connection
/// is a direct one/many-to-one/many relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    pub name: String,
    pub connections: Vec<Connection>,
}

impl Relationship {
    /// A two-connection relationship is a junction: its inner edge (the hop
    /// from the junction table to the final destination) may not carry
    /// `limit`/`orderBy` (§3, §4.2).
    pub fn is_junction(&self) -> bool {
        self.connections.len() == 2
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    /// Non-empty ordered list of primary-key column names.
    pub primary_key: Vec<String>,
    pub relationships: Vec<Relationship>,
}

impl Table {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.name == name)
    }
}

/// The catalog of tables an engine instance serves.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    tables: HashMap<String, Table>,
}

impl Schema {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    pub fn add_table(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn table(&self, name: &str) -> Result<&Table, EngineError> {
        self.tables
            .get(name)
            .ok_or_else(|| EngineError::UnknownTable(name.to_string()))
    }

    pub fn column(&self, table: &str, col: &str) -> Result<&Column, EngineError> {
        self.table(table)?
            .column(col)
            .ok_or_else(|| EngineError::UnknownColumn(table.to_string(), col.to_string()))
    }

    pub fn relationship(&self, table: &str, name: &str) -> Result<&Relationship, EngineError> {
        self.table(table)?
            .relationship(name)
            .ok_or_else(|| EngineError::UnknownRelationship(table.to_string(), name.to_string()))
    }
}
