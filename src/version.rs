//! Version/frontier tracking for change sources (C8, §4.7, §6).
//!
//! A change source's versions are opaque, totally ordered tokens supplied by
//! the producer — the core never parses or constructs one. This replaces the
//! teacher's Postgres-LSN-keyed `Frontier`, which baked in knowledge of WAL
//! position formatting; here a `Version` is just an ordered string and a
//! `Frontier` maps table name to the version at which that table's contents
//! are known-consistent.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An opaque, totally ordered version token from a change source.
///
/// Ordering is lexicographic on the token's text. Producers are responsible
/// for choosing a token scheme (zero-padded sequence numbers, vector clocks
/// rendered to a sortable string, etc.) under which lexicographic order
/// matches the producer's intended total order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version(pub String);

impl Version {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn zero() -> Self {
        Self(String::new())
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-table version at which a view's inputs are known-consistent.
///
/// A view's baseline is the frontier captured at `materialize` time; a view
/// reaches `ResultType::Complete` once every table in its frontier has had a
/// `gotCallback` at or past its recorded version (§4.3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Frontier {
    pub tables: HashMap<String, Version>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, table: impl Into<String>, version: Version) {
        self.tables.insert(table.into(), version);
    }

    pub fn get(&self, table: &str) -> Option<&Version> {
        self.tables.get(table)
    }

    /// Whether `caught_up`'s per-table versions dominate this frontier's,
    /// i.e. every table this frontier cares about has reached at least its
    /// recorded version.
    pub fn satisfied_by(&self, caught_up: &Frontier) -> bool {
        self.tables.iter().all(|(table, version)| {
            caught_up.tables.get(table).map(|v| v >= version).unwrap_or(false)
        })
    }
}
