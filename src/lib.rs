//! zero-ivm — the incremental view-maintenance core of a reactive
//! relational query engine.
//!
//! Clients express declarative queries (the [`ast`] module) over a
//! relational [`schema`]; an in-memory row [`source`] store applies
//! upstream deltas and feeds a [`dvm`] operator graph, which a
//! [`materialize`]d [`dvm::operators::view_sink::ViewSink`] folds into a
//! patch-streamed snapshot. The [`planner`] rewrites an AST into an
//! equivalent cheaper one; the [`registry`] addresses named, argument-bound
//! queries; the [`scheduler`] lets long hydrate/advance loops cooperatively
//! yield; the [`change_source`] trait is the abstract boundary to whatever
//! produces versioned transactions upstream.
//!
//! # Theoretical basis
//!
//! - Gupta & Mumick (1995), "Maintenance of Materialized Views: Problems,
//!   Techniques, and Applications", IEEE Data Engineering Bulletin — the
//!   per-operator differentiation rules this crate's `dvm::operators`
//!   implement directly over in-memory `Change` values.
//! - Liu & Layland (1973), "Scheduling Algorithms for Multiprogramming in a
//!   Hard-Real-Time Environment", JACM — informs the cooperative-yield
//!   discipline in [`scheduler`].

#![allow(dead_code)]

pub mod ast;
pub mod change;
pub mod change_source;
pub mod config;
pub mod dvm;
pub mod engine;
pub mod error;
mod eval;
mod hash;
pub mod materialize;
mod ordering;
pub mod planner;
pub mod registry;
pub mod scheduler;
pub mod schema;
pub mod source;
pub mod value;
pub mod version;
