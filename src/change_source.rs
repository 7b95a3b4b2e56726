//! Change source interface (C8, §4.7, §6).
//!
//! The core never speaks to a replication protocol directly. It consumes an
//! abstract stream of versioned transactions from whatever implements
//! [`ChangeSource`] — a logical-decoding adapter in a real deployment, or
//! [`TestChangeSource`] in unit tests and scenario tests.

use std::collections::VecDeque;

use crate::change::Change;
use crate::error::EngineError;
use crate::version::Version;

/// One committed upstream transaction: a version token plus the ordered
/// changes it carries, each tagged with the table it applies to.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub version: Version,
    pub changes: Vec<TableChange>,
}

#[derive(Debug, Clone)]
pub struct TableChange {
    pub table: String,
    pub change: Change,
}

/// An abstract producer of ordered, versioned row deltas.
///
/// `reset` is signaled out of band (via `Err(EngineError::ChangeSourceReset)`
/// from `poll`) rather than as a variant of the return type, since a reset
/// can occur at any point, not only between transactions.
pub trait ChangeSource {
    /// Returns the next committed transaction, if one is ready. Returns
    /// `Ok(None)` when there is nothing to deliver yet (not an error: the
    /// scheduler should yield and poll again later).
    fn poll(&mut self) -> Result<Option<Transaction>, EngineError>;

    /// Reports the highest version this consumer has durably applied, so
    /// the producer may reclaim upstream log space.
    fn ack(&mut self, version: &Version);

    /// Signals that the consumer wants notification once the producer has
    /// caught up to `version` on every table (used to drive `ResultType`
    /// transitions, §4.3).
    fn got_callback(&mut self, version: &Version) -> bool;
}

/// A deterministic, in-memory change source for tests: transactions are
/// queued explicitly and delivered one at a time via `poll`.
#[derive(Default)]
pub struct TestChangeSource {
    pending: VecDeque<Transaction>,
    caught_up_to: Option<Version>,
    acked: Option<Version>,
}

impl TestChangeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a transaction for the next `poll`.
    pub fn push_transaction(&mut self, version: Version, changes: Vec<TableChange>) {
        self.pending.push_back(Transaction { version, changes });
    }

    /// Marks the source as caught up to `version`, as if an upstream
    /// replication slot had confirmed flush to that point.
    pub fn mark_caught_up(&mut self, version: Version) {
        self.caught_up_to = Some(version);
    }

    pub fn acked_version(&self) -> Option<&Version> {
        self.acked.as_ref()
    }
}

impl ChangeSource for TestChangeSource {
    fn poll(&mut self) -> Result<Option<Transaction>, EngineError> {
        Ok(self.pending.pop_front())
    }

    fn ack(&mut self, version: &Version) {
        self.acked = Some(version.clone());
    }

    fn got_callback(&mut self, version: &Version) -> bool {
        self.caught_up_to.as_ref().map(|c| c >= version).unwrap_or(false)
    }
}
