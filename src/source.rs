//! Row store / source (C2, §4.1).
//!
//! A [`Source`] holds one table's rows: a primary index ordered by primary
//! key, zero or more secondary orderings pinned by subscribers, and a change
//! feed. `push` applies one upstream delta and fans it out, per ordering, to
//! every subscriber pinned on that ordering.

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::ast::Direction;
use crate::change::Change;
use crate::error::EngineError;
use crate::value::{Row, RowKey};

pub type SubscriberId = u64;

/// An ordering a subscriber pins: an ordered column/direction list, always
/// including the primary-key tiebreaker once normalized by the caller.
pub type Ordering = Vec<(String, Direction)>;

/// A simple equality predicate a subscriber can supply so the source can
/// short-circuit delivering changes the subscriber would immediately drop.
#[derive(Debug, Clone)]
pub struct FilterHint {
    pub column: String,
    pub equals: crate::value::Value,
}

impl FilterHint {
    fn admits(&self, row: &Row) -> bool {
        row.get(&self.column).map(|v| v == &self.equals).unwrap_or(false)
    }
}

fn sort_key(row: &Row, ordering: &Ordering) -> Vec<crate::value::Value> {
    let cols: Vec<String> = ordering.iter().map(|(c, _)| c.clone()).collect();
    row.sort_key(&cols)
}

struct OrderingState {
    index: BTreeSet<(Vec<crate::value::Value>, RowKey)>,
    ref_count: usize,
}

struct Subscriber {
    ordering: Ordering,
    filter_hint: Option<FilterHint>,
    queue: VecDeque<Change>,
}

/// In-memory representation of one table: its rows, indexes, and change feed.
pub struct Source {
    pub table: String,
    pk_columns: Vec<String>,
    rows: HashMap<RowKey, Row>,
    orderings: HashMap<Ordering, OrderingState>,
    subscribers: HashMap<SubscriberId, Subscriber>,
    next_subscriber_id: SubscriberId,
}

impl Source {
    pub fn new(table: impl Into<String>, pk_columns: Vec<String>) -> Self {
        Self {
            table: table.into(),
            pk_columns,
            rows: HashMap::new(),
            orderings: HashMap::new(),
            subscribers: HashMap::new(),
            next_subscriber_id: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn key(&self, row: &Row) -> RowKey {
        row.key(&self.pk_columns)
    }

    /// Applies one of `add`/`remove`/`edit` to the store (§4.1).
    pub fn push(&mut self, change: Change) -> Result<(), EngineError> {
        match &change {
            Change::Add(row) => {
                let key = self.key(row);
                if self.rows.contains_key(&key) {
                    return Err(EngineError::PrimaryKeyConflict {
                        table: self.table.clone(),
                        key: key.to_string(),
                    });
                }
                for (ordering, state) in self.orderings.iter_mut() {
                    state.index.insert((sort_key(row, ordering), key.clone()));
                }
                self.rows.insert(key, row.clone());
            }
            Change::Remove(row) => {
                let key = self.key(row);
                let existing = self
                    .rows
                    .remove(&key)
                    .ok_or_else(|| EngineError::NotFound {
                        table: self.table.clone(),
                        key: key.to_string(),
                    })?;
                for (ordering, state) in self.orderings.iter_mut() {
                    state.index.remove(&(sort_key(&existing, ordering), key.clone()));
                }
            }
            Change::Edit { old, new } => {
                let old_key = self.key(old);
                let new_key = self.key(new);
                if old_key != new_key {
                    return Err(EngineError::NotFound {
                        table: self.table.clone(),
                        key: old_key.to_string(),
                    });
                }
                if !self.rows.contains_key(&old_key) {
                    return Err(EngineError::NotFound {
                        table: self.table.clone(),
                        key: old_key.to_string(),
                    });
                }
                for (ordering, state) in self.orderings.iter_mut() {
                    state.index.remove(&(sort_key(old, ordering), old_key.clone()));
                    state.index.insert((sort_key(new, ordering), new_key.clone()));
                }
                self.rows.insert(new_key, new.clone());
            }
            Change::Child { .. } => {
                return Err(EngineError::InternalError(
                    "a source never receives a child change directly".into(),
                ));
            }
        }

        for subscriber in self.subscribers.values_mut() {
            if Self::change_admitted(&change, &subscriber.filter_hint) {
                subscriber.queue.push_back(change.clone());
            }
        }
        Ok(())
    }

    fn change_admitted(change: &Change, hint: &Option<FilterHint>) -> bool {
        let Some(hint) = hint else { return true };
        match change {
            Change::Add(r) | Change::Remove(r) => hint.admits(r),
            Change::Edit { old, new } => hint.admits(old) || hint.admits(new),
            Change::Child { .. } => true,
        }
    }

    /// Registers a subscription pinned on `ordering`, returning its id and a
    /// snapshot of the current contents in that order (the "lazy,
    /// restartable sequence" of §4.1, realized here as an eager Vec since
    /// the engine is single-threaded and cooperative rather than async).
    pub fn connect(&mut self, ordering: Ordering, filter_hint: Option<FilterHint>) -> (SubscriberId, Vec<Row>) {
        let state = self.orderings.entry(ordering.clone()).or_insert_with(|| OrderingState {
            index: self
                .rows
                .iter()
                .map(|(k, r)| (sort_key(r, &ordering), k.clone()))
                .collect(),
            ref_count: 0,
        });
        state.ref_count += 1;

        let snapshot: Vec<Row> = state
            .index
            .iter()
            .filter_map(|(_, key)| self.rows.get(key).cloned())
            .filter(|r| filter_hint.as_ref().map(|h| h.admits(r)).unwrap_or(true))
            .collect();

        let id = self.next_subscriber_id;
        self.next_subscriber_id += 1;
        self.subscribers.insert(
            id,
            Subscriber {
                ordering,
                filter_hint,
                queue: VecDeque::new(),
            },
        );
        (id, snapshot)
    }

    /// Tears down a subscription, releasing its pin on the ordering.
    pub fn disconnect(&mut self, id: SubscriberId) {
        if let Some(sub) = self.subscribers.remove(&id) {
            if let Some(state) = self.orderings.get_mut(&sub.ordering) {
                state.ref_count = state.ref_count.saturating_sub(1);
                if state.ref_count == 0 {
                    self.orderings.remove(&sub.ordering);
                }
            }
        }
    }

    /// Drains at most one queued change for `id`, for the scheduler to push
    /// into the subscriber's operator. Returns `None` when caught up.
    pub fn drain_one(&mut self, id: SubscriberId) -> Option<Change> {
        self.subscribers.get_mut(&id)?.queue.pop_front()
    }

    pub fn pending_len(&self, id: SubscriberId) -> usize {
        self.subscribers.get(&id).map(|s| s.queue.len()).unwrap_or(0)
    }

    /// Marks a transactional boundary. Operators may defer downstream
    /// notifications until commit (§5); the source itself has no additional
    /// state to flush — this exists as an explicit call site so the
    /// scheduler's transaction loop has one uniform place to call per
    /// source, matching the engine's "at most one batch per transaction"
    /// rule.
    pub fn commit(&mut self) {}
}
