//! Deadline-ordered timer storage.
//!
//! Keys are `(deadline, sequence)` pairs in a `BTreeMap`, so the front
//! entry always has the earliest deadline and entries sharing a deadline
//! fire in insertion order. The queue is pure storage; arming, draining
//! and stop-path removal live on the reactor, which releases its borrow
//! before invoking any continuation.

use std::collections::BTreeMap;
use std::time::Instant;

use crate::runtime::{Callback, StopSource};

pub(crate) type TimerKey = (Instant, u64);

pub(crate) struct TimerEntry {
    pub(crate) call: Callback,
    pub(crate) stop: StopSource,
}

pub(crate) struct TimerQueue {
    entries: BTreeMap<TimerKey, TimerEntry>,
    next_seq: u64,
}

impl TimerQueue {
    pub(crate) fn new() -> Self {
        Self { entries: BTreeMap::new(), next_seq: 0 }
    }

    pub(crate) fn insert(&mut self, deadline: Instant, call: Callback, stop: StopSource) -> TimerKey {
        let key = (deadline, self.next_seq);
        self.next_seq += 1;
        self.entries.insert(key, TimerEntry { call, stop });
        key
    }

    pub(crate) fn remove(&mut self, key: &TimerKey) -> Option<TimerEntry> {
        self.entries.remove(key)
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.entries.keys().next().map(|(deadline, _)| *deadline)
    }

    pub(crate) fn pop_front(&mut self) -> Option<TimerEntry> {
        self.entries.pop_first().map(|(_, entry)| entry)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
