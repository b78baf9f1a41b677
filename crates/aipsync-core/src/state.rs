//! Runtime bookkeeping for the units of a run.
//!
//! Workers from the shared pool write into a unit's state while the unit's
//! own task reads it, so counters are atomics and part statuses sit behind a
//! per-unit mutex. Parts refer to their unit by index into [`UnitTable`].

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::model::Unit;
use crate::tracker::CompletionTracker;

#[derive(Debug)]
pub struct UnitState {
    code:       String,
    statuses:   Mutex<Vec<bool>>,
    completed:  AtomicUsize,
    sync_count: AtomicU32,
    tracker:    CompletionTracker,
}

impl UnitState {
    pub fn new(code: impl Into<String>, parts: usize) -> Self {
        Self {
            code:       code.into(),
            statuses:   Mutex::new(vec![false; parts]),
            completed:  AtomicUsize::new(0),
            sync_count: AtomicU32::new(0),
            tracker:    CompletionTracker::new(),
        }
    }

    pub fn code(&self) -> &str { &self.code }

    pub fn part_count(&self) -> usize { self.statuses().len() }

    /// Start a pass: nothing completed, nothing known to be downloaded.
    pub fn reset(&self) {
        self.statuses().fill(false);
        self.completed.store(0, Ordering::SeqCst);
    }

    /// A part found current on disk, counted without fetching it.
    pub fn mark_present(&self, part: usize) { self.record(part, true); }

    /// Store a fetch outcome and return how many parts have completed.
    pub fn record(&self, part: usize, ok: bool) -> usize {
        if let Some(status) = self.statuses().get_mut(part) {
            *status = ok;
        }
        self.completed.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn completed(&self) -> usize { self.completed.load(Ordering::SeqCst) }

    pub fn status(&self, part: usize) -> bool { self.statuses().get(part).copied().unwrap_or(false) }

    /// Re-scan every part. When all are downloaded the unit has completed a
    /// full synchronization, and only then is that count incremented.
    pub fn confirm_complete(&self) -> bool {
        let complete = self.statuses().iter().all(|ok| *ok);
        if complete {
            self.sync_count.fetch_add(1, Ordering::SeqCst);
        }
        complete
    }

    pub fn sync_count(&self) -> u32 { self.sync_count.load(Ordering::SeqCst) }

    pub fn tracker(&self) -> &CompletionTracker { &self.tracker }

    fn statuses(&self) -> MutexGuard<'_, Vec<bool>> {
        self.statuses.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// States of every unit in catalog order, plus run-wide counters.
#[derive(Debug, Default)]
pub struct UnitTable {
    units:   Vec<UnitState>,
    fetched: AtomicUsize,
}

impl UnitTable {
    pub fn new(units: &[Unit]) -> Self {
        Self {
            units:   units
                .iter()
                .map(|u| UnitState::new(&u.code, u.parts.len()))
                .collect(),
            fetched: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, index: usize) -> Option<&UnitState> { self.units.get(index) }

    pub fn len(&self) -> usize { self.units.len() }

    pub fn is_empty(&self) -> bool { self.units.is_empty() }

    pub(crate) fn record_fetch(&self) { self.fetched.fetch_add(1, Ordering::SeqCst); }

    /// Fetch attempts made by the worker pool during this run.
    pub fn fetched(&self) -> usize { self.fetched.load(Ordering::SeqCst) }
}
