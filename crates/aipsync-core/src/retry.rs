//! Bounded whole-unit retry.
//!
//! ```text
//! Idle -> Downloading -> AwaitingCompletion -> Verifying -> Merged -> Idle
//!              ^                 |                 |
//!              |                 v                 v
//!              +---------- RetryDownload <---------+
//! ```
//!
//! Every retry forces a re-fetch of the whole unit. Entering `RetryDownload`
//! increments the retry count; going past the ceiling fails the unit, so a
//! unit that never merges is given up after `ceiling + 1` download passes.

use tracing::warn;

use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Idle,
    Downloading { force: bool },
    AwaitingCompletion,
    Verifying,
    RetryDownload,
    Merged,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RetryController {
    unit:    String,
    phase:   SyncPhase,
    ceiling: u32,
    retries: u32,
    passes:  u32,
}

impl RetryController {
    pub fn new(unit: impl Into<String>, ceiling: u32) -> Self {
        Self {
            unit: unit.into(),
            phase: SyncPhase::Idle,
            ceiling,
            retries: 0,
            passes: 0,
        }
    }

    pub fn phase(&self) -> SyncPhase { self.phase }

    /// Whole-unit retries entered so far.
    pub fn retries(&self) -> u32 { self.retries }

    /// Download passes started so far.
    pub fn passes(&self) -> u32 { self.passes }

    /// Start a download pass and return whether it must re-fetch everything.
    pub fn begin_download(&mut self) -> bool {
        let force = match self.phase {
            SyncPhase::Idle => false,
            SyncPhase::RetryDownload => true,
            other => {
                debug_assert!(false, "download started from {other:?}");
                true
            }
        };
        self.passes += 1;
        self.phase = SyncPhase::Downloading { force };
        force
    }

    /// Every outstanding part has been queued.
    pub fn await_completion(&mut self) {
        debug_assert!(matches!(self.phase, SyncPhase::Downloading { .. }));
        self.phase = SyncPhase::AwaitingCompletion;
    }

    /// The barrier released; `complete` is the outcome of the re-scan.
    ///
    /// Returns `Ok(true)` when the unit may be merged and `Ok(false)` when
    /// another pass is due.
    pub fn parts_settled(&mut self, complete: bool) -> Result<bool> {
        debug_assert_eq!(self.phase, SyncPhase::AwaitingCompletion);
        if complete {
            self.phase = SyncPhase::Verifying;
            return Ok(true);
        }
        self.enter_retry().map(|()| false)
    }

    /// Merging failed in a way a fresh download may fix.
    pub fn merge_failed(&mut self) -> Result<()> {
        debug_assert_eq!(self.phase, SyncPhase::Verifying);
        self.enter_retry()
    }

    pub fn merged(&mut self) {
        debug_assert_eq!(self.phase, SyncPhase::Verifying);
        self.phase = SyncPhase::Merged;
    }

    /// Leave a terminal state for the next run.
    pub fn finish(&mut self) {
        if matches!(self.phase, SyncPhase::Merged) {
            self.phase = SyncPhase::Idle;
        }
    }

    fn enter_retry(&mut self) -> Result<()> {
        self.retries += 1;
        if self.retries > self.ceiling {
            self.phase = SyncPhase::Failed;
            warn!(unit = %self.unit, passes = self.passes, "retry ceiling reached");
            return Err(SyncError::RetryCeiling {
                unit:     self.unit.clone(),
                attempts: self.passes,
            });
        }
        self.phase = SyncPhase::RetryDownload;
        Ok(())
    }
}
