//! Synchronization and merge pipeline for one publication cycle.
//!
//! A run walks every unit of the active cycle through the same loop: decide
//! which parts are outstanding, hand them to the shared worker pool, wait for
//! the unit's barrier, merge the parts into artifacts and, when anything goes
//! wrong, start the unit over with a forced re-fetch until the retry ceiling
//! is reached.

pub mod config;
pub mod cycle;
pub mod dispatch;
pub mod events;
pub mod freshness;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod publish;
pub mod report;
pub mod retry;
pub mod run_state;
pub mod snapshot;
pub mod state;
pub mod tracker;
pub mod verify;

mod error;

pub use config::SyncConfig;
pub use cycle::{CycleLayout, next_effective_date, select_active};
pub use dispatch::{Dispatcher, FetchJob, WorkerPool};
pub use error::{Result, SyncError};
pub use events::{Events, SyncEvent};
pub use merge::{ArtifactCheck, MergeReconciler};
pub use model::{
    ArtifactKind, Catalog, ContentKind, MergedArtifact, Part, PublicationCycle, Unit,
    ValidityWindow,
};
pub use pipeline::{Pipeline, SyncOutcome, SyncRequest};
pub use publish::{PublishReport, publish};
pub use report::{RunReport, UnitFailure, UnitSummary};
pub use retry::{RetryController, SyncPhase};
pub use run_state::RunState;
pub use state::{UnitState, UnitTable};
pub use tracker::CompletionTracker;
pub use verify::{ArtifactVerifier, Verdict};
