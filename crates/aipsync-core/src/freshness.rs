//! Decide what needs fetching.
//!
//! Two checks run independently. The unit directory's timestamp gates a
//! wholesale re-fetch, then each part file is judged on its own timestamp.
//! The unit page is judged on its timestamp and size.

use std::path::Path;

use aipsync_fs::{ensure_dir, stat, touch};
use tracing::{debug, warn};

use crate::cycle::CycleLayout;
use crate::error::{Result, SyncError};
use crate::model::{Unit, ValidityWindow};
use crate::state::UnitState;

/// Indices of the parts of `unit` that must be fetched.
///
/// Parts found current are marked downloaded on `state` without any I/O
/// beyond the stat. When the whole unit is outstanding, its directory is
/// created and its timestamp reset to now. A stat failure other than
/// not-found ends the unit.
pub fn outstanding_parts(
    unit: &Unit,
    state: &UnitState,
    layout: &CycleLayout,
    window: &ValidityWindow,
    force: bool,
) -> Result<Vec<usize>> {
    let code = unit.code.as_str();
    let dir = layout.unit_dir(code);
    let dir_stat = stat(&dir).map_err(|e| SyncError::fs(code, e))?;

    let stale_dir = dir_stat.is_none_or(|s| s.modified < window.start);
    if force || stale_dir {
        debug!(unit = code, force, "every part outstanding");
        ensure_dir(&dir).map_err(|e| SyncError::fs(code, e))?;
        touch(&dir).map_err(|e| SyncError::fs(code, e))?;
        return Ok((0..unit.parts.len()).collect());
    }

    let mut outstanding = Vec::new();
    for (index, part) in unit.parts.iter().enumerate() {
        let path = layout.part_path(code, &part.file_name);
        match stat(&path).map_err(|e| SyncError::fs(code, e))? {
            Some(s) if s.modified >= window.start => state.mark_present(index),
            _ => outstanding.push(index),
        }
    }

    debug!(unit = code, outstanding = outstanding.len(), "parts checked");
    Ok(outstanding)
}

/// Whether the local copy of a unit page can be kept.
///
/// Only a file modified inside the window whose size equals the announced
/// content length is kept. Anything else, unknown length and unreadable
/// metadata included, means fetch again.
pub fn page_is_fresh(path: &Path, content_length: Option<u64>, window: &ValidityWindow) -> bool {
    match stat(path) {
        Ok(Some(s)) => window.contains(s.modified) && content_length == Some(s.len),
        Ok(None) => false,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "page not readable, fetching again");
            false
        }
    }
}
