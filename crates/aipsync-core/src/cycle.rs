//! Cycle selection and the on-disk layout of a cycle.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{Result, SyncError};
use crate::model::{ArtifactKind, PublicationCycle};

/// Index of the cycle active at `now`.
///
/// The target is the latest effective date not after `now`. Among the
/// candidates carrying that date, only internally consistent ones qualify,
/// and the most recently published wins.
pub fn select_active(candidates: &[PublicationCycle], now: DateTime<Utc>) -> Result<usize> {
    let target = candidates
        .iter()
        .map(|c| c.effective_date)
        .filter(|date| *date <= now)
        .max()
        .ok_or(SyncError::NoActiveCycle(now))?;

    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.effective_date == target && c.is_valid())
        .max_by_key(|(_, c)| c.publication_date)
        .map(|(i, _)| i)
        .ok_or(SyncError::NoActiveCycle(now))
}

/// Earliest effective date strictly after the active cycle's.
pub fn next_effective_date(
    candidates: &[PublicationCycle],
    active: &PublicationCycle,
) -> Option<DateTime<Utc>> {
    candidates
        .iter()
        .map(|c| c.effective_date)
        .filter(|date| *date > active.effective_date)
        .min()
}

/// Where a cycle's files live:
///
/// ```text
/// <local root>/<country>/<YYYYMMDD>/<unit>/<part file>
/// <local root>/<country>/<YYYYMMDD>/<unit>/<unit>.html
/// <local root>/<country>/<YYYYMMDD>/<unit>/<merge>/<unit>_full.<ext>
/// <local root>/<country>/<YYYYMMDD>/<unit>/<merge>/<unit>_chart.<ext>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleLayout {
    local_root: PathBuf,
    cycle_root: PathBuf,
    merge_dir:  String,
    extension:  String,
}

impl CycleLayout {
    pub fn new(
        local_root: impl Into<PathBuf>,
        country: &str,
        effective_date: DateTime<Utc>,
        merge_dir: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        let local_root = local_root.into();
        let cycle_root = local_root
            .join(country)
            .join(effective_date.format("%Y%m%d").to_string());

        Self {
            local_root,
            cycle_root,
            merge_dir: merge_dir.into(),
            extension: extension.into(),
        }
    }

    pub fn cycle_root(&self) -> &Path { &self.cycle_root }

    pub fn unit_dir(&self, code: &str) -> PathBuf { self.cycle_root.join(code) }

    pub fn part_path(&self, code: &str, file_name: &str) -> PathBuf {
        self.unit_dir(code).join(file_name)
    }

    pub fn page_path(&self, code: &str) -> PathBuf {
        self.unit_dir(code).join(format!("{code}.html"))
    }

    pub fn merge_dir(&self, code: &str) -> PathBuf { self.unit_dir(code).join(&self.merge_dir) }

    pub fn artifact_name(&self, code: &str, kind: ArtifactKind) -> String {
        format!("{code}_{}.{}", kind.suffix(), self.extension)
    }

    pub fn artifact_path(&self, code: &str, kind: ArtifactKind) -> PathBuf {
        self.merge_dir(code).join(self.artifact_name(code, kind))
    }

    /// `path` relative to the local root, as published to mirrors.
    pub fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.local_root).ok()
    }
}
