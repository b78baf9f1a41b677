//! Catalog types: publication cycles, units and their ordered parts.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cycle::{next_effective_date, select_active};
use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Descriptive text, conventionally the first part of a unit.
    Text,
    #[default]
    Chart,
}

/// One fetchable document of a unit.
///
/// Parts are kept in declaration order; that order, not the file names,
/// decides page order in merged artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// Link relative to the cycle's source root, or an absolute URL.
    pub link:      String,
    pub file_name: String,
    #[serde(default)]
    pub kind:      ContentKind,
    #[serde(default)]
    pub title:     String,
}

impl Part {
    pub fn new(link: impl Into<String>, file_name: impl Into<String>, kind: ContentKind) -> Self {
        Self {
            link: link.into(),
            file_name: file_name.into(),
            kind,
            title: String::new(),
        }
    }
}

/// An archived entity, e.g. an aerodrome, with its ordered parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    pub code:           String,
    #[serde(default)]
    pub title:          String,
    /// The unit's own descriptive page, mirrored next to its parts.
    #[serde(default)]
    pub link:           Option<String>,
    #[serde(default)]
    pub parts:          Vec<Part>,
    /// Whole-unit re-synchronizations the last run needed. Bounded by the
    /// retry ceiling, since going past it fails the unit.
    #[serde(default)]
    pub download_count: u32,
    #[serde(default)]
    pub artifacts:      Vec<MergedArtifact>,
}

impl Unit {
    pub fn new(code: impl Into<String>, parts: Vec<Part>) -> Self {
        Self {
            code: code.into(),
            title: String::new(),
            link: None,
            parts,
            download_count: 0,
            artifacts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Every part.
    Full,
    /// Every part but the first.
    Chart,
}

impl ArtifactKind {
    pub fn suffix(self) -> &'static str {
        match self {
            ArtifactKind::Full => "full",
            ArtifactKind::Chart => "chart",
        }
    }
}

/// A merged output recorded on its unit, whether or not this run rewrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedArtifact {
    pub kind:      ArtifactKind,
    pub file_name: String,
    pub directory: PathBuf,
    /// Page count of the candidate; `None` when the artifact is a plain copy.
    pub pages:     Option<usize>,
    /// Whether this run wrote the file.
    pub written:   bool,
}

impl MergedArtifact {
    pub fn path(&self) -> PathBuf { self.directory.join(&self.file_name) }
}

/// Half-open interval `[start, end)` during which a cycle's files are current.
///
/// Without a known next cycle the window never closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityWindow {
    pub start: DateTime<Utc>,
    pub end:   Option<DateTime<Utc>>,
}

impl ValidityWindow {
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>) -> Self { Self { start, end } }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && self.end.is_none_or(|end| t < end)
    }
}

fn valid() -> bool { true }

/// One dated edition of the upstream publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationCycle {
    pub effective_date:       DateTime<Utc>,
    #[serde(default)]
    pub next_effective_date:  Option<DateTime<Utc>>,
    pub publication_date:     DateTime<Utc>,
    pub source_root:          String,
    #[serde(default = "valid")]
    pub effective_date_valid: bool,
    #[serde(default = "valid")]
    pub source_url_valid:     bool,
    #[serde(default)]
    pub process_date:         Option<DateTime<Utc>>,
    #[serde(default)]
    pub units:                Vec<Unit>,
}

impl PublicationCycle {
    pub fn new(
        effective_date: DateTime<Utc>,
        publication_date: DateTime<Utc>,
        source_root: impl Into<String>,
    ) -> Self {
        Self {
            effective_date,
            next_effective_date: None,
            publication_date,
            source_root: source_root.into(),
            effective_date_valid: true,
            source_url_valid: true,
            process_date: None,
            units: Vec::new(),
        }
    }

    pub fn window(&self) -> ValidityWindow {
        ValidityWindow::new(self.effective_date, self.next_effective_date)
    }

    pub fn is_valid(&self) -> bool { self.effective_date_valid && self.source_url_valid }

    pub fn unit(&self, code: &str) -> Option<&Unit> { self.units.iter().find(|u| u.code == code) }
}

/// What the extraction step hands over: candidate cycles and the units of
/// the current edition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    pub cycles: Vec<PublicationCycle>,
    #[serde(default)]
    pub units:  Vec<Unit>,
}

impl Catalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let catalog_err = |reason: String| SyncError::Catalog {
            path: path.to_path_buf(),
            reason,
        };

        let bytes = aipsync_fs::atomic_read(path).map_err(|e| catalog_err(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| catalog_err(e.to_string()))
    }

    /// Select the cycle active at `now` and attach the catalog's units to it.
    ///
    /// Sets the next effective date and the process date, the only fields
    /// that change after selection.
    pub fn activate(self, now: DateTime<Utc>) -> Result<PublicationCycle> {
        let index = select_active(&self.cycles, now)?;
        let next = next_effective_date(&self.cycles, &self.cycles[index]);
        let mut cycles = self.cycles;
        let mut cycle = cycles.swap_remove(index);

        if next.is_none() {
            warn!(
                effective = %cycle.effective_date.date_naive(),
                "no later cycle announced, files stay current indefinitely"
            );
        }
        cycle.next_effective_date = next;
        cycle.process_date = Some(now);
        cycle.units = self.units;

        info!(
            effective = %cycle.effective_date.date_naive(),
            published = %cycle.publication_date.date_naive(),
            units = cycle.units.len(),
            "active cycle selected"
        );
        Ok(cycle)
    }
}
