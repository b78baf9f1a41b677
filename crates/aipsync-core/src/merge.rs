//! Combine a unit's downloaded parts into merged artifacts.

use std::path::PathBuf;
use std::sync::Arc;

use aipsync_codec::{DocumentCodec, DocumentWriter, PagedDocument};
use aipsync_fs::{copy_file, ensure_dir};
use tracing::{info, warn};

use crate::cycle::CycleLayout;
use crate::error::{Result, SyncError};
use crate::model::{ArtifactKind, MergedArtifact, Part, Unit, ValidityWindow};
use crate::verify::{ArtifactVerifier, Verdict};

/// Result of checking one artifact without touching it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactCheck {
    pub kind:    ArtifactKind,
    pub path:    PathBuf,
    pub verdict: Verdict,
}

/// Builds the chart artifact (every part but the first) and the full
/// artifact (every part), in declaration order, and writes each one only
/// when the verifier rejects what is on disk.
///
/// A unit with one part gets its part copied as the full artifact; a unit
/// without parts gets nothing.
pub struct MergeReconciler<D> {
    codec:    Arc<D>,
    verifier: ArtifactVerifier<D>,
}

impl<D> Clone for MergeReconciler<D> {
    fn clone(&self) -> Self {
        Self {
            codec:    Arc::clone(&self.codec),
            verifier: self.verifier.clone(),
        }
    }
}

impl<D: DocumentCodec> MergeReconciler<D> {
    pub fn new(codec: Arc<D>, window: ValidityWindow, tolerance: u64) -> Self {
        let verifier = ArtifactVerifier::new(Arc::clone(&codec), window, tolerance);
        Self { codec, verifier }
    }

    /// Which artifacts a unit produces and from which parts.
    pub fn plan(unit: &Unit) -> Vec<(ArtifactKind, &[Part])> {
        match unit.parts.len() {
            0 => Vec::new(),
            1 => vec![(ArtifactKind::Full, &unit.parts[..])],
            _ => vec![
                (ArtifactKind::Chart, &unit.parts[1..]),
                (ArtifactKind::Full, &unit.parts[..]),
            ],
        }
    }

    /// Bring the unit's artifacts up to date.
    ///
    /// Failing to read a part is a [`SyncError::Merge`], which sends the unit
    /// back for a full download. Failing to write an artifact is not retried.
    pub fn reconcile(&self, unit: &Unit, layout: &CycleLayout) -> Result<Vec<MergedArtifact>> {
        let code = unit.code.as_str();

        match unit.parts.as_slice() {
            [] => {
                info!(unit = code, "no parts, nothing to merge");
                Ok(Vec::new())
            }
            [only] => self.copy_single(unit, only, layout).map(|a| vec![a]),
            _ => {
                ensure_dir(layout.merge_dir(code)).map_err(|e| SyncError::fs(code, e))?;
                info!(unit = code, parts = unit.parts.len(), "merging parts");

                Self::plan(unit)
                    .into_iter()
                    .map(|(kind, parts)| self.merge(unit, kind, parts, layout))
                    .collect()
            }
        }
    }

    /// Rebuild every candidate and report the verifier's verdict, writing
    /// nothing.
    pub fn inspect(&self, unit: &Unit, layout: &CycleLayout) -> Result<Vec<ArtifactCheck>> {
        Self::plan(unit)
            .into_iter()
            .map(|(kind, parts)| {
                let path = layout.artifact_path(&unit.code, kind);
                let mut writer = self.candidate(unit, kind, parts, layout)?;
                let verdict = self.verifier.check(&path, &mut writer);
                Ok(ArtifactCheck {
                    kind,
                    path,
                    verdict,
                })
            })
            .collect()
    }

    fn copy_single(&self, unit: &Unit, part: &Part, layout: &CycleLayout) -> Result<MergedArtifact> {
        let code = unit.code.as_str();
        let source = layout.part_path(code, &part.file_name);
        let target = layout.artifact_path(code, ArtifactKind::Full);

        copy_file(&source, &target).map_err(|e| {
            warn!(unit = code, error = %e, "copy failed");
            SyncError::Merge {
                unit:     code.to_string(),
                artifact: layout.artifact_name(code, ArtifactKind::Full),
                reason:   e.to_string(),
            }
        })?;

        Ok(self.artifact(code, ArtifactKind::Full, None, true, layout))
    }

    fn merge(
        &self,
        unit: &Unit,
        kind: ArtifactKind,
        parts: &[Part],
        layout: &CycleLayout,
    ) -> Result<MergedArtifact> {
        let code = unit.code.as_str();
        let target = layout.artifact_path(code, kind);
        let mut writer = self.candidate(unit, kind, parts, layout)?;

        let verdict = self.verifier.check(&target, &mut writer);
        let written = verdict.needs_update();
        if written {
            writer.write(&target).map_err(|e| SyncError::Artifact {
                unit:   code.to_string(),
                path:   target.clone(),
                reason: e.to_string(),
            })?;
            info!(unit = code, path = %target.display(), pages = writer.page_count(), "artifact written");
        } else {
            info!(unit = code, path = %target.display(), "artifact kept");
        }

        Ok(self.artifact(code, kind, Some(writer.page_count()), written, layout))
    }

    fn candidate(
        &self,
        unit: &Unit,
        kind: ArtifactKind,
        parts: &[Part],
        layout: &CycleLayout,
    ) -> Result<D::Writer> {
        let code = unit.code.as_str();
        let merge_err = |reason: String| SyncError::Merge {
            unit: code.to_string(),
            artifact: layout.artifact_name(code, kind),
            reason,
        };

        let mut writer = self.codec.writer();
        for part in parts {
            let path = layout.part_path(code, &part.file_name);
            let doc = self
                .codec
                .open(&path)
                .map_err(|e| merge_err(e.to_string()))?;
            for page in doc.pages().map_err(|e| merge_err(e.to_string()))? {
                writer.add_page(page);
            }
        }
        Ok(writer)
    }

    fn artifact(
        &self,
        code: &str,
        kind: ArtifactKind,
        pages: Option<usize>,
        written: bool,
        layout: &CycleLayout,
    ) -> MergedArtifact {
        MergedArtifact {
            kind,
            file_name: layout.artifact_name(code, kind),
            directory: layout.merge_dir(code),
            pages,
            written,
        }
    }
}
