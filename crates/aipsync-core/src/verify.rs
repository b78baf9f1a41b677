//! Decide whether a merged artifact on disk has to be rewritten.

use std::path::Path;
use std::sync::Arc;

use aipsync_codec::{DocumentCodec, DocumentWriter, PagedDocument};
use aipsync_fs::stat;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::model::ValidityWindow;

/// Outcome of comparing an artifact on disk with its rebuilt candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Missing,
    /// The file's metadata could not be read.
    Unknown,
    Stale { modified: DateTime<Utc> },
    Unreadable { reason: String },
    /// The candidate could not be rendered; keep what is on disk.
    CandidateUnrenderable { reason: String },
    PageCountMismatch { existing: usize, candidate: usize },
    SizeMismatch { existing: u64, candidate: u64 },
    UpToDate,
}

impl Verdict {
    /// Every doubt about the existing file means rewrite, except a candidate
    /// that cannot be rendered, which keeps the file.
    pub fn needs_update(&self) -> bool {
        !matches!(self, Verdict::UpToDate | Verdict::CandidateUnrenderable { .. })
    }
}

pub struct ArtifactVerifier<D> {
    codec:     Arc<D>,
    window:    ValidityWindow,
    tolerance: u64,
}

impl<D> Clone for ArtifactVerifier<D> {
    fn clone(&self) -> Self {
        Self {
            codec:     Arc::clone(&self.codec),
            window:    self.window,
            tolerance: self.tolerance,
        }
    }
}

impl<D: DocumentCodec> ArtifactVerifier<D> {
    /// `tolerance` is the smallest size difference, in bytes, that counts as
    /// a mismatch.
    pub fn new(codec: Arc<D>, window: ValidityWindow, tolerance: u64) -> Self {
        Self {
            codec,
            window,
            tolerance,
        }
    }

    pub fn check(&self, target: &Path, candidate: &mut D::Writer) -> Verdict {
        let verdict = self.compare(target, candidate);
        debug!(path = %target.display(), ?verdict, "artifact checked");
        verdict
    }

    fn compare(&self, target: &Path, candidate: &mut D::Writer) -> Verdict {
        let existing = match stat(target) {
            Ok(Some(s)) => s,
            Ok(None) => return Verdict::Missing,
            Err(e) => {
                warn!(path = %target.display(), error = %e, "artifact metadata unreadable");
                return Verdict::Unknown;
            }
        };

        if !self.window.contains(existing.modified) {
            return Verdict::Stale {
                modified: existing.modified,
            };
        }

        let pages = match self.codec.open(target) {
            Ok(doc) => doc.page_count(),
            Err(e) => {
                return Verdict::Unreadable {
                    reason: e.to_string(),
                };
            }
        };

        let size = match candidate.render_to_buffer() {
            Ok(size) => size,
            Err(e) => {
                warn!(path = %target.display(), error = %e, "candidate not renderable, keeping artifact");
                return Verdict::CandidateUnrenderable {
                    reason: e.to_string(),
                };
            }
        };

        if pages != candidate.page_count() {
            return Verdict::PageCountMismatch {
                existing:  pages,
                candidate: candidate.page_count(),
            };
        }

        if existing.len.abs_diff(size) >= self.tolerance {
            return Verdict::SizeMismatch {
                existing:  existing.len,
                candidate: size,
            };
        }
        Verdict::UpToDate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aipsync_codec::{LineCodec, LinePage, LineWriter};
    use aipsync_fs::set_modified;
    use chrono::Duration;
    use tempfile::TempDir;

    const TOLERANCE: u64 = 200;

    fn verifier() -> ArtifactVerifier<LineCodec> {
        let now = Utc::now();
        let window = ValidityWindow::new(now - Duration::days(1), Some(now + Duration::days(27)));
        ArtifactVerifier::new(Arc::new(LineCodec), window, TOLERANCE)
    }

    fn candidate(pages: &[&str]) -> LineWriter {
        let mut writer = LineCodec.writer();
        for page in pages {
            writer.add_page(LinePage::new(*page));
        }
        writer
    }

    /// An existing one-page artifact `extra` bytes larger than the candidate
    /// `["x"]`.
    fn existing_larger_by(dir: &TempDir, extra: usize) -> std::path::PathBuf {
        let path = dir.path().join("AAAA_full.txt");
        let page = format!("x{}", "y".repeat(extra));
        std::fs::write(&path, LineCodec::encode([page.as_str()])).unwrap();
        path
    }

    #[test]
    fn test_missing_needs_update() {
        let dir = TempDir::new().unwrap();
        let verdict = verifier().check(&dir.path().join("none.txt"), &mut candidate(&["x"]));
        assert_eq!(verdict, Verdict::Missing);
        assert!(verdict.needs_update());
    }

    #[test]
    fn test_identical_is_up_to_date() {
        let dir = TempDir::new().unwrap();
        let path = existing_larger_by(&dir, 0);
        let verdict = verifier().check(&path, &mut candidate(&["x"]));
        assert_eq!(verdict, Verdict::UpToDate);
        assert!(!verdict.needs_update());
    }

    #[test]
    fn test_size_tolerance_boundary() {
        let dir = TempDir::new().unwrap();

        let path = existing_larger_by(&dir, 199);
        assert_eq!(verifier().check(&path, &mut candidate(&["x"])), Verdict::UpToDate);

        let path = existing_larger_by(&dir, 200);
        assert!(matches!(
            verifier().check(&path, &mut candidate(&["x"])),
            Verdict::SizeMismatch { .. }
        ));

        let path = existing_larger_by(&dir, 201);
        assert!(verifier().check(&path, &mut candidate(&["x"])).needs_update());
    }

    #[test]
    fn test_smaller_existing_file_uses_absolute_difference() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("AAAA_full.txt");
        std::fs::write(&path, LineCodec::encode(["x"])).unwrap();

        let big = "z".repeat(250);
        let verdict = verifier().check(&path, &mut candidate(&[big.as_str()]));
        assert!(matches!(verdict, Verdict::SizeMismatch { .. }));
    }

    #[test]
    fn test_outside_window_is_stale() {
        let dir = TempDir::new().unwrap();
        let path = existing_larger_by(&dir, 0);
        let v = verifier();
        set_modified(&path, v.window.start - Duration::days(2)).unwrap();
        assert!(matches!(v.check(&path, &mut candidate(&["x"])), Verdict::Stale { .. }));
    }

    #[test]
    fn test_unreadable_existing_needs_update() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("AAAA_full.txt");
        std::fs::write(&path, "%PDF-1.5 truncated").unwrap();
        let verdict = verifier().check(&path, &mut candidate(&["x"]));
        assert!(matches!(verdict, Verdict::Unreadable { .. }));
        assert!(verdict.needs_update());
    }

    #[test]
    fn test_page_count_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = existing_larger_by(&dir, 0);
        let verdict = verifier().check(&path, &mut candidate(&["x", "y"]));
        assert_eq!(
            verdict,
            Verdict::PageCountMismatch {
                existing:  1,
                candidate: 2,
            }
        );
    }

    #[test]
    fn test_unrenderable_candidate_keeps_artifact() {
        let dir = TempDir::new().unwrap();
        let path = existing_larger_by(&dir, 0);
        let verdict = verifier().check(&path, &mut candidate(&["x\ny"]));
        assert!(matches!(verdict, Verdict::CandidateUnrenderable { .. }));
        assert!(!verdict.needs_update());
    }

    #[test]
    fn test_unrenderable_candidate_wins_over_page_count() {
        let dir = TempDir::new().unwrap();
        let path = existing_larger_by(&dir, 0);
        let before = std::fs::read(&path).unwrap();

        let verdict = verifier().check(&path, &mut candidate(&["a", "x\ny"]));
        assert!(matches!(verdict, Verdict::CandidateUnrenderable { .. }));
        assert!(!verdict.needs_update());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }
}
