//! Push merged artifacts to a mirror after a successful run.

use std::path::PathBuf;

use aipsync_fetch::Uploader;
use tracing::{info, warn};

use crate::cycle::CycleLayout;
use crate::model::PublicationCycle;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub uploaded: usize,
    pub failed:   Vec<(PathBuf, String)>,
}

/// Upload every artifact recorded on the cycle's units, keeping its path
/// relative to the local root. Failures are collected, not propagated.
pub async fn publish<U: Uploader>(
    uploader: &U,
    cycle: &PublicationCycle,
    layout: &CycleLayout,
) -> PublishReport {
    let mut report = PublishReport::default();

    for artifact in cycle.units.iter().flat_map(|u| &u.artifacts) {
        let local = artifact.path();
        let Some(remote) = layout.relative(&local) else {
            warn!(path = %local.display(), "artifact outside the local root, not published");
            report
                .failed
                .push((local.clone(), "outside the local root".to_string()));
            continue;
        };

        match uploader.upload(&local, remote).await {
            Ok(()) => report.uploaded += 1,
            Err(e) => {
                warn!(path = %local.display(), error = %e, "upload failed");
                report.failed.push((local.clone(), e.to_string()));
            }
        }
    }

    info!(uploaded = report.uploaded, failed = report.failed.len(), "publish finished");
    report
}
