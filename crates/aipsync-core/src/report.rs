use serde::Serialize;

use crate::model::MergedArtifact;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitSummary {
    pub code:      String,
    pub passes:    u32,
    pub retries:   u32,
    /// Re-scans that found every part downloaded.
    pub syncs:     u32,
    pub artifacts: Vec<MergedArtifact>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitFailure {
    pub unit:   String,
    pub reason: String,
}

/// What a run did, unit by unit, in catalog order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub units:         Vec<UnitSummary>,
    pub failures:      Vec<UnitFailure>,
    /// Fetch attempts made by the worker pool.
    pub fetched_parts: usize,
}

impl RunReport {
    pub fn is_success(&self) -> bool { self.failures.is_empty() }

    pub fn unit(&self, code: &str) -> Option<&UnitSummary> { self.units.iter().find(|u| u.code == code) }

    pub fn failure(&self, code: &str) -> Option<&UnitFailure> {
        self.failures.iter().find(|f| f.unit == code)
    }

    pub fn written_artifacts(&self) -> usize {
        self.units
            .iter()
            .flat_map(|u| &u.artifacts)
            .filter(|a| a.written)
            .count()
    }

    pub fn retries(&self) -> u32 { self.units.iter().map(|u| u.retries).sum() }
}
