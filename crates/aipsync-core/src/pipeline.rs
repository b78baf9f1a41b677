//! Drive a publication cycle through fetch, merge and retry.

use std::sync::Arc;

use aipsync_codec::DocumentCodec;
use aipsync_fetch::{Fetcher, HttpClient, resolve_url, retry_delay};
use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::cycle::CycleLayout;
use crate::dispatch::{Dispatcher, FetchJob, WorkerPool};
use crate::error::{Result, SyncError};
use crate::events::{Events, SyncEvent};
use crate::freshness::{outstanding_parts, page_is_fresh};
use crate::merge::{ArtifactCheck, MergeReconciler};
use crate::model::{Catalog, MergedArtifact, PublicationCycle, Unit, ValidityWindow};
use crate::report::{RunReport, UnitFailure, UnitSummary};
use crate::retry::RetryController;
use crate::run_state::RunState;
use crate::snapshot::write_snapshot;
use crate::state::{UnitState, UnitTable};

/// Options for [`Pipeline::sync`].
#[derive(Debug, Clone, Copy)]
pub struct SyncRequest {
    /// Run even if the stored state says the next cycle is not due yet.
    pub force:   bool,
    /// Re-fetch every part of every unit.
    pub refetch: bool,
    pub now:     DateTime<Utc>,
}

impl SyncRequest {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            force: false,
            refetch: false,
            now,
        }
    }
}

#[derive(Debug)]
pub enum SyncOutcome {
    /// Nothing to do before `next`.
    NotDue { next: Option<DateTime<Utc>> },
    Completed {
        cycle:  Box<PublicationCycle>,
        report: RunReport,
    },
}

/// The synchronization pipeline.
///
/// Owns the transport and the document codec; everything else comes from the
/// [`SyncConfig`] given at construction.
pub struct Pipeline<C: HttpClient, D: DocumentCodec> {
    config:  SyncConfig,
    fetcher: Arc<Fetcher<C>>,
    codec:   Arc<D>,
    events:  Events,
}

impl<C, D> Pipeline<C, D>
where
    C: HttpClient + 'static,
    D: DocumentCodec,
{
    pub fn new(config: SyncConfig, client: C, codec: D) -> Result<Self> {
        config.validate()?;
        let fetcher = Fetcher::with_options(client, config.fetch_options());
        Ok(Self {
            config,
            fetcher: Arc::new(fetcher),
            codec: Arc::new(codec),
            events: Events::none(),
        })
    }

    pub fn with_events(mut self, events: Events) -> Self {
        self.events = events;
        self
    }

    pub fn config(&self) -> &SyncConfig { &self.config }

    pub fn fetcher(&self) -> &Fetcher<C> { &self.fetcher }

    pub fn layout(&self, cycle: &PublicationCycle) -> CycleLayout {
        CycleLayout::new(
            &self.config.local_root,
            &self.config.country,
            cycle.effective_date,
            &self.config.merge_dir,
            self.codec.extension(),
        )
    }

    /// Select the active cycle, synchronize it and, on success, record the
    /// snapshot and the run state.
    pub async fn sync(&self, catalog: Catalog, request: SyncRequest) -> Result<SyncOutcome> {
        let state = RunState::load(&self.config.state_file)?;
        if !request.force && !state.is_due(request.now) {
            info!(next = ?state.next_effective_date, "archive is current, nothing to do");
            return Ok(SyncOutcome::NotDue {
                next: state.next_effective_date,
            });
        }

        let mut cycle = catalog.activate(request.now)?;
        let report = self.run(&mut cycle, request.refetch).await?;

        if report.is_success() {
            write_snapshot(&cycle, &self.config.snapshot_file)?;
            RunState {
                effective_date:      Some(cycle.effective_date),
                next_effective_date: cycle.next_effective_date,
                last_run:            Some(request.now),
            }
            .save(&self.config.state_file)?;
            info!(units = report.units.len(), "download and merge done");
        } else {
            error!(failed = report.failures.len(), "run finished with failed units");
        }

        Ok(SyncOutcome::Completed {
            cycle: Box::new(cycle),
            report,
        })
    }

    /// Synchronize every unit of `cycle` and record merged artifacts and
    /// synchronization counts on its units.
    ///
    /// A failing unit never stops the others; it is listed in the report.
    pub async fn run(&self, cycle: &mut PublicationCycle, refetch: bool) -> Result<RunReport> {
        let layout = Arc::new(self.layout(cycle));
        let window = cycle.window();
        let units: Arc<[Unit]> = Arc::from(cycle.units.clone());
        let table = Arc::new(UnitTable::new(&units));

        let pool = WorkerPool::spawn(
            self.config.workers,
            self.config.queue_capacity,
            Arc::clone(&self.fetcher),
            Arc::clone(&table),
            &cycle.source_root,
            self.events.clone(),
        );

        let mut tasks = JoinSet::new();
        for index in 0..units.len() {
            let task = UnitTask {
                index,
                units: Arc::clone(&units),
                table: Arc::clone(&table),
                layout: Arc::clone(&layout),
                window,
                source_root: Arc::from(cycle.source_root.as_str()),
                refetch,
                dispatcher: pool.dispatcher(),
                fetcher: Arc::clone(&self.fetcher),
                reconciler: MergeReconciler::new(
                    Arc::clone(&self.codec),
                    window,
                    self.config.size_tolerance,
                ),
                ceiling: self.config.retry_ceiling,
                backoff: self.config.retry_backoff(),
                events: self.events.clone(),
            };
            tasks.spawn(task.drive());
        }

        let mut outcomes: Vec<Option<Result<UnitSummary>>> = units.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(e) => error!(error = %e, "unit task aborted"),
            }
        }
        pool.shutdown().await;

        let mut report = RunReport {
            fetched_parts: table.fetched(),
            ..RunReport::default()
        };
        for (unit, outcome) in cycle.units.iter_mut().zip(outcomes) {
            match outcome {
                Some(Ok(summary)) => {
                    unit.download_count = summary.retries;
                    unit.artifacts = summary.artifacts.clone();
                    report.units.push(summary);
                }
                Some(Err(e)) => report.failures.push(UnitFailure {
                    unit:   unit.code.clone(),
                    reason: e.to_string(),
                }),
                None => report.failures.push(UnitFailure {
                    unit:   unit.code.clone(),
                    reason: "unit task aborted".to_string(),
                }),
            }
        }

        Ok(report)
    }

    /// Rebuild the candidates of one unit and compare them with the
    /// artifacts on disk. Nothing is fetched or written.
    pub async fn verify_unit(&self, cycle: &PublicationCycle, code: &str) -> Result<Vec<ArtifactCheck>> {
        let unit = cycle
            .unit(code)
            .cloned()
            .ok_or_else(|| SyncError::UnknownUnit(code.to_string()))?;
        let layout = self.layout(cycle);
        let reconciler = MergeReconciler::new(
            Arc::clone(&self.codec),
            cycle.window(),
            self.config.size_tolerance,
        );

        tokio::task::spawn_blocking(move || reconciler.inspect(&unit, &layout))
            .await
            .map_err(|e| SyncError::Join(e.to_string()))?
    }
}

/// One unit's trip through the retry state machine.
struct UnitTask<C: HttpClient, D> {
    index:       usize,
    units:       Arc<[Unit]>,
    table:       Arc<UnitTable>,
    layout:      Arc<CycleLayout>,
    window:      ValidityWindow,
    source_root: Arc<str>,
    refetch:     bool,
    dispatcher:  Dispatcher,
    fetcher:     Arc<Fetcher<C>>,
    reconciler:  MergeReconciler<D>,
    ceiling:     u32,
    backoff:     std::time::Duration,
    events:      Events,
}

impl<C, D> UnitTask<C, D>
where
    C: HttpClient + 'static,
    D: DocumentCodec,
{
    async fn drive(self) -> (usize, Result<UnitSummary>) {
        let outcome = self.run().await;
        let code = &self.units[self.index].code;

        match &outcome {
            Ok(summary) => self.events.emit(SyncEvent::UnitMerged {
                unit:    code.clone(),
                written: summary.artifacts.iter().filter(|a| a.written).count(),
            }),
            Err(e) => {
                error!(unit = %code, error = %e, "unit failed");
                self.events.emit(SyncEvent::UnitFailed {
                    unit:   code.clone(),
                    reason: e.to_string(),
                });
            }
        }
        (self.index, outcome)
    }

    async fn run(&self) -> Result<UnitSummary> {
        let unit = &self.units[self.index];
        let state = self
            .table
            .get(self.index)
            .ok_or_else(|| SyncError::UnknownUnit(unit.code.clone()))?;
        let mut controller = RetryController::new(&unit.code, self.ceiling);

        self.sync_page(unit).await;

        loop {
            let force = controller.begin_download() || self.refetch;
            state.reset();

            let outstanding = outstanding_parts(unit, state, &self.layout, &self.window, force)?;
            self.events.emit(SyncEvent::UnitStarted {
                unit:        unit.code.clone(),
                pass:        controller.passes(),
                parts:       unit.parts.len(),
                outstanding: outstanding.len(),
            });
            for part in outstanding {
                self.dispatcher
                    .enqueue(FetchJob {
                        unit: self.index,
                        part,
                        link: unit.parts[part].link.clone(),
                        destination: self.layout.part_path(&unit.code, &unit.parts[part].file_name),
                    })
                    .await?;
            }

            controller.await_completion();
            state.tracker().wait().await;

            let complete = state.confirm_complete();
            let reason = if controller.parts_settled(complete)? {
                info!(unit = %unit.code, "all docs downloaded confirmed");
                match self.merge().await {
                    Ok(artifacts) => {
                        controller.merged();
                        controller.finish();
                        return Ok(self.summary(unit, state, &controller, artifacts));
                    }
                    Err(e) if e.is_retryable() => {
                        warn!(unit = %unit.code, error = %e, "merge failed, downloading the unit again");
                        controller.merge_failed()?;
                        e.to_string()
                    }
                    Err(e) => return Err(e),
                }
            } else {
                warn!(unit = %unit.code, "not completed, start a new download");
                "incomplete download".to_string()
            };

            self.events.emit(SyncEvent::UnitRetry {
                unit: unit.code.clone(),
                retries: controller.retries(),
                reason,
            });
            let delay = retry_delay(controller.retries().saturating_sub(1), self.backoff);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }

    async fn merge(&self) -> Result<Vec<MergedArtifact>> {
        let reconciler = self.reconciler.clone();
        let units = Arc::clone(&self.units);
        let layout = Arc::clone(&self.layout);
        let index = self.index;

        tokio::task::spawn_blocking(move || reconciler.reconcile(&units[index], &layout))
            .await
            .map_err(|e| SyncError::Join(e.to_string()))?
    }

    /// Mirror the unit's own page. Best effort: a failure is only logged.
    async fn sync_page(&self, unit: &Unit) {
        let Some(link) = &unit.link else { return };
        let path = self.layout.page_path(&unit.code);

        let fetched = match resolve_url(&self.source_root, link) {
            Ok(url) => {
                self.fetcher
                    .fetch_if(&url, &path, |len| !page_is_fresh(&path, len, &self.window))
                    .await
            }
            Err(e) => Err(e),
        };

        match fetched {
            Ok(Some(bytes)) => info!(unit = %unit.code, bytes, "unit page downloaded"),
            Ok(None) => debug!(unit = %unit.code, "unit page current, local copy kept"),
            Err(e) => warn!(unit = %unit.code, error = %e, "unit page not downloaded"),
        }
    }

    fn summary(
        &self,
        unit: &Unit,
        state: &UnitState,
        controller: &RetryController,
        artifacts: Vec<MergedArtifact>,
    ) -> UnitSummary {
        UnitSummary {
            code: unit.code.clone(),
            passes: controller.passes(),
            retries: controller.retries(),
            syncs: state.sync_count(),
            artifacts,
        }
    }
}
