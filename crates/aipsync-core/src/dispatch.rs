//! Bounded worker pool shared by every unit of a run.

use std::path::PathBuf;
use std::sync::Arc;

use aipsync_fetch::{Fetcher, HttpClient, resolve_url};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::events::{Events, SyncEvent};
use crate::state::UnitTable;

/// One part to fetch, addressed by unit and part index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchJob {
    pub unit:        usize,
    pub part:        usize,
    pub link:        String,
    pub destination: PathBuf,
}

/// `workers` tasks draining one queue of `capacity` jobs.
///
/// Workers live until [`shutdown`](Self::shutdown). A failed fetch is
/// recorded on the part and never stops a worker.
pub struct WorkerPool {
    sender:  mpsc::Sender<FetchJob>,
    table:   Arc<UnitTable>,
    workers: JoinSet<()>,
}

/// Producer handle onto the pool's queue.
#[derive(Clone)]
pub struct Dispatcher {
    sender: mpsc::Sender<FetchJob>,
    table:  Arc<UnitTable>,
}

struct Worker<C: HttpClient> {
    id:          usize,
    jobs:        Arc<Mutex<mpsc::Receiver<FetchJob>>>,
    fetcher:     Arc<Fetcher<C>>,
    table:       Arc<UnitTable>,
    source_root: Arc<str>,
    events:      Events,
}

impl WorkerPool {
    pub fn spawn<C>(
        workers: usize,
        capacity: usize,
        fetcher: Arc<Fetcher<C>>,
        table: Arc<UnitTable>,
        source_root: &str,
        events: Events,
    ) -> Self
    where
        C: HttpClient + 'static,
    {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let jobs = Arc::new(Mutex::new(receiver));
        let source_root: Arc<str> = Arc::from(source_root);

        let mut set = JoinSet::new();
        for id in 1..=workers.max(1) {
            let worker = Worker {
                id,
                jobs: Arc::clone(&jobs),
                fetcher: Arc::clone(&fetcher),
                table: Arc::clone(&table),
                source_root: Arc::clone(&source_root),
                events: events.clone(),
            };
            set.spawn(worker.run());
        }
        debug!(workers, capacity, "worker pool started");

        Self {
            sender,
            table,
            workers: set,
        }
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher {
            sender: self.sender.clone(),
            table:  Arc::clone(&self.table),
        }
    }

    /// Close the queue and wait for the workers to drain it.
    ///
    /// Workers only stop once every [`Dispatcher`] handed out has been dropped.
    pub async fn shutdown(self) {
        let Self {
            sender,
            mut workers,
            ..
        } = self;
        drop(sender);
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "worker ended abnormally");
            }
        }
    }
}

impl Dispatcher {
    /// Queue a job, waiting while the queue is full.
    ///
    /// The unit's barrier is raised before the job becomes visible to
    /// workers, so a fast worker cannot release it early.
    pub async fn enqueue(&self, job: FetchJob) -> Result<()> {
        let unit = self
            .table
            .get(job.unit)
            .ok_or_else(|| SyncError::UnknownUnit(format!("#{}", job.unit)))?;
        unit.tracker().add(1);

        if self.sender.send(job).await.is_err() {
            unit.tracker().done();
            return Err(SyncError::PoolClosed);
        }
        Ok(())
    }
}

impl<C: HttpClient> Worker<C> {
    async fn run(self) {
        loop {
            let job = self.jobs.lock().await.recv().await;
            let Some(job) = job else { break };
            self.process(job).await;
        }
        debug!(worker = self.id, "worker stopped");
    }

    async fn process(&self, job: FetchJob) {
        let Some(unit) = self.table.get(job.unit) else {
            warn!(worker = self.id, unit = job.unit, "job for unknown unit dropped");
            return;
        };

        let outcome = match resolve_url(&self.source_root, &job.link) {
            Ok(url) => self.fetcher.fetch(&url, &job.destination).await,
            Err(e) => Err(e),
        };
        let ok = match outcome {
            Ok(bytes) => {
                debug!(worker = self.id, unit = unit.code(), part = job.part, bytes, "part fetched");
                true
            }
            Err(e) => {
                warn!(worker = self.id, unit = unit.code(), part = job.part, error = %e, "part fetch failed");
                false
            }
        };

        let done = unit.record(job.part, ok);
        self.table.record_fetch();
        info!(unit = unit.code(), "{done} / {} downloaded", unit.part_count());

        self.events.emit(SyncEvent::PartFetched {
            unit: unit.code().to_string(),
            part: job.part,
            ok,
        });
        unit.tracker().done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContentKind, Part, Unit};
    use aipsync_fetch::MockHttpClient;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_pool_records_every_outcome_once() {
        let dir = TempDir::new().unwrap();
        let client = MockHttpClient::new()
            .route("https://aip.example/c/1", "one")
            .route("https://aip.example/c/3", "three");
        let units = vec![Unit::new(
            "CCCC",
            (1..=3)
                .map(|i| Part::new(format!("c/{i}"), format!("{i}.txt"), ContentKind::Chart))
                .collect(),
        )];
        let table = Arc::new(UnitTable::new(&units));
        let fetcher = Arc::new(Fetcher::new(client));

        // Part 2 has no route and fails.
        let pool = WorkerPool::spawn(
            2,
            1,
            fetcher,
            Arc::clone(&table),
            "https://aip.example",
            Events::none(),
        );

        let dispatcher = pool.dispatcher();
        for part in 0..3 {
            dispatcher
                .enqueue(FetchJob {
                    unit: 0,
                    part,
                    link: format!("c/{}", part + 1),
                    destination: dir.path().join(format!("{}.txt", part + 1)),
                })
                .await
                .unwrap();
        }

        let unit = table.get(0).unwrap();
        unit.tracker().wait().await;
        drop(dispatcher);
        pool.shutdown().await;

        assert_eq!(unit.completed(), 3);
        assert!(unit.status(0));
        assert!(!unit.status(1));
        assert!(unit.status(2));
        assert_eq!(table.fetched(), 3);
        assert_eq!(std::fs::read(dir.path().join("3.txt")).unwrap(), b"three");
    }
}
