use super::job::Job;
use crate::ids::JobId;
use crate::result::RestResponse;
use crate::runtime_config::RuntimeConfig;
use dashmap::DashMap;
use futures::future::BoxFuture;
use once_cell::sync::OnceCell;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Storage for in-flight and finished jobs.
pub trait JobStore: Send + Sync {
    /// Track `work` under a fresh id. The work keeps running to completion
    /// whether or not anyone polls the returned handle.
    fn register_job(&self, work: BoxFuture<'static, RestResponse>) -> Job;

    fn get_job(&self, id: JobId) -> Option<Job>;
}

struct JobEntry {
    job: Job,
    finished_at: Arc<OnceCell<Instant>>,
}

/// Process-local job store.
///
/// Entries are not durable; a finished job stays retrievable for the
/// retention window and is removed by [`InMemoryJobStore::sweep`].
pub struct InMemoryJobStore {
    jobs: DashMap<JobId, JobEntry>,
    retention: Duration,
}

/// One hour.
pub const DEFAULT_JOB_RETENTION: Duration = Duration::from_secs(3600);

/// Shortest sweep period; `tokio::time::interval` rejects zero.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new(DEFAULT_JOB_RETENTION)
    }
}

impl InMemoryJobStore {
    #[must_use]
    pub fn new(retention: Duration) -> Self {
        Self {
            jobs: DashMap::new(),
            retention,
        }
    }

    #[must_use]
    pub fn from_config(config: &RuntimeConfig) -> Self {
        Self::new(config.job_retention())
    }

    #[must_use]
    pub fn retention(&self) -> Duration {
        self.retention
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Remove jobs that finished more than the retention window ago.
    ///
    /// Returns the number of removed entries.
    pub fn sweep(&self) -> usize {
        let before = self.jobs.len();
        let retention = self.retention;
        self.jobs.retain(|_, entry| match entry.finished_at.get() {
            Some(at) => at.elapsed() < retention,
            None => true,
        });
        let removed = before.saturating_sub(self.jobs.len());
        if removed > 0 {
            debug!(removed, remaining = self.jobs.len(), "Swept finished jobs");
        }
        removed
    }

    /// Run [`InMemoryJobStore::sweep`] every `interval` until `shutdown` fires.
    ///
    /// Intervals shorter than [`MIN_SWEEP_INTERVAL`] are raised to it.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        if interval < MIN_SWEEP_INTERVAL {
            warn!(
                requested_ms = interval.as_millis() as u64,
                min_ms = MIN_SWEEP_INTERVAL.as_millis() as u64,
                "Job sweep interval too short, using minimum"
            );
        }
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(
                interval_ms = interval.as_millis() as u64,
                retention_secs = store.retention.as_secs(),
                "Job sweeper started"
            );
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        store.sweep();
                    }
                }
            }
            info!("Job sweeper stopped");
        })
    }
}

impl JobStore for InMemoryJobStore {
    fn register_job(&self, work: BoxFuture<'static, RestResponse>) -> Job {
        let job = Job::new(JobId::new(), work);
        let finished_at = Arc::new(OnceCell::new());
        let driver = job.driver();
        let mark = Arc::clone(&finished_at);
        let id = job.id();
        tokio::spawn(async move {
            let response = driver.await;
            let _ = mark.set(Instant::now());
            debug!(job_id = %id, outcome = ?response.result().kind(), "Job finished");
        });
        self.jobs.insert(
            job.id(),
            JobEntry {
                job: job.clone(),
                finished_at,
            },
        );
        info!(job_id = %job.id(), active_jobs = self.jobs.len(), "Job registered");
        job
    }

    fn get_job(&self, id: JobId) -> Option<Job> {
        self.jobs.get(&id).map(|entry| entry.job.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::RestResult;
    use futures::future::FutureExt;

    #[tokio::test]
    async fn test_register_and_lookup() {
        let store = InMemoryJobStore::default();
        let job = store.register_job(async { RestResult::ok(5_i64).erase().to_response() }.boxed());
        let found = store.get_job(job.id()).unwrap();
        let response = found.wait().await;
        assert_eq!(response.result().value_as::<i64>(), Some(&5));
        assert!(store.get_job(JobId::new()).is_none());
    }

    #[tokio::test]
    async fn test_sweep_removes_only_finished_jobs() {
        let store = InMemoryJobStore::new(Duration::ZERO);
        let done = store.register_job(async { RestResult::ok(1_i64).erase().to_response() }.boxed());
        let running = store.register_job(futures::future::pending().boxed());
        done.wait().await;
        // let the driver task record completion
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(store.sweep(), 1);
        assert!(store.get_job(done.id()).is_none());
        assert!(store.get_job(running.id()).is_some());
    }

    #[tokio::test]
    async fn test_sweeper_stops_on_shutdown() {
        let store = Arc::new(InMemoryJobStore::new(Duration::ZERO));
        let shutdown = CancellationToken::new();
        let handle = store.spawn_sweeper(Duration::from_millis(5), shutdown.clone());
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_zero_sweep_interval_still_sweeps() {
        let store = Arc::new(InMemoryJobStore::new(Duration::ZERO));
        let shutdown = CancellationToken::new();
        let handle = store.spawn_sweeper(Duration::ZERO, shutdown.clone());

        let job = store.register_job(async { RestResult::ok(1_i64).erase().to_response() }.boxed());
        job.wait().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(store.is_empty());
        assert!(!handle.is_finished());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
