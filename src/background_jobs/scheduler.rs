use super::context::JobContext;
use super::job::{BackgroundJob, JobError, JobSchedule};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(60);
const RUNNING_POLL_INTERVAL: Duration = Duration::from_millis(100);
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Runs registered jobs on their schedules until the shutdown token fires.
pub struct JobScheduler {
    jobs: HashMap<String, Arc<dyn BackgroundJob>>,

    /// Next due time per job; jobs without an entry are due immediately.
    next_runs: HashMap<String, Instant>,

    running_handles: HashMap<String, JoinHandle<()>>,

    job_cancel_tokens: HashMap<String, CancellationToken>,

    shutdown_token: CancellationToken,

    job_context: JobContext,
}

impl JobScheduler {
    pub fn new(shutdown_token: CancellationToken, job_context: JobContext) -> Self {
        Self {
            jobs: HashMap::new(),
            next_runs: HashMap::new(),
            running_handles: HashMap::new(),
            job_cancel_tokens: HashMap::new(),
            shutdown_token,
            job_context,
        }
    }

    pub fn register_job(&mut self, job: Arc<dyn BackgroundJob>) {
        info!("Registering job: {} - {}", job.id(), job.description());
        self.jobs.insert(job.id().to_string(), job);
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Main scheduler loop.
    pub async fn run(&mut self) {
        info!(
            "Starting job scheduler with {} registered jobs",
            self.job_count()
        );

        loop {
            self.cleanup_completed_jobs().await;
            self.run_due_jobs();

            let sleep_duration = self.time_until_next_scheduled_job();
            debug!(
                "Scheduler sleeping for {:?} until next scheduled job",
                sleep_duration
            );

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {}
                _ = self.shutdown_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    self.shutdown().await;
                    break;
                }
            }
        }

        info!("Job scheduler stopped");
    }

    fn time_until_next_scheduled_job(&self) -> Duration {
        let now = Instant::now();
        self.jobs
            .keys()
            .map(|id| {
                let until = self
                    .next_runs
                    .get(id)
                    .map_or(Duration::ZERO, |next_run| next_run.saturating_duration_since(now));
                if self.running_handles.contains_key(id) {
                    until.max(RUNNING_POLL_INTERVAL)
                } else {
                    until
                }
            })
            .min()
            .unwrap_or(IDLE_CHECK_INTERVAL)
            .min(IDLE_CHECK_INTERVAL)
    }

    fn run_due_jobs(&mut self) {
        let now = Instant::now();
        let due: Vec<String> = self
            .jobs
            .keys()
            .filter(|id| !self.running_handles.contains_key(*id))
            .filter(|id| self.next_runs.get(*id).map_or(true, |next| *next <= now))
            .cloned()
            .collect();
        for job_id in due {
            self.spawn_job(&job_id);
        }
    }

    fn spawn_job(&mut self, job_id: &str) {
        let Some(job) = self.jobs.get(job_id).map(Arc::clone) else {
            error!("Attempted to spawn unknown job: {}", job_id);
            return;
        };

        let JobSchedule::Interval(interval) = job.schedule();
        self.next_runs
            .insert(job_id.to_string(), Instant::now() + interval);

        info!("Starting job: {}", job.name());

        let cancel_token = self.job_context.cancellation_token.child_token();
        self.job_cancel_tokens
            .insert(job_id.to_string(), cancel_token.clone());
        let ctx = self.job_context.with_token(cancel_token);
        let job_id_owned = job_id.to_string();

        // Jobs are synchronous, so they run on the blocking pool
        let handle = tokio::spawn(async move {
            let start_time = std::time::Instant::now();
            let result = tokio::task::spawn_blocking(move || job.execute(&ctx)).await;
            let elapsed = start_time.elapsed();

            match result {
                Ok(Ok(())) => info!(
                    "Job {} completed successfully in {:?}",
                    job_id_owned, elapsed
                ),
                Ok(Err(JobError::Cancelled)) => {
                    info!("Job {} was cancelled after {:?}", job_id_owned, elapsed)
                }
                Ok(Err(e)) => error!("Job {} failed after {:?}: {}", job_id_owned, elapsed, e),
                Err(e) => error!("Job {} panicked after {:?}: {}", job_id_owned, elapsed, e),
            }
        });

        self.running_handles.insert(job_id.to_string(), handle);
    }

    async fn cleanup_completed_jobs(&mut self) {
        let completed: Vec<String> = self
            .running_handles
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(job_id, _)| job_id.clone())
            .collect();

        for job_id in completed {
            if let Some(handle) = self.running_handles.remove(&job_id) {
                let _ = handle.await;
            }
            self.job_cancel_tokens.remove(&job_id);
        }
    }

    async fn shutdown(&mut self) {
        info!("Shutting down scheduler...");

        for (job_id, handle) in self.running_handles.drain() {
            if let Some(token) = self.job_cancel_tokens.get(&job_id) {
                debug!("Cancelling job: {}", job_id);
                token.cancel();
            }
            let _ = tokio::time::timeout(SHUTDOWN_GRACE, handle).await;
        }

        self.job_cancel_tokens.clear();
        info!("Scheduler shutdown complete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingJob {
        runs: Arc<AtomicUsize>,
        interval: Duration,
    }

    impl BackgroundJob for CountingJob {
        fn id(&self) -> &'static str {
            "counting"
        }

        fn name(&self) -> &'static str {
            "Counting Job"
        }

        fn description(&self) -> &'static str {
            "Counts its own runs"
        }

        fn schedule(&self) -> JobSchedule {
            JobSchedule::Interval(self.interval)
        }

        fn execute(&self, _ctx: &JobContext) -> Result<(), JobError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Spins until its context is cancelled.
    struct SpinningJob {
        cancelled: Arc<AtomicUsize>,
    }

    impl BackgroundJob for SpinningJob {
        fn id(&self) -> &'static str {
            "spinning"
        }

        fn name(&self) -> &'static str {
            "Spinning Job"
        }

        fn description(&self) -> &'static str {
            "Runs until cancelled"
        }

        fn schedule(&self) -> JobSchedule {
            JobSchedule::Interval(Duration::from_secs(3600))
        }

        fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
            while !ctx.is_cancelled() {
                std::thread::sleep(Duration::from_millis(10));
            }
            self.cancelled.fetch_add(1, Ordering::SeqCst);
            Err(JobError::Cancelled)
        }
    }

    fn scheduler(shutdown: CancellationToken) -> JobScheduler {
        let ctx = JobContext::new(shutdown.clone(), std::env::temp_dir());
        JobScheduler::new(shutdown, ctx)
    }

    #[test]
    fn test_register_job() {
        let mut scheduler = scheduler(CancellationToken::new());
        assert_eq!(scheduler.job_count(), 0);
        scheduler.register_job(Arc::new(CountingJob {
            runs: Arc::new(AtomicUsize::new(0)),
            interval: Duration::from_secs(3600),
        }));
        assert_eq!(scheduler.job_count(), 1);
    }

    #[tokio::test]
    async fn test_runs_on_startup_and_on_interval() {
        let shutdown = CancellationToken::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = scheduler(shutdown.clone());
        scheduler.register_job(Arc::new(CountingJob {
            runs: runs.clone(),
            interval: Duration::from_millis(50),
        }));

        let handle = tokio::spawn(async move { scheduler.run().await });
        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert!(runs.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_long_interval_runs_once() {
        let shutdown = CancellationToken::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let mut scheduler = scheduler(shutdown.clone());
        scheduler.register_job(Arc::new(CountingJob {
            runs: runs.clone(),
            interval: Duration::from_secs(3600),
        }));

        let handle = tokio::spawn(async move { scheduler.run().await });
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.cancel();
        handle.await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_running_jobs() {
        let shutdown = CancellationToken::new();
        let cancelled = Arc::new(AtomicUsize::new(0));
        let mut scheduler = scheduler(shutdown.clone());
        scheduler.register_job(Arc::new(SpinningJob {
            cancelled: cancelled.clone(),
        }));

        let handle = tokio::spawn(async move { scheduler.run().await });
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    }
}
