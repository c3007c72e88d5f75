//! Core scheduler service implementation

use super::error::{SchedulerError, SchedulerResult};
use crate::error::AppError;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Named repeated jobs on top of a [`JobScheduler`]
pub struct SchedulerService {
    scheduler: JobScheduler,

    /// Job name -> scheduler id
    jobs: Arc<DashMap<String, Uuid>>,

    running: bool,
}

impl SchedulerService {
    pub async fn new() -> SchedulerResult<Self> {
        info!("Initializing scheduler service");

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::StartupFailed(e.to_string()))?;

        Ok(Self {
            scheduler,
            jobs: Arc::new(DashMap::new()),
            running: false,
        })
    }

    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.running {
            warn!("Scheduler is already running");
            return Ok(());
        }

        self.scheduler
            .start()
            .await
            .map_err(|e| SchedulerError::StartupFailed(e.to_string()))?;
        self.running = true;

        info!(jobs = self.jobs.len(), "Scheduler service started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> SchedulerResult<()> {
        if !self.running {
            warn!("Scheduler is not running");
            return Ok(());
        }

        self.scheduler
            .shutdown()
            .await
            .map_err(|e| SchedulerError::ShutdownFailed(e.to_string()))?;
        self.running = false;

        info!("Scheduler service shut down");
        Ok(())
    }

    /// Run `task` every `every`, logging each outcome.
    ///
    /// The task's `Ok` value is a short summary for the log line.
    pub async fn add_repeated<F, Fut>(
        &self,
        name: &str,
        every: Duration,
        task: F,
    ) -> SchedulerResult<Uuid>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, AppError>> + Send + 'static,
    {
        self.add_repeated_until(name, every, task, |_| false).await
    }

    /// Like [`add_repeated`](Self::add_repeated), but an error for which
    /// `retire` holds removes the job for good.
    pub async fn add_repeated_until<F, Fut, P>(
        &self,
        name: &str,
        every: Duration,
        task: F,
        retire: P,
    ) -> SchedulerResult<Uuid>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, AppError>> + Send + 'static,
        P: Fn(&AppError) -> bool + Send + Sync + 'static,
    {
        if every.is_zero() {
            return Err(SchedulerError::ConfigurationError(format!(
                "Job '{}' needs a non-zero interval",
                name
            )));
        }
        if self.jobs.contains_key(name) {
            return Err(SchedulerError::JobAlreadyExists(name.to_string()));
        }

        let job_name = name.to_string();
        let task = Arc::new(task);
        let retire = Arc::new(retire);
        let jobs = self.jobs.clone();
        let job = Job::new_repeated_async(every, move |job_id, scheduler| {
            let task = task.clone();
            let retire = retire.clone();
            let jobs = jobs.clone();
            let job_name = job_name.clone();
            Box::pin(async move {
                debug!(job_name = %job_name, "Executing scheduled job");
                let started = Instant::now();

                match task().await {
                    Ok(summary) => info!(
                        job_name = %job_name,
                        duration_ms = started.elapsed().as_millis() as u64,
                        summary = %summary,
                        "Job executed successfully"
                    ),
                    Err(e) if retire(&e) => {
                        error!(
                            job_name = %job_name,
                            error = %e,
                            "Job failed permanently, removing it"
                        );
                        jobs.remove(&job_name);
                        if let Err(e) = scheduler.remove(&job_id).await {
                            error!(job_name = %job_name, error = %e, "Failed to remove job");
                        }
                    }
                    Err(e) => error!(
                        job_name = %job_name,
                        duration_ms = started.elapsed().as_millis() as u64,
                        error = %e,
                        "Job execution failed"
                    ),
                }
            })
        })
        .map_err(|e| SchedulerError::JobCreationFailed(e.to_string()))?;

        let job_id = self
            .scheduler
            .add(job)
            .await
            .map_err(|e| SchedulerError::JobCreationFailed(e.to_string()))?;
        self.jobs.insert(name.to_string(), job_id);

        info!(
            job_id = %job_id,
            job_name = name,
            every_secs = every.as_secs(),
            "Job added"
        );
        Ok(job_id)
    }
}
