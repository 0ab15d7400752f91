//! Job admission and settlement.
//!
//! The dispatcher is the narrow waist every sync pass goes through. It
//! decides whether a job may start (duplicate, capacity, circuit breaker,
//! shop lock, in that order), runs admitted jobs with a wall-clock budget,
//! and settles each one exactly once: release the lock, feed the breaker,
//! persist the run row, record the result for replay.

use super::circuit_breaker::CircuitBreakerRegistry;
use super::lock_manager::LockManager;
use super::models::{JobResult, RunningJobInfo, SyncJob, SyncJobType};
use crate::clock::Clock;
use crate::platform::PlatformCredentials;
use crate::search_index::Partition;
use crate::server::metrics;
use crate::shop_store::{ShopStore, SyncRunStatus};
use crate::sync::{SyncError, SyncExecutor, SyncOptions, SyncOutcome};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Ceiling on concurrently running jobs across all shops.
    pub max_concurrent_jobs: usize,
    /// Wall-clock budget for one job, retries included.
    pub job_timeout: Duration,
    /// How many settled results to keep for replay and status queries.
    pub history_limit: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 5,
            job_timeout: Duration::from_secs(600),
            history_limit: 200,
        }
    }
}

/// What happened to a submitted job at admission.
pub enum SubmitOutcome {
    /// The job was admitted and is now running. The receiver resolves when
    /// it settles.
    Started(watch::Receiver<Option<JobResult>>),
    /// A job with the same id is already running; the receiver yields that
    /// job's result.
    Duplicate(watch::Receiver<Option<JobResult>>),
    /// A job with the same id already settled; its recorded result is
    /// replayed as-is.
    AlreadyCompleted(JobResult),
    /// The job was refused at admission.
    Rejected(JobResult),
}

struct RunningJob {
    shop_id: String,
    job_type: SyncJobType,
    created_at: DateTime<Utc>,
    started_at: DateTime<Utc>,
    result_rx: watch::Receiver<Option<JobResult>>,
}

#[derive(Default)]
struct DispatcherState {
    running: HashMap<String, RunningJob>,
    history: HashMap<String, JobResult>,
    history_order: VecDeque<String>,
    last_result_per_shop: HashMap<String, JobResult>,
}

struct DispatcherInner {
    executor: SyncExecutor,
    shops: Arc<dyn ShopStore>,
    locks: Arc<LockManager>,
    breakers: Arc<CircuitBreakerRegistry>,
    config: DispatcherConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<DispatcherState>,
}

/// Cheaply cloneable handle; all clones share the same state.
#[derive(Clone)]
pub struct JobDispatcher {
    inner: Arc<DispatcherInner>,
}

impl JobDispatcher {
    pub fn new(
        executor: SyncExecutor,
        shops: Arc<dyn ShopStore>,
        locks: Arc<LockManager>,
        breakers: Arc<CircuitBreakerRegistry>,
        config: DispatcherConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                executor,
                shops,
                locks,
                breakers,
                config,
                clock,
                state: Mutex::new(DispatcherState::default()),
            }),
        }
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Submit a job and wait for its result. Duplicate submissions of a
    /// running job wait for the same result; rejections return immediately.
    pub async fn submit(&self, job: SyncJob) -> JobResult {
        let fallback = (job.job_id.clone(), job.shop_id.clone(), job.job_type);
        match self.begin(job) {
            SubmitOutcome::AlreadyCompleted(result) | SubmitOutcome::Rejected(result) => result,
            SubmitOutcome::Started(rx) | SubmitOutcome::Duplicate(rx) => {
                self.await_result(rx, fallback).await
            }
        }
    }

    /// Submit without waiting. The result stays observable through
    /// [`Self::result_for_job`] and the shop status APIs.
    pub fn submit_background(&self, job: SyncJob) {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let result = dispatcher.submit(job).await;
            if !result.success {
                warn!(
                    "Background job {} for shop {} failed: {:?}",
                    result.job_id, result.shop_id, result.error
                );
            }
        });
    }

    /// Run admission for a job and, if admitted, spawn it.
    ///
    /// Deduplication is by job id only: a resubmitted id attaches to the
    /// running job or replays the settled result regardless of payload.
    pub fn begin(&self, job: SyncJob) -> SubmitOutcome {
        let now = self.inner.clock.now();
        let mut state = self.inner.state.lock().unwrap();

        if let Some(running) = state.running.get(&job.job_id) {
            info!(
                "Job {} is already running for shop {}, attaching to it",
                job.job_id, running.shop_id
            );
            return SubmitOutcome::Duplicate(running.result_rx.clone());
        }
        if let Some(result) = state.history.get(&job.job_id) {
            info!("Job {} already settled, replaying its result", job.job_id);
            return SubmitOutcome::AlreadyCompleted(result.clone());
        }
        if state.running.len() >= self.inner.config.max_concurrent_jobs {
            warn!(
                "Refusing job {} for shop {}: {} jobs already running",
                job.job_id,
                job.shop_id,
                state.running.len()
            );
            metrics::record_job_rejected("capacity_exceeded");
            return SubmitOutcome::Rejected(JobResult::rejected(
                &job,
                SyncError::CapacityExceeded,
                now,
            ));
        }
        if self.inner.breakers.is_open(&job.shop_id) {
            warn!(
                "Refusing job {} for shop {}: circuit breaker is open",
                job.job_id, job.shop_id
            );
            metrics::record_job_rejected("circuit_open");
            return SubmitOutcome::Rejected(JobResult::rejected(&job, SyncError::CircuitOpen, now));
        }
        let holder_id = match self.inner.locks.acquire(&job.shop_id, job.job_type.as_str()) {
            Ok(holder_id) => holder_id,
            Err(held) => {
                info!(
                    "Refusing job {} for shop {}: locked by {}",
                    job.job_id, job.shop_id, held.holder_id
                );
                metrics::record_job_rejected("lock_held");
                return SubmitOutcome::Rejected(JobResult::rejected(
                    &job,
                    SyncError::LockHeld {
                        holder_id: held.holder_id,
                    },
                    now,
                ));
            }
        };

        let (result_tx, result_rx) = watch::channel(None);
        state.running.insert(
            job.job_id.clone(),
            RunningJob {
                shop_id: job.shop_id.clone(),
                job_type: job.job_type,
                created_at: job.created_at,
                started_at: now,
                result_rx: result_rx.clone(),
            },
        );
        metrics::set_running_jobs(state.running.len());
        drop(state);

        let run_id = match self.inner.shops.record_run_start(
            &job.job_id,
            &job.shop_id,
            job.job_type.as_str(),
            &job.triggered_by,
        ) {
            Ok(run_id) => Some(run_id),
            Err(err) => {
                error!(
                    "Failed to record run start for job {}: {:#}",
                    job.job_id, err
                );
                None
            }
        };

        metrics::record_job_started(job.job_type.as_str());
        info!(
            "Job {} started: {} for shop {} (triggered by {})",
            job.job_id,
            job.job_type.as_str(),
            job.shop_id,
            job.triggered_by
        );

        let dispatcher = self.clone();
        tokio::spawn(async move {
            dispatcher.run_job(job, holder_id, run_id, result_tx).await;
        });

        SubmitOutcome::Started(result_rx)
    }

    // =========================================================================
    // Status
    // =========================================================================

    pub fn result_for_job(&self, job_id: &str) -> Option<JobResult> {
        self.inner.state.lock().unwrap().history.get(job_id).cloned()
    }

    pub fn last_result_for_shop(&self, shop_id: &str) -> Option<JobResult> {
        self.inner
            .state
            .lock()
            .unwrap()
            .last_result_per_shop
            .get(shop_id)
            .cloned()
    }

    pub fn is_running(&self, job_id: &str) -> bool {
        self.inner.state.lock().unwrap().running.contains_key(job_id)
    }

    pub fn running_job_for_shop(&self, shop_id: &str) -> Option<RunningJobInfo> {
        let state = self.inner.state.lock().unwrap();
        state
            .running
            .iter()
            .find(|(_, job)| job.shop_id == shop_id)
            .map(|(job_id, job)| RunningJobInfo {
                job_id: job_id.clone(),
                shop_id: job.shop_id.clone(),
                job_type: job.job_type,
                created_at: job.created_at,
                started_at: job.started_at,
            })
    }

    pub fn running_jobs(&self) -> Vec<RunningJobInfo> {
        let state = self.inner.state.lock().unwrap();
        let mut jobs: Vec<RunningJobInfo> = state
            .running
            .iter()
            .map(|(job_id, job)| RunningJobInfo {
                job_id: job_id.clone(),
                shop_id: job.shop_id.clone(),
                job_type: job.job_type,
                created_at: job.created_at,
                started_at: job.started_at,
            })
            .collect();
        jobs.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        jobs
    }

    pub fn running_count(&self) -> usize {
        self.inner.state.lock().unwrap().running.len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.config.max_concurrent_jobs
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn run_job(
        &self,
        job: SyncJob,
        holder_id: String,
        run_id: Option<i64>,
        result_tx: watch::Sender<Option<JobResult>>,
    ) {
        let started = std::time::Instant::now();
        let mut operations_log = vec![
            "circuit-breaker-check".to_string(),
            "lock-acquired".to_string(),
        ];

        let execution = tokio::select! {
            result = self.execute_job(&job) => result,
            _ = tokio::time::sleep(self.inner.config.job_timeout) => {
                warn!(
                    "Job {} for shop {} hit the {}s timeout",
                    job.job_id,
                    job.shop_id,
                    self.inner.config.job_timeout.as_secs()
                );
                Err(SyncError::Timeout)
            }
        };

        let (success, error, outcome) = match execution {
            Ok(outcome) => {
                operations_log.extend(outcome.operations.iter().cloned());
                if outcome.is_fully_successful() {
                    (true, None, Some(outcome))
                } else {
                    let failed = outcome
                        .partitions_attempted
                        .saturating_sub(outcome.partitions_succeeded);
                    let error = if failed > 0 {
                        SyncError::PartitionsFailed {
                            failed,
                            attempted: outcome.partitions_attempted,
                        }
                    } else {
                        SyncError::Internal(
                            outcome
                                .errors
                                .first()
                                .cloned()
                                .unwrap_or_else(|| "sync pass left errors behind".to_string()),
                        )
                    };
                    (false, Some(error), Some(outcome))
                }
            }
            Err(error) => (false, Some(error), None),
        };

        match self.inner.locks.release(&job.shop_id, &holder_id) {
            Ok(()) => operations_log.push("lock-released".to_string()),
            Err(_) => warn!(
                "Lock for shop {} was no longer owned by job {} at settlement",
                job.shop_id, job.job_id
            ),
        }

        self.inner.breakers.record_outcome(&job.shop_id, success);

        let execution_time_ms = started.elapsed().as_millis() as u64;
        let result = JobResult {
            job_id: job.job_id.clone(),
            shop_id: job.shop_id.clone(),
            job_type: job.job_type,
            success,
            execution_time_ms,
            operations_log,
            error: error.clone(),
            lock_acquired: true,
            lock_holder_id: Some(holder_id),
            outcome,
            finished_at: self.inner.clock.now(),
        };

        if let Some(run_id) = run_id {
            let status = if success {
                SyncRunStatus::Completed
            } else if matches!(error, Some(SyncError::Timeout)) {
                SyncRunStatus::TimedOut
            } else {
                SyncRunStatus::Failed
            };
            let error_message = error.as_ref().map(|e| e.to_string());
            if let Err(err) = self.inner.shops.record_run_finish(run_id, status, error_message) {
                error!(
                    "Failed to record run finish for job {}: {:#}",
                    job.job_id, err
                );
            }
        }

        metrics::record_job_completed(job.job_type.as_str(), success, started.elapsed().as_secs_f64());

        if success {
            info!(
                "Job {} for shop {} completed in {}ms",
                job.job_id, job.shop_id, execution_time_ms
            );
        } else {
            warn!(
                "Job {} for shop {} failed in {}ms: {:?}",
                job.job_id, job.shop_id, execution_time_ms, result.error
            );
        }

        let mut state = self.inner.state.lock().unwrap();
        state.running.remove(&job.job_id);
        state.history.insert(job.job_id.clone(), result.clone());
        state.history_order.push_back(job.job_id.clone());
        while state.history_order.len() > self.inner.config.history_limit {
            if let Some(evicted) = state.history_order.pop_front() {
                state.history.remove(&evicted);
            }
        }
        state
            .last_result_per_shop
            .insert(job.shop_id.clone(), result.clone());
        metrics::set_running_jobs(state.running.len());
        drop(state);

        let _ = result_tx.send(Some(result));
    }

    async fn execute_job(&self, job: &SyncJob) -> Result<SyncOutcome, SyncError> {
        match job.job_type {
            SyncJobType::IndexTeardown => self.inner.executor.teardown_index(&job.shop_id).await,
            SyncJobType::HealthCheck => {
                let credentials = self.credentials_for(&job.shop_id)?;
                self.inner
                    .executor
                    .health_check(&job.shop_id, &credentials)
                    .await
            }
            SyncJobType::FullSync => {
                let credentials = self.credentials_for(&job.shop_id)?;
                let options = SyncOptions::full().with_max_retries(job.retry_budget());
                self.inner
                    .executor
                    .execute(&job.shop_id, &credentials, &options)
                    .await
            }
            SyncJobType::CleanupResync => {
                let credentials = self.credentials_for(&job.shop_id)?;
                let options = SyncOptions::cleanup().with_max_retries(job.retry_budget());
                self.inner
                    .executor
                    .execute(&job.shop_id, &credentials, &options)
                    .await
            }
            SyncJobType::IncrementalSync => {
                let credentials = self.credentials_for(&job.shop_id)?;
                let partitions = job
                    .target_partitions
                    .clone()
                    .unwrap_or_else(|| Partition::ALL.to_vec());
                let options =
                    SyncOptions::incremental(partitions).with_max_retries(job.retry_budget());
                self.inner
                    .executor
                    .execute(&job.shop_id, &credentials, &options)
                    .await
            }
        }
    }

    fn credentials_for(&self, shop_id: &str) -> Result<PlatformCredentials, SyncError> {
        let shop = self
            .inner
            .shops
            .get_shop(shop_id)
            .map_err(|err| SyncError::Internal(format!("failed to load shop: {err:#}")))?
            .ok_or(SyncError::ShopNotFound)?;
        Ok(PlatformCredentials {
            shop_domain: shop.domain,
            access_token: shop.access_token,
        })
    }

    async fn await_result(
        &self,
        mut rx: watch::Receiver<Option<JobResult>>,
        fallback: (String, String, SyncJobType),
    ) -> JobResult {
        loop {
            if let Some(result) = rx.borrow().clone() {
                return result;
            }
            if rx.changed().await.is_err() {
                let (job_id, shop_id, job_type) = fallback;
                error!("Job {} result channel closed before settlement", job_id);
                return JobResult {
                    job_id,
                    shop_id,
                    job_type,
                    success: false,
                    execution_time_ms: 0,
                    operations_log: Vec::new(),
                    error: Some(SyncError::Internal(
                        "job task ended without reporting a result".to_string(),
                    )),
                    lock_acquired: false,
                    lock_holder_id: None,
                    outcome: None,
                    finished_at: self.inner.clock.now(),
                };
            }
        }
    }
}
