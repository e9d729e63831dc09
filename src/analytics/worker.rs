//! 队列消费者
//!
//! 每个任务占用一个 Semaphore permit，permit 在 reserve 之前获取，
//! 因此同时被领取的任务永远不超过并发上限。

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use super::processor::{ClickProcessor, JobState};
use crate::config::StaticConfig;
use crate::errors::{ClickflowError, Result};
use crate::queue::{ClickQueue, FailOutcome, ReservedJob};
use crate::storage::InsertOutcome;

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub concurrency: usize,
    pub job_timeout: Duration,
    pub poll_timeout: Duration,
    pub promote_interval: Duration,
    pub shutdown_timeout: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            concurrency: 10,
            job_timeout: Duration::from_secs(30),
            poll_timeout: Duration::from_secs(1),
            promote_interval: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&StaticConfig> for WorkerSettings {
    fn from(config: &StaticConfig) -> Self {
        Self {
            concurrency: config.worker.concurrency.max(1),
            job_timeout: Duration::from_secs(config.worker.job_timeout_secs),
            poll_timeout: Duration::from_secs(config.queue.poll_timeout_secs),
            promote_interval: Duration::from_millis(config.queue.promote_interval_ms),
            shutdown_timeout: Duration::from_secs(config.worker.shutdown_timeout_secs),
        }
    }
}

/// 运行计数
#[derive(Debug, Default)]
pub struct WorkerStats {
    completed: AtomicU64,
    repeat_visits: AtomicU64,
    idempotent_skips: AtomicU64,
    retried: AtomicU64,
    dead_lettered: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStatsSnapshot {
    /// 已确认的任务
    pub completed: u64,
    /// 窗口内重复访问（is_unique = false）
    pub repeat_visits: u64,
    /// 幂等键已存在而跳过的写入
    pub idempotent_skips: u64,
    pub retried: u64,
    pub dead_lettered: u64,
}

impl WorkerStats {
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            repeat_visits: self.repeat_visits.load(Ordering::Relaxed),
            idempotent_skips: self.idempotent_skips.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
        }
    }
}

pub struct ClickWorker {
    queue: Arc<dyn ClickQueue>,
    processor: Arc<ClickProcessor>,
    settings: WorkerSettings,
    stats: Arc<WorkerStats>,
}

impl ClickWorker {
    pub fn new(
        queue: Arc<dyn ClickQueue>,
        processor: Arc<ClickProcessor>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            queue,
            processor,
            settings,
            stats: Arc::new(WorkerStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        self.stats.clone()
    }

    /// 消费循环，直到收到关闭信号或队列传输失败
    ///
    /// 返回前等待所有进行中的任务结束（最长 `shutdown_timeout`）。
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let concurrency = self.settings.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut last_promote: Option<Instant> = None;

        info!(
            "Click worker started on queue '{}' (concurrency={}, job_timeout={:?})",
            self.queue.name(),
            concurrency,
            self.settings.job_timeout
        );

        let result = loop {
            if *shutdown.borrow() {
                break Ok(());
            }

            let permit = tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        // sender 已释放，视为关闭
                        break Ok(());
                    }
                    continue;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(e) => break Err(ClickflowError::worker(format!("Semaphore closed: {}", e))),
                },
            };

            if last_promote.is_none_or(|at| at.elapsed() >= self.settings.promote_interval) {
                if let Err(e) = self.queue.promote_due().await {
                    break Err(e);
                }
                last_promote = Some(Instant::now());
            }

            match self.queue.reserve(self.settings.poll_timeout).await {
                Ok(Some(job)) => self.spawn_job(job, permit),
                Ok(None) => continue,
                Err(e) => break Err(e),
            }
        };

        if let Err(ref e) = result {
            error!("Click worker stopping on queue error: {}", e);
        } else {
            info!("Click worker received shutdown signal, draining in-flight jobs");
        }

        self.drain(&semaphore, concurrency).await;
        result
    }

    fn spawn_job(&self, job: ReservedJob, permit: OwnedSemaphorePermit) {
        let queue = self.queue.clone();
        let processor = self.processor.clone();
        let stats = self.stats.clone();
        let job_timeout = self.settings.job_timeout;

        tokio::spawn(async move {
            let _permit = permit;
            handle_job(queue, processor, stats, job, job_timeout).await;
        });
    }

    /// 等待所有 permit 归还
    async fn drain(&self, semaphore: &Arc<Semaphore>, concurrency: usize) {
        let in_flight = concurrency - semaphore.available_permits();
        if in_flight > 0 {
            debug!("Waiting for {} in-flight jobs", in_flight);
        }

        match tokio::time::timeout(
            self.settings.shutdown_timeout,
            semaphore.acquire_many(concurrency as u32),
        )
        .await
        {
            Ok(_) => info!("Click worker drained ({:?})", self.stats.snapshot()),
            Err(_) => warn!(
                "Click worker shutdown timed out after {:?}, {} jobs still running",
                self.settings.shutdown_timeout,
                concurrency - semaphore.available_permits()
            ),
        }
    }
}

async fn handle_job(
    queue: Arc<dyn ClickQueue>,
    processor: Arc<ClickProcessor>,
    stats: Arc<WorkerStats>,
    job: ReservedJob,
    job_timeout: Duration,
) {
    let job_id = job.job.id.clone();

    let error = match tokio::time::timeout(job_timeout, processor.process(&job.job)).await {
        Ok(Ok(outcome)) => {
            if let Err(e) = queue.ack(&job).await {
                error!("Failed to ack job {}: {}", job_id, e);
                return;
            }
            stats.completed.fetch_add(1, Ordering::Relaxed);
            if !outcome.is_unique {
                stats.repeat_visits.fetch_add(1, Ordering::Relaxed);
            }
            if outcome.insert == InsertOutcome::Duplicate {
                stats.idempotent_skips.fetch_add(1, Ordering::Relaxed);
            }
            trace!(job_id = %job_id, state = %JobState::Acknowledged);
            return;
        }
        Ok(Err(e)) => e,
        Err(_) => ClickflowError::job_timeout(format!(
            "job {} exceeded {:?}",
            job_id, job_timeout
        )),
    };

    trace!(job_id = %job_id, state = %JobState::Failed, error = %error);

    match queue
        .fail(&job, &error.format_simple(), error.is_retryable())
        .await
    {
        Ok(FailOutcome::Retrying { attempt, delay_ms }) => {
            stats.retried.fetch_add(1, Ordering::Relaxed);
            warn!(
                "Job {} failed (attempt {}): {}; retrying in {} ms",
                job_id, attempt, error, delay_ms
            );
        }
        Ok(FailOutcome::DeadLettered) => {
            stats.dead_lettered.fetch_add(1, Ordering::Relaxed);
            error!(
                "Job {} moved to dead-letter after attempt {}: {}",
                job_id,
                job.job.attempt(),
                error
            );
        }
        Err(e) => error!("Failed to report failure of job {}: {}", job_id, e),
    }
}
