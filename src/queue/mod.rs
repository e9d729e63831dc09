//! 点击事件队列
//!
//! 至少一次投递：任务被 reserve 后进入 active 集合，只有 `ack` 才会真正移除。
//! 失败的任务按退避策略延迟重投，重试次数用尽或数据无法解析时进入死信队列。

mod backoff;
mod memory;
mod redis;

pub use backoff::{BackoffPolicy, calculate_backoff};
pub use memory::MemoryClickQueue;
pub use redis::RedisClickQueue;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::analytics::{ClickEvent, QueuedJob};
use crate::config::{StaticConfig, StoreBackend};
use crate::errors::Result;

/// 已被 worker 领取的任务
///
/// `raw` 保存队列中的原始字节，ack / fail 时按原值从 active 中移除。
#[derive(Debug, Clone)]
pub struct ReservedJob {
    pub job: QueuedJob,
    pub raw: String,
}

/// `fail` 的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    Retrying { attempt: u32, delay_ms: u64 },
    DeadLettered,
}

/// 各状态的任务数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub waiting: usize,
    pub active: usize,
    pub delayed: usize,
    pub failed: usize,
}

#[async_trait]
pub trait ClickQueue: Send + Sync {
    /// 入队，返回 job id
    async fn enqueue(&self, event: ClickEvent) -> Result<String> {
        let job = QueuedJob::new(event);
        let id = job.id.clone();
        self.push(job).await?;
        Ok(id)
    }

    /// 写入一个已构造好的任务信封
    async fn push(&self, job: QueuedJob) -> Result<()>;

    /// 领取一个任务，最长等待 `timeout`
    ///
    /// 无法解析的任务直接进入死信队列，不会返回给调用方。
    async fn reserve(&self, timeout: Duration) -> Result<Option<ReservedJob>>;

    /// 确认完成
    async fn ack(&self, job: &ReservedJob) -> Result<()>;

    /// 报告失败
    ///
    /// `retryable = false` 时直接进入死信队列。
    async fn fail(&self, job: &ReservedJob, reason: &str, retryable: bool) -> Result<FailOutcome>;

    /// 把到期的延迟任务移回等待队列，返回移动数量
    async fn promote_due(&self) -> Result<usize>;

    /// 把 active 中遗留的任务移回等待队列（上一个进程崩溃后调用）
    async fn recover_stalled(&self) -> Result<usize>;

    async fn counts(&self) -> Result<QueueCounts>;

    fn name(&self) -> &str;
}

/// 根据配置创建队列
pub async fn create_queue(config: &StaticConfig) -> Result<Arc<dyn ClickQueue>> {
    let policy = config.queue.backoff();
    match config.queue.backend {
        StoreBackend::Redis => {
            let queue = RedisClickQueue::connect(
                &config.redis.url,
                &config.redis.key_prefix,
                &config.queue.name,
                policy,
                Duration::from_millis(config.queue.poll_interval_ms),
            )
            .await?;
            Ok(Arc::new(queue))
        }
        StoreBackend::Memory => Ok(Arc::new(MemoryClickQueue::new(&config.queue.name, policy))),
    }
}

/// 解析队列中的原始任务
pub(crate) fn decode_job(raw: &str) -> Result<QueuedJob> {
    serde_json::from_str(raw).map_err(|e| {
        crate::errors::ClickflowError::invalid_job(format!("Undecodable job payload: {}", e))
    })
}

/// 失败后的新信封：尝试次数 +1，记录错误原因
pub(crate) fn next_attempt(job: &QueuedJob, reason: &str) -> QueuedJob {
    let mut next = job.clone();
    next.attempts = job.attempts.saturating_add(1);
    next.last_error = Some(reason.to_string());
    next
}
