use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::warn;

use super::{
    BackoffPolicy, ClickQueue, FailOutcome, QueueCounts, ReservedJob, decode_job, next_attempt,
};
use crate::analytics::QueuedJob;
use crate::errors::Result;

#[derive(Default)]
struct QueueState {
    waiting: VecDeque<String>,
    active: Vec<String>,
    delayed: Vec<(Instant, String)>,
    failed: Vec<String>,
}

impl QueueState {
    fn promote_due(&mut self, now: Instant) -> usize {
        let mut promoted = 0;
        let mut i = 0;
        while i < self.delayed.len() {
            if self.delayed[i].0 <= now {
                let (_, raw) = self.delayed.swap_remove(i);
                self.waiting.push_back(raw);
                promoted += 1;
            } else {
                i += 1;
            }
        }
        promoted
    }

    fn remove_active(&mut self, raw: &str) -> bool {
        match self.active.iter().position(|r| r == raw) {
            Some(pos) => {
                self.active.swap_remove(pos);
                true
            }
            None => false,
        }
    }
}

/// 进程内队列（单进程部署与测试使用）
///
/// 语义与 Redis 队列一致，`reserve` 会顺带提升到期的延迟任务。
pub struct MemoryClickQueue {
    name: String,
    policy: BackoffPolicy,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl MemoryClickQueue {
    pub fn new(name: &str, policy: BackoffPolicy) -> Self {
        Self {
            name: name.to_string(),
            policy,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    /// 直接写入原始字节（模拟其他生产者写入的异常数据）
    pub fn push_raw(&self, raw: impl Into<String>) {
        self.state.lock().waiting.push_back(raw.into());
        self.notify.notify_one();
    }

    /// 死信队列中可解析的任务
    pub fn dead_letters(&self) -> Vec<QueuedJob> {
        self.state
            .lock()
            .failed
            .iter()
            .filter_map(|raw| decode_job(raw).ok())
            .collect()
    }

    fn try_reserve(&self) -> Option<ReservedJob> {
        let mut state = self.state.lock();
        state.promote_due(Instant::now());

        while let Some(raw) = state.waiting.pop_front() {
            match decode_job(&raw) {
                Ok(job) => {
                    state.active.push(raw.clone());
                    return Some(ReservedJob { job, raw });
                }
                Err(e) => {
                    warn!("Queue '{}': dead-lettering undecodable job: {}", self.name, e);
                    state.failed.push(raw);
                }
            }
        }
        None
    }
}

#[async_trait]
impl ClickQueue for MemoryClickQueue {
    async fn push(&self, job: QueuedJob) -> Result<()> {
        let raw = serde_json::to_string(&job)?;
        self.push_raw(raw);
        Ok(())
    }

    async fn reserve(&self, timeout: Duration) -> Result<Option<ReservedJob>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(job) = self.try_reserve() {
                return Ok(Some(job));
            }

            // 延迟任务到期时也需要醒来
            let next_due = self.state.lock().delayed.iter().map(|(at, _)| *at).min();
            let wake_at = next_due.map_or(deadline, |due| due.min(deadline));

            if tokio::time::timeout_at(wake_at, self.notify.notified())
                .await
                .is_err()
                && Instant::now() >= deadline
            {
                return Ok(self.try_reserve());
            }
        }
    }

    async fn ack(&self, job: &ReservedJob) -> Result<()> {
        if !self.state.lock().remove_active(&job.raw) {
            warn!("Queue '{}': ack for unknown job {}", self.name, job.job.id);
        }
        Ok(())
    }

    async fn fail(&self, job: &ReservedJob, reason: &str, retryable: bool) -> Result<FailOutcome> {
        let attempt = job.job.attempt();
        let next = next_attempt(&job.job, reason);
        let raw = serde_json::to_string(&next)?;

        let mut state = self.state.lock();
        state.remove_active(&job.raw);

        if retryable && self.policy.should_retry(attempt) {
            let delay_ms = self.policy.delay_ms(attempt);
            state
                .delayed
                .push((Instant::now() + Duration::from_millis(delay_ms), raw));
            drop(state);
            self.notify.notify_one();
            Ok(FailOutcome::Retrying { attempt, delay_ms })
        } else {
            state.failed.push(raw);
            Ok(FailOutcome::DeadLettered)
        }
    }

    async fn promote_due(&self) -> Result<usize> {
        let promoted = self.state.lock().promote_due(Instant::now());
        if promoted > 0 {
            self.notify.notify_one();
        }
        Ok(promoted)
    }

    async fn recover_stalled(&self) -> Result<usize> {
        let mut state = self.state.lock();
        let stalled: Vec<String> = state.active.drain(..).collect();
        let count = stalled.len();
        for raw in stalled.into_iter().rev() {
            state.waiting.push_front(raw);
        }
        drop(state);
        if count > 0 {
            self.notify.notify_one();
        }
        Ok(count)
    }

    async fn counts(&self) -> Result<QueueCounts> {
        let state = self.state.lock();
        Ok(QueueCounts {
            waiting: state.waiting.len(),
            active: state.active.len(),
            delayed: state.delayed.len(),
            failed: state.failed.len(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::ClickEvent;

    fn queue(max_attempts: u32) -> MemoryClickQueue {
        MemoryClickQueue::new(
            "test",
            BackoffPolicy {
                max_attempts,
                base_delay_ms: 0,
                max_delay_ms: 0,
            },
        )
    }

    #[tokio::test]
    async fn test_reserve_ack_removes_job() {
        let q = queue(3);
        let id = q.enqueue(ClickEvent::new("abc", "1.2.3.4")).await.unwrap();

        let job = q.reserve(Duration::from_millis(10)).await.unwrap().unwrap();
        assert_eq!(job.job.id, id);
        assert_eq!(q.counts().await.unwrap().active, 1);

        q.ack(&job).await.unwrap();
        assert_eq!(q.counts().await.unwrap(), QueueCounts::default());
    }

    #[tokio::test]
    async fn test_reserve_times_out_on_empty_queue() {
        let q = queue(3);
        let job = q.reserve(Duration::from_millis(20)).await.unwrap();
        assert!(job.is_none());
    }

    #[tokio::test]
    async fn test_fail_retries_then_dead_letters() {
        let q = queue(2);
        let id = q.enqueue(ClickEvent::new("abc", "1.2.3.4")).await.unwrap();

        let first = q.reserve(Duration::from_millis(10)).await.unwrap().unwrap();
        let outcome = q.fail(&first, "db down", true).await.unwrap();
        assert_eq!(
            outcome,
            FailOutcome::Retrying {
                attempt: 1,
                delay_ms: 0
            }
        );

        let second = q.reserve(Duration::from_millis(10)).await.unwrap().unwrap();
        assert_eq!(second.job.id, id);
        assert_eq!(second.job.attempts, 1);
        assert_eq!(second.job.last_error.as_deref(), Some("db down"));

        let outcome = q.fail(&second, "db down", true).await.unwrap();
        assert_eq!(outcome, FailOutcome::DeadLettered);

        let dead = q.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_non_retryable_failure_dead_letters_immediately() {
        let q = queue(5);
        q.enqueue(ClickEvent::new("abc", "1.2.3.4")).await.unwrap();
        let job = q.reserve(Duration::from_millis(10)).await.unwrap().unwrap();

        let outcome = q.fail(&job, "bad payload", false).await.unwrap();
        assert_eq!(outcome, FailOutcome::DeadLettered);
        assert_eq!(q.counts().await.unwrap().failed, 1);
    }

    #[tokio::test]
    async fn test_undecodable_payload_goes_to_dead_letter() {
        let q = queue(3);
        q.push_raw("{not json");
        q.enqueue(ClickEvent::new("abc", "1.2.3.4")).await.unwrap();

        let job = q.reserve(Duration::from_millis(10)).await.unwrap().unwrap();
        assert_eq!(job.job.payload.url_id, "abc");
        assert_eq!(q.counts().await.unwrap().failed, 1);
    }

    #[tokio::test]
    async fn test_recover_stalled_requeues_active_jobs() {
        let q = queue(3);
        q.enqueue(ClickEvent::new("abc", "1.2.3.4")).await.unwrap();
        let _lost = q.reserve(Duration::from_millis(10)).await.unwrap().unwrap();

        assert_eq!(q.recover_stalled().await.unwrap(), 1);
        let counts = q.counts().await.unwrap();
        assert_eq!(counts.active, 0);
        assert_eq!(counts.waiting, 1);
    }

    #[tokio::test]
    async fn test_reserve_wakes_on_enqueue() {
        let q = std::sync::Arc::new(queue(3));
        let waiter = {
            let q = q.clone();
            tokio::spawn(async move { q.reserve(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        q.enqueue(ClickEvent::new("abc", "1.2.3.4")).await.unwrap();

        let job = waiter.await.unwrap().unwrap();
        assert!(job.is_some());
    }
}
