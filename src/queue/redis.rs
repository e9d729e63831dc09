use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use super::{
    BackoffPolicy, ClickQueue, FailOutcome, QueueCounts, ReservedJob, decode_job, next_attempt,
};
use crate::analytics::QueuedJob;
use crate::errors::{ClickflowError, Result};

/// 每次最多提升的延迟任务数
const PROMOTE_BATCH: usize = 500;

/// 到期延迟任务 → 等待队列
const PROMOTE_SCRIPT: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, tonumber(ARGV[2]))
for _, member in ipairs(due) do
  redis.call('ZREM', KEYS[1], member)
  redis.call('LPUSH', KEYS[2], member)
end
return #due
"#;

/// active → 等待队列头部
const RECOVER_SCRIPT: &str = r#"
local moved = 0
while true do
  local item = redis.call('LMOVE', KEYS[1], KEYS[2], 'LEFT', 'RIGHT')
  if not item then break end
  moved = moved + 1
end
return moved
"#;

/// Redis 列表队列
///
/// 键布局（`{prefix}{name}:*`）：
/// - `wait`：LPUSH 入队，从右端 LMOVE 到 `active`
/// - `active`：处理中的任务，ack 时 LREM
/// - `delayed`：有序集合，score 为重投时间（毫秒）
/// - `failed`：死信
///
/// 队列持有自己的 `ConnectionManager`（去重存储另建连接）。这条多路复用连接
/// 同时承载 reserve 与在途任务的 ack / fail，阻塞式 BLMOVE 会把它们排在后面，
/// 因此 reserve 使用非阻塞 LMOVE，按 `poll_interval` 轮询。
pub struct RedisClickQueue {
    conn: ConnectionManager,
    name: String,
    policy: BackoffPolicy,
    poll_interval: Duration,
    wait_key: String,
    active_key: String,
    delayed_key: String,
    failed_key: String,
    promote_script: Script,
    recover_script: Script,
}

impl RedisClickQueue {
    pub async fn connect(
        url: &str,
        key_prefix: &str,
        name: &str,
        policy: BackoffPolicy,
        poll_interval: Duration,
    ) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            ClickflowError::config(format!("Invalid Redis URL '{}': {}", url, e))
        })?;

        let mut conn = client.get_connection_manager().await.map_err(|e| {
            error!("Failed to connect to Redis queue: {}", e);
            ClickflowError::queue_transport(format!("Redis connection failed: {}", e))
        })?;

        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        debug!("Redis queue '{}' connected: {}", name, pong);

        Ok(Self::from_connection(
            conn,
            key_prefix,
            name,
            policy,
            poll_interval,
        ))
    }

    pub fn from_connection(
        conn: ConnectionManager,
        key_prefix: &str,
        name: &str,
        policy: BackoffPolicy,
        poll_interval: Duration,
    ) -> Self {
        let base = format!("{}{}", key_prefix, name);
        Self {
            conn,
            name: name.to_string(),
            policy,
            poll_interval,
            wait_key: format!("{}:wait", base),
            active_key: format!("{}:active", base),
            delayed_key: format!("{}:delayed", base),
            failed_key: format!("{}:failed", base),
            promote_script: Script::new(PROMOTE_SCRIPT),
            recover_script: Script::new(RECOVER_SCRIPT),
        }
    }

    async fn try_reserve(&self) -> Result<Option<ReservedJob>> {
        let mut conn = self.conn.clone();
        loop {
            let raw: Option<String> = redis::cmd("LMOVE")
                .arg(&self.wait_key)
                .arg(&self.active_key)
                .arg("RIGHT")
                .arg("LEFT")
                .query_async(&mut conn)
                .await?;

            let Some(raw) = raw else {
                return Ok(None);
            };

            match decode_job(&raw) {
                Ok(job) => return Ok(Some(ReservedJob { job, raw })),
                Err(e) => {
                    warn!("Queue '{}': dead-lettering undecodable job: {}", self.name, e);
                    redis::pipe()
                        .atomic()
                        .lrem(&self.active_key, 1, &raw)
                        .ignore()
                        .lpush(&self.failed_key, &raw)
                        .ignore()
                        .query_async::<()>(&mut conn)
                        .await?;
                }
            }
        }
    }
}

#[async_trait]
impl ClickQueue for RedisClickQueue {
    async fn push(&self, job: QueuedJob) -> Result<()> {
        let raw = serde_json::to_string(&job)?;
        let mut conn = self.conn.clone();
        let _: usize = conn.lpush(&self.wait_key, raw).await?;
        Ok(())
    }

    async fn reserve(&self, timeout: Duration) -> Result<Option<ReservedJob>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(job) = self.try_reserve().await? {
                return Ok(Some(job));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn ack(&self, job: &ReservedJob) -> Result<()> {
        let mut conn = self.conn.clone();
        let removed: usize = conn.lrem(&self.active_key, 1, &job.raw).await?;
        if removed == 0 {
            warn!("Queue '{}': ack for unknown job {}", self.name, job.job.id);
        }
        Ok(())
    }

    async fn fail(&self, job: &ReservedJob, reason: &str, retryable: bool) -> Result<FailOutcome> {
        let attempt = job.job.attempt();
        let next = next_attempt(&job.job, reason);
        let raw = serde_json::to_string(&next)?;
        let mut conn = self.conn.clone();

        if retryable && self.policy.should_retry(attempt) {
            let delay_ms = self.policy.delay_ms(attempt);
            let due_at = Utc::now().timestamp_millis() + delay_ms as i64;
            redis::pipe()
                .atomic()
                .lrem(&self.active_key, 1, &job.raw)
                .ignore()
                .zadd(&self.delayed_key, &raw, due_at)
                .ignore()
                .query_async::<()>(&mut conn)
                .await?;
            Ok(FailOutcome::Retrying { attempt, delay_ms })
        } else {
            redis::pipe()
                .atomic()
                .lrem(&self.active_key, 1, &job.raw)
                .ignore()
                .lpush(&self.failed_key, &raw)
                .ignore()
                .query_async::<()>(&mut conn)
                .await?;
            Ok(FailOutcome::DeadLettered)
        }
    }

    async fn promote_due(&self) -> Result<usize> {
        let mut conn = self.conn.clone();
        let now_ms = Utc::now().timestamp_millis();
        let promoted: usize = self
            .promote_script
            .key(&self.delayed_key)
            .key(&self.wait_key)
            .arg(now_ms)
            .arg(PROMOTE_BATCH)
            .invoke_async(&mut conn)
            .await?;
        if promoted > 0 {
            debug!("Queue '{}': promoted {} delayed jobs", self.name, promoted);
        }
        Ok(promoted)
    }

    async fn recover_stalled(&self) -> Result<usize> {
        let mut conn = self.conn.clone();
        let moved: usize = self
            .recover_script
            .key(&self.active_key)
            .key(&self.wait_key)
            .invoke_async(&mut conn)
            .await?;
        Ok(moved)
    }

    async fn counts(&self) -> Result<QueueCounts> {
        let mut conn = self.conn.clone();
        let (waiting, active, delayed, failed): (usize, usize, usize, usize) = redis::pipe()
            .llen(&self.wait_key)
            .llen(&self.active_key)
            .zcard(&self.delayed_key)
            .llen(&self.failed_key)
            .query_async(&mut conn)
            .await?;
        Ok(QueueCounts {
            waiting,
            active,
            delayed,
            failed,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}
