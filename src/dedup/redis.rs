use std::time::Duration;

use async_trait::async_trait;
use redis::Script;
use redis::aio::ConnectionManager;
use tracing::{debug, error, trace};

use super::DedupStore;
use crate::analytics::DedupKey;
use crate::errors::{ClickflowError, Result};

/// Redis 去重存储
///
/// 用一段 Lua 脚本完成检查与标记：键不存在时写入任务 ID 并设置 EX，
/// 已存在且属于同一任务时视为重投，仍判定为首次。
/// 脚本在 Redis 内原子执行，多个 worker 进程共享同一个 Redis 时同样成立。
const CLAIM_SCRIPT: &str = r#"
local cur = redis.call('GET', KEYS[1])
if not cur then
  redis.call('SET', KEYS[1], ARGV[1], 'EX', tonumber(ARGV[2]))
  return 1
end
if cur == ARGV[1] then
  return 1
end
return 0
"#;

#[derive(Clone)]
pub struct RedisDedupStore {
    conn: ConnectionManager,
    key_prefix: String,
    claim_script: Script,
}

impl RedisDedupStore {
    pub async fn connect(url: &str, key_prefix: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            ClickflowError::config(format!("Invalid Redis URL '{}': {}", url, e))
        })?;

        let mut conn = client.get_connection_manager().await.map_err(|e| {
            error!("Failed to connect to Redis for dedup: {}", e);
            ClickflowError::dedup_store(format!("Redis connection failed: {}", e))
        })?;

        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| ClickflowError::dedup_store(format!("Redis ping failed: {}", e)))?;
        debug!("Redis dedup store connected: {}", pong);

        Ok(Self::from_connection(conn, key_prefix))
    }

    pub fn from_connection(conn: ConnectionManager, key_prefix: &str) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.to_string(),
            claim_script: Script::new(CLAIM_SCRIPT),
        }
    }

    fn make_key(&self, key: &DedupKey) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl DedupStore for RedisDedupStore {
    async fn is_first_seen(&self, key: &DedupKey, owner: &str, ttl: Duration) -> Result<bool> {
        let redis_key = self.make_key(key);
        // EX 不接受 0
        let ttl_secs = ttl.as_secs().max(1);
        let mut conn = self.conn.clone();

        let reply: i32 = self
            .claim_script
            .key(&redis_key)
            .arg(owner)
            .arg(ttl_secs)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                ClickflowError::dedup_store(format!("Dedup claim failed for {}: {}", key, e))
            })?;

        let first_seen = reply == 1;
        trace!("Dedup check {}: first_seen={}", redis_key, first_seen);
        Ok(first_seen)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
