//! 时间窗口去重
//!
//! 同一 (url_id, ip_address) 在 TTL 内只有第一次点击记为 unique。
//! "检查并标记" 必须是单次原子操作，否则并发 worker 会同时判定为首次访问。

mod memory;
mod redis;

pub use memory::MemoryDedupStore;
pub use redis::RedisDedupStore;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::analytics::DedupKey;
use crate::config::{StaticConfig, StoreBackend};
use crate::errors::Result;

#[async_trait]
pub trait DedupStore: Send + Sync {
    /// 原子地 "不存在则写入并设置 TTL"
    ///
    /// 返回 `true` 表示本次写入成功（窗口内首次出现）。标记里记下 `owner`
    /// （任务 ID），同一任务重投时仍返回 `true` 且不延长窗口，
    /// 这样重试不会把第一次点击改判为重复。
    /// 存储不可用时返回错误，由调用方决定是否重试，不能当作 unique 处理。
    async fn is_first_seen(&self, key: &DedupKey, owner: &str, ttl: Duration) -> Result<bool>;

    fn backend_name(&self) -> &'static str;
}

/// 根据配置创建去重存储
pub async fn create_dedup_store(config: &StaticConfig) -> Result<Arc<dyn DedupStore>> {
    match config.dedup.backend {
        StoreBackend::Redis => {
            let store = RedisDedupStore::connect(&config.redis.url, &config.redis.key_prefix).await?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => Ok(Arc::new(MemoryDedupStore::new())),
    }
}
