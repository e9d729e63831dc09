//! 点击记录存储
//!
//! 只追加：本模块不提供更新或删除点击记录的接口。

use std::sync::Arc;

use async_trait::async_trait;

use crate::analytics::ClickRecord;
use crate::config::DatabaseConfig;
use crate::errors::Result;

pub mod backend;
pub mod memory;
pub mod models;

pub use backend::SeaOrmClickStore;
pub use memory::MemoryClickStore;
pub use models::{CountryCount, DeviceCount, LinkStats, LinkSummary, OsCount, TimeBucket};

/// 写入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// 携带幂等键且该键已存在，没有产生新记录
    Duplicate,
}

#[async_trait]
pub trait ClickStore: Send + Sync {
    /// 单次写入一条记录
    ///
    /// 记录带 `idempotency_key` 时，重复的键不会产生第二条记录。
    async fn insert_click(&self, record: ClickRecord) -> Result<InsertOutcome>;

    /// 单链接统计
    async fn link_stats(&self, url_id: &str) -> Result<LinkStats>;

    /// 健康检查
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend_name(&self) -> &str;
}

pub struct StorageFactory;

impl StorageFactory {
    /// 连接数据库并运行迁移
    pub async fn create(config: &DatabaseConfig) -> Result<Arc<SeaOrmClickStore>> {
        let backend_type = backend::infer_backend_from_url(&config.database_url)?;
        let store = SeaOrmClickStore::new(config, &backend_type).await?;
        Ok(Arc::new(store))
    }
}
