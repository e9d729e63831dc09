//! 单个点击任务的处理流程
//!
//! Received → Enriching → DedupChecked → Persisted → Acknowledged
//!
//! 富化与去重都在唯一一次写入之前完成，不会产生部分写入。
//! 本模块不做重试，失败直接返回给队列处理。

use std::sync::Arc;
use std::time::Duration;

use strum::{AsRefStr, Display};
use tracing::{debug, trace};

use super::{ClickEvent, ClickRecord, QueuedJob};
use crate::config::StaticConfig;
use crate::dedup::DedupStore;
use crate::errors::{ClickflowError, Result};
use crate::services::enrichment::Enricher;
use crate::storage::{ClickStore, InsertOutcome};

/// 任务状态（仅用于日志）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
pub enum JobState {
    Received,
    Enriching,
    DedupChecked,
    Persisted,
    Acknowledged,
    Failed,
}

#[derive(Debug, Clone, Copy)]
pub struct ProcessorSettings {
    pub dedup_ttl: Duration,
    /// 以 job id 作为幂等键写入
    pub idempotent_writes: bool,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            dedup_ttl: Duration::from_secs(10),
            idempotent_writes: false,
        }
    }
}

impl From<&StaticConfig> for ProcessorSettings {
    fn from(config: &StaticConfig) -> Self {
        Self {
            dedup_ttl: config.dedup.ttl(),
            idempotent_writes: config.worker.idempotent_writes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub is_unique: bool,
    pub insert: InsertOutcome,
}

pub struct ClickProcessor {
    enricher: Arc<dyn Enricher>,
    dedup: Arc<dyn DedupStore>,
    store: Arc<dyn ClickStore>,
    settings: ProcessorSettings,
}

impl ClickProcessor {
    pub fn new(
        enricher: Arc<dyn Enricher>,
        dedup: Arc<dyn DedupStore>,
        store: Arc<dyn ClickStore>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            enricher,
            dedup,
            store,
            settings,
        }
    }

    /// 处理一个队列任务
    pub async fn process(&self, job: &QueuedJob) -> Result<ProcessOutcome> {
        let event = &job.payload;
        trace!(job_id = %job.id, state = %JobState::Received, attempt = job.attempt());

        validate_event(event)?;

        trace!(job_id = %job.id, state = %JobState::Enriching);
        let attributes = self
            .enricher
            .enrich(Some(&event.ip_address), event.user_agent.as_deref());

        let key = event.dedup_key();
        let is_unique = self
            .dedup
            .is_first_seen(&key, &job.id, self.settings.dedup_ttl)
            .await?;
        trace!(job_id = %job.id, state = %JobState::DedupChecked, is_unique);

        let mut record = ClickRecord::from_event(event, attributes, is_unique);
        if self.settings.idempotent_writes {
            record = record.with_idempotency_key(&job.id);
        }

        let insert = self.store.insert_click(record).await?;
        trace!(job_id = %job.id, state = %JobState::Persisted, ?insert);

        debug!(
            "Click processed: url_id={}, is_unique={}, job={}",
            event.url_id, is_unique, job.id
        );
        Ok(ProcessOutcome { is_unique, insert })
    }

    /// 同步写入：跳过队列与去重窗口，记录总是 unique
    pub async fn ingest_direct(&self, event: &ClickEvent) -> Result<InsertOutcome> {
        validate_event(event)?;
        let attributes = self
            .enricher
            .enrich(Some(&event.ip_address), event.user_agent.as_deref());
        let record = ClickRecord::from_event(event, attributes, true);
        self.store.insert_click(record).await
    }

    pub fn store(&self) -> &Arc<dyn ClickStore> {
        &self.store
    }
}

fn validate_event(event: &ClickEvent) -> Result<()> {
    if event.url_id.trim().is_empty() {
        return Err(ClickflowError::invalid_job("url_id required"));
    }
    if event.ip_address.trim().is_empty() {
        return Err(ClickflowError::invalid_job("ip_address required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::MemoryDedupStore;
    use crate::services::enrichment::FixedEnricher;
    use crate::storage::MemoryClickStore;

    fn processor(store: Arc<MemoryClickStore>) -> ClickProcessor {
        ClickProcessor::new(
            Arc::new(FixedEnricher::unknown()),
            Arc::new(MemoryDedupStore::new()),
            store,
            ProcessorSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_empty_ip_is_rejected_before_any_write() {
        let store = Arc::new(MemoryClickStore::new());
        let job = QueuedJob::new(ClickEvent::new("abc", ""));

        let err = processor(store.clone()).process(&job).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_direct_bypasses_dedup() {
        let store = Arc::new(MemoryClickStore::new());
        let p = processor(store.clone());
        let event = ClickEvent::new("abc", "1.2.3.4");

        p.ingest_direct(&event).await.unwrap();
        p.ingest_direct(&event).await.unwrap();

        let records = store.records();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.is_unique));
    }
}
