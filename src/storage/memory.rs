//! 进程内点击存储（测试使用）

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::models::{TIME_SERIES_LIMIT, TOP_COUNTRIES_LIMIT};
use super::{
    ClickStore, CountryCount, DeviceCount, InsertOutcome, LinkStats, LinkSummary, OsCount,
    TimeBucket,
};
use crate::analytics::ClickRecord;
use crate::errors::{ClickflowError, Result};

#[derive(Default)]
pub struct MemoryClickStore {
    records: RwLock<Vec<ClickRecord>>,
    fail_writes: AtomicBool,
}

impl MemoryClickStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 让后续写入全部失败（模拟数据库不可用）
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<ClickRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

/// 按数量降序、名称升序排序
fn ranked(counts: HashMap<String, i64>, limit: Option<usize>) -> Vec<(String, i64)> {
    let mut rows: Vec<(String, i64)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    rows
}

#[async_trait]
impl ClickStore for MemoryClickStore {
    async fn insert_click(&self, record: ClickRecord) -> Result<InsertOutcome> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ClickflowError::database_operation(
                "memory store configured to fail",
            ));
        }

        let mut records = self.records.write();
        if let Some(key) = record.idempotency_key.as_deref()
            && records
                .iter()
                .any(|r| r.idempotency_key.as_deref() == Some(key))
        {
            return Ok(InsertOutcome::Duplicate);
        }
        records.push(record);
        Ok(InsertOutcome::Inserted)
    }

    async fn link_stats(&self, url_id: &str) -> Result<LinkStats> {
        let records = self.records.read();
        let matching: Vec<&ClickRecord> = records.iter().filter(|r| r.url_id == url_id).collect();

        let unique_ips: HashSet<&str> = matching
            .iter()
            .filter_map(|r| r.ip_address.as_deref())
            .collect();

        let mut hours: BTreeMap<String, i64> = BTreeMap::new();
        let mut countries: HashMap<String, i64> = HashMap::new();
        let mut devices: HashMap<String, i64> = HashMap::new();
        let mut os: HashMap<String, i64> = HashMap::new();
        for r in &matching {
            *hours
                .entry(r.visited_at.format("%Y-%m-%d %H:00").to_string())
                .or_default() += 1;
            *countries.entry(r.attributes.country.clone()).or_default() += 1;
            *devices.entry(r.attributes.device_class.clone()).or_default() += 1;
            *os.entry(r.attributes.os.clone()).or_default() += 1;
        }

        Ok(LinkStats {
            summary: LinkSummary {
                total_clicks: matching.len() as i64,
                unique_visitors: unique_ips.len() as i64,
            },
            time_series: hours
                .into_iter()
                .rev()
                .take(TIME_SERIES_LIMIT)
                .map(|(time_bucket, count)| TimeBucket { time_bucket, count })
                .collect(),
            geo: ranked(countries, Some(TOP_COUNTRIES_LIMIT))
                .into_iter()
                .map(|(country, count)| CountryCount { country, count })
                .collect(),
            devices: ranked(devices, None)
                .into_iter()
                .map(|(device_type, count)| DeviceCount { device_type, count })
                .collect(),
            os: ranked(os, None)
                .into_iter()
                .map(|(os, count)| OsCount { os, count })
                .collect(),
        })
    }

    fn backend_name(&self) -> &str {
        "memory"
    }
}
