use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use super::DedupStore;
use crate::analytics::DedupKey;
use crate::errors::{ClickflowError, Result};
use crate::utils::{Clock, SystemClock};

/// 超过该条目数时顺带清理过期键
const PURGE_THRESHOLD: usize = 10_000;

/// 窗口标记：过期时间与首次写入它的任务
#[derive(Debug, Clone)]
struct Marker {
    expires_at: DateTime<Utc>,
    owner: String,
}

/// 进程内去重存储（单进程部署与测试使用）
///
/// DashMap 的 entry API 持有分片写锁，检查与写入在同一临界区内完成。
pub struct MemoryDedupStore {
    entries: DashMap<String, Marker>,
    clock: Arc<dyn Clock>,
    inserts_since_purge: AtomicUsize,
}

impl Default for MemoryDedupStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDedupStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
            inserts_since_purge: AtomicUsize::new(0),
        }
    }

    /// 当前存活（未过期）的键数量
    pub fn live_entries(&self) -> usize {
        let now = self.clock.now();
        self.entries.iter().filter(|e| e.value().expires_at > now).count()
    }

    /// 删除所有过期键，返回删除数量
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, marker| marker.expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!("Purged {} expired dedup keys", removed);
        }
        removed
    }
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    async fn is_first_seen(&self, key: &DedupKey, owner: &str, ttl: Duration) -> Result<bool> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| ClickflowError::dedup_store(format!("Invalid dedup TTL: {}", e)))?;
        let now = self.clock.now();
        let marker = Marker {
            expires_at: now + ttl,
            owner: owner.to_string(),
        };

        let mut armed = false;
        let first_seen = match self.entries.entry(key.as_str().to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().expires_at <= now {
                    entry.insert(marker);
                    armed = true;
                    true
                } else {
                    // 同一任务重投：沿用第一次的判定，不延长窗口
                    entry.get().owner == owner
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(marker);
                armed = true;
                true
            }
        };

        if armed
            && self.inserts_since_purge.fetch_add(1, Ordering::Relaxed) + 1 >= PURGE_THRESHOLD
        {
            self.inserts_since_purge.store(0, Ordering::Relaxed);
            self.purge_expired();
        }

        Ok(first_seen)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ManualClock;

    const WINDOW: Duration = Duration::from_secs(10);

    fn store_at_epoch() -> (MemoryDedupStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (MemoryDedupStore::with_clock(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_second_hit_inside_window_is_duplicate() {
        let (store, clock) = store_at_epoch();
        let key = DedupKey::new("abc", "1.2.3.4");

        assert!(store.is_first_seen(&key, "job-1", WINDOW).await.unwrap());
        clock.advance(chrono::Duration::seconds(2));
        assert!(!store.is_first_seen(&key, "job-2", WINDOW).await.unwrap());
    }

    #[tokio::test]
    async fn test_key_expires_exactly_at_ttl() {
        let (store, clock) = store_at_epoch();
        let key = DedupKey::new("abc", "1.2.3.4");

        assert!(store.is_first_seen(&key, "job-1", WINDOW).await.unwrap());
        clock.advance(chrono::Duration::milliseconds(9_999));
        assert!(!store.is_first_seen(&key, "job-2", WINDOW).await.unwrap());
        clock.advance(chrono::Duration::milliseconds(1));
        assert!(store.is_first_seen(&key, "job-3", WINDOW).await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_does_not_extend_window() {
        let (store, clock) = store_at_epoch();
        let key = DedupKey::new("abc", "1.2.3.4");

        assert!(store.is_first_seen(&key, "job-1", WINDOW).await.unwrap());
        clock.advance(chrono::Duration::seconds(8));
        assert!(!store.is_first_seen(&key, "job-2", WINDOW).await.unwrap());
        clock.advance(chrono::Duration::seconds(3));
        assert!(store.is_first_seen(&key, "job-3", WINDOW).await.unwrap());
    }

    #[tokio::test]
    async fn test_redelivered_job_keeps_first_seen_verdict() {
        let (store, clock) = store_at_epoch();
        let key = DedupKey::new("abc", "1.2.3.4");

        assert!(store.is_first_seen(&key, "job-1", WINDOW).await.unwrap());
        clock.advance(chrono::Duration::seconds(3));
        // 同一任务重投仍是 unique，别的任务是重复
        assert!(store.is_first_seen(&key, "job-1", WINDOW).await.unwrap());
        assert!(!store.is_first_seen(&key, "job-2", WINDOW).await.unwrap());

        // 重投不延长窗口
        clock.advance(chrono::Duration::seconds(7));
        assert!(store.is_first_seen(&key, "job-2", WINDOW).await.unwrap());
        assert!(!store.is_first_seen(&key, "job-1", WINDOW).await.unwrap());
    }

    #[tokio::test]
    async fn test_distinct_keys_are_independent() {
        let (store, _clock) = store_at_epoch();
        assert!(
            store
                .is_first_seen(&DedupKey::new("abc", "1.2.3.4"), "job-1", WINDOW)
                .await
                .unwrap()
        );
        assert!(
            store
                .is_first_seen(&DedupKey::new("abc", "5.6.7.8"), "job-2", WINDOW)
                .await
                .unwrap()
        );
        assert!(
            store
                .is_first_seen(&DedupKey::new("xyz", "1.2.3.4"), "job-3", WINDOW)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let (store, clock) = store_at_epoch();
        for i in 0..5 {
            let key = DedupKey::new("abc", &format!("10.0.0.{}", i));
            store.is_first_seen(&key, &format!("job-{}", i), WINDOW).await.unwrap();
        }
        assert_eq!(store.live_entries(), 5);

        clock.advance(chrono::Duration::seconds(11));
        assert_eq!(store.live_entries(), 0);
        assert_eq!(store.purge_expired(), 5);
    }
}
