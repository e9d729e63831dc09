//! 点击处理流程测试
//!
//! 覆盖富化、去重窗口、幂等写入以及失败时不写入。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use clickflow::analytics::{ClickEvent, ClickProcessor, DedupKey, ProcessorSettings, QueuedJob};
use clickflow::dedup::{DedupStore, MemoryDedupStore};
use clickflow::errors::{ClickflowError, Result};
use clickflow::services::enrichment::{
    DeviceAttributes, FixedEnricher, GeoAttributes, LocalEnricher, UNKNOWN,
};
use clickflow::storage::{InsertOutcome, MemoryClickStore};
use clickflow::utils::ManualClock;

const CHROME_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

struct Harness {
    processor: ClickProcessor,
    store: Arc<MemoryClickStore>,
    clock: Arc<ManualClock>,
}

fn harness(settings: ProcessorSettings) -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
    ));
    let dedup = Arc::new(MemoryDedupStore::with_clock(clock.clone()));
    let store = Arc::new(MemoryClickStore::new());
    let processor = ClickProcessor::new(
        Arc::new(LocalEnricher::new(None)),
        dedup,
        store.clone(),
        settings,
    );
    Harness {
        processor,
        store,
        clock,
    }
}

fn visit(url_id: &str, ip: &str) -> QueuedJob {
    QueuedJob::new(ClickEvent::new(url_id, ip).with_user_agent(CHROME_WINDOWS))
}

#[tokio::test]
async fn test_repeat_visit_inside_window_is_not_unique() {
    let h = harness(ProcessorSettings::default());

    // T, T+2s, T+15s
    let first = h.processor.process(&visit("abc", "203.0.113.7")).await.unwrap();
    h.clock.advance(chrono::Duration::seconds(2));
    let second = h.processor.process(&visit("abc", "203.0.113.7")).await.unwrap();
    h.clock.advance(chrono::Duration::seconds(13));
    let third = h.processor.process(&visit("abc", "203.0.113.7")).await.unwrap();

    assert!(first.is_unique);
    assert!(!second.is_unique);
    assert!(third.is_unique);

    let records = h.store.records();
    assert_eq!(records.len(), 3);
    assert_eq!(
        records.iter().map(|r| r.is_unique).collect::<Vec<_>>(),
        vec![true, false, true]
    );
    for r in &records {
        assert_eq!(r.attributes.browser, "Chrome");
        assert_eq!(r.attributes.os, "Windows");
        assert_eq!(r.attributes.device_class, "Desktop");
        // 没有 GeoIP 数据库
        assert_eq!(r.attributes.country, UNKNOWN);
        assert_eq!(r.attributes.city, UNKNOWN);
        assert_eq!(r.ip_address.as_deref(), Some("203.0.113.7"));
    }
}

#[tokio::test]
async fn test_same_ip_different_links_are_independent() {
    let h = harness(ProcessorSettings::default());

    let a = h.processor.process(&visit("a", "203.0.113.7")).await.unwrap();
    let b = h.processor.process(&visit("b", "203.0.113.7")).await.unwrap();

    assert!(a.is_unique);
    assert!(b.is_unique);
}

#[tokio::test]
async fn test_concurrent_distinct_keys_are_all_unique() {
    let h = Arc::new(harness(ProcessorSettings::default()));

    let mut handles = Vec::new();
    for i in 0..50 {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            h.processor
                .process(&visit("abc", &format!("198.51.100.{}", i)))
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap().is_unique);
    }

    assert_eq!(h.store.len(), 50);
}

#[tokio::test]
async fn test_concurrent_same_key_has_exactly_one_unique() {
    let h = Arc::new(harness(ProcessorSettings::default()));

    let mut handles = Vec::new();
    for _ in 0..20 {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            h.processor.process(&visit("abc", "203.0.113.7")).await
        }));
    }
    let mut unique = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_unique {
            unique += 1;
        }
    }

    assert_eq!(unique, 1);
    assert_eq!(h.store.len(), 20);
}

#[tokio::test]
async fn test_redelivery_writes_twice_without_idempotency() {
    let h = harness(ProcessorSettings::default());
    let job = visit("abc", "203.0.113.7");

    let first = h.processor.process(&job).await.unwrap();
    h.clock.advance(chrono::Duration::seconds(2));
    let redelivered = h.processor.process(&job).await.unwrap();

    // 没有幂等键时会写两行，但重投不会把首次点击改判为重复
    assert!(first.is_unique);
    assert_eq!(redelivered.insert, InsertOutcome::Inserted);
    assert!(redelivered.is_unique);
    assert_eq!(h.store.len(), 2);
    assert!(h.store.records().iter().all(|r| r.is_unique));
}

#[tokio::test]
async fn test_redelivery_does_not_steal_window_from_later_click() {
    let h = harness(ProcessorSettings::default());
    let job = visit("abc", "203.0.113.7");
    let other = visit("abc", "203.0.113.7");

    assert!(h.processor.process(&job).await.unwrap().is_unique);
    assert!(!h.processor.process(&other).await.unwrap().is_unique);
    assert!(h.processor.process(&job).await.unwrap().is_unique);
}

#[tokio::test]
async fn test_redelivery_is_skipped_with_idempotent_writes() {
    let h = harness(ProcessorSettings {
        idempotent_writes: true,
        ..Default::default()
    });
    let job = visit("abc", "203.0.113.7");

    let first = h.processor.process(&job).await.unwrap();
    let redelivered = h.processor.process(&job).await.unwrap();

    assert_eq!(first.insert, InsertOutcome::Inserted);
    assert_eq!(redelivered.insert, InsertOutcome::Duplicate);
    let records = h.store.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].idempotency_key.as_deref(), Some(job.id.as_str()));
}

#[tokio::test]
async fn test_missing_user_agent_enriches_as_unknown() {
    let h = harness(ProcessorSettings::default());

    h.processor
        .process(&QueuedJob::new(ClickEvent::new("abc", "10.0.0.1")))
        .await
        .unwrap();

    let record = &h.store.records()[0];
    assert_eq!(record.attributes.browser, UNKNOWN);
    assert_eq!(record.attributes.os, UNKNOWN);
    assert_eq!(record.attributes.device_class, UNKNOWN);
    assert_eq!(record.attributes.country, UNKNOWN);
    assert!(record.user_agent.is_none());
}

#[tokio::test]
async fn test_fixed_enricher_values_are_persisted() {
    let store = Arc::new(MemoryClickStore::new());
    let enricher = FixedEnricher::new(
        GeoAttributes {
            country: "JP".to_string(),
            city: "Tokyo".to_string(),
            region: "13".to_string(),
        },
        DeviceAttributes {
            browser: "Firefox".to_string(),
            os: "Linux".to_string(),
            device_class: "Desktop".to_string(),
        },
    );
    let processor = ClickProcessor::new(
        Arc::new(enricher),
        Arc::new(MemoryDedupStore::new()),
        store.clone(),
        ProcessorSettings::default(),
    );

    let event = ClickEvent::new("abc", "203.0.113.7")
        .with_referrer("https://example.com/")
        .with_utm(Some("news".into()), Some("email".into()), None);
    processor.process(&QueuedJob::new(event)).await.unwrap();

    let record = &store.records()[0];
    assert_eq!(record.attributes.country, "JP");
    assert_eq!(record.attributes.city, "Tokyo");
    assert_eq!(record.referrer.as_deref(), Some("https://example.com/"));
    assert_eq!(record.utm_source.as_deref(), Some("news"));
    assert!(record.utm_campaign.is_none());
}

struct FailingDedup;

#[async_trait]
impl DedupStore for FailingDedup {
    async fn is_first_seen(&self, _key: &DedupKey, _owner: &str, _ttl: Duration) -> Result<bool> {
        Err(ClickflowError::dedup_store("connection refused"))
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

#[tokio::test]
async fn test_dedup_failure_writes_nothing_and_is_retryable() {
    let store = Arc::new(MemoryClickStore::new());
    let processor = ClickProcessor::new(
        Arc::new(FixedEnricher::unknown()),
        Arc::new(FailingDedup),
        store.clone(),
        ProcessorSettings::default(),
    );

    let err = processor
        .process(&visit("abc", "203.0.113.7"))
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_store_failure_is_retryable() {
    let h = harness(ProcessorSettings::default());
    h.store.set_fail_writes(true);

    let err = h
        .processor
        .process(&visit("abc", "203.0.113.7"))
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert!(h.store.is_empty());
}

#[tokio::test]
async fn test_missing_url_id_is_not_retryable() {
    let h = harness(ProcessorSettings::default());

    let err = h
        .processor
        .process(&visit("  ", "203.0.113.7"))
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert!(h.store.is_empty());
}
