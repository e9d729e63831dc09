//! HTTP 接口测试：POST /api/log、GET /api/stats/{url_id}、/health

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::{App, web};
use async_trait::async_trait;
use serde_json::{Value, json};

use clickflow::analytics::{ClickProcessor, ClickRecord, ProcessorSettings};
use clickflow::api::{ApiSettings, api_routes, health_routes};
use clickflow::dedup::MemoryDedupStore;
use clickflow::errors::{ClickflowError, Result};
use clickflow::services::enrichment::LocalEnricher;
use clickflow::storage::{ClickStore, InsertOutcome, LinkStats, MemoryClickStore};

const FIREFOX_LINUX: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

/// 所有操作都失败的存储
struct BrokenStore;

#[async_trait]
impl ClickStore for BrokenStore {
    async fn insert_click(&self, _record: ClickRecord) -> Result<InsertOutcome> {
        Err(ClickflowError::database_connection("pool timed out"))
    }

    async fn link_stats(&self, _url_id: &str) -> Result<LinkStats> {
        Err(ClickflowError::database_connection("pool timed out"))
    }

    async fn ping(&self) -> Result<()> {
        Err(ClickflowError::database_connection("pool timed out"))
    }

    fn backend_name(&self) -> &str {
        "broken"
    }
}

fn processor_for(store: Arc<dyn ClickStore>) -> Arc<ClickProcessor> {
    Arc::new(ClickProcessor::new(
        Arc::new(LocalEnricher::new(None)),
        Arc::new(MemoryDedupStore::new()),
        store,
        ProcessorSettings::default(),
    ))
}

macro_rules! app_with_store {
    ($store:expr) => {{
        let store: Arc<dyn ClickStore> = $store;
        test::init_service(
            App::new()
                .app_data(web::Data::new(processor_for(store.clone())))
                .app_data(web::Data::new(store))
                .app_data(web::Data::new(ApiSettings::default()))
                .service(health_routes())
                .service(api_routes()),
        )
        .await
    }};
}

// =============================================================================
// POST /api/log
// =============================================================================

#[actix_rt::test]
async fn test_log_click_persists_enriched_record() {
    let store = Arc::new(MemoryClickStore::new());
    let app = app_with_store!(store.clone());

    let req = TestRequest::post()
        .uri("/api/log")
        .set_json(json!({
            "url_id": "abc",
            "ip_address": "203.0.113.7",
            "user_agent": FIREFOX_LINUX,
            "referrer": "https://news.example.com/",
            "utm_source": "newsletter"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::CREATED);
    let records = store.records();
    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.url_id, "abc");
    assert!(r.is_unique);
    assert_eq!(r.attributes.browser, "Firefox");
    assert_eq!(r.attributes.os, "Linux");
    assert_eq!(r.attributes.country, "Unknown");
    assert_eq!(r.utm_source.as_deref(), Some("newsletter"));
    assert_eq!(r.referrer.as_deref(), Some("https://news.example.com/"));
}

#[actix_rt::test]
async fn test_log_click_accepts_numeric_url_id_and_header_fallbacks() {
    let store = Arc::new(MemoryClickStore::new());
    let app = app_with_store!(store.clone());

    let req = TestRequest::post()
        .uri("/api/log")
        .peer_addr("198.51.100.20:51000".parse().unwrap())
        .insert_header(("User-Agent", FIREFOX_LINUX))
        .set_json(json!({ "url_id": 42 }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::CREATED);
    let r = &store.records()[0];
    assert_eq!(r.url_id, "42");
    assert_eq!(r.ip_address.as_deref(), Some("198.51.100.20"));
    assert_eq!(r.user_agent.as_deref(), Some(FIREFOX_LINUX));
}

#[actix_rt::test]
async fn test_log_click_is_never_deduplicated() {
    let store = Arc::new(MemoryClickStore::new());
    let app = app_with_store!(store.clone());

    for _ in 0..2 {
        let req = TestRequest::post()
            .uri("/api/log")
            .set_json(json!({ "url_id": "abc", "ip_address": "203.0.113.7" }))
            .to_request();
        assert_eq!(
            test::call_service(&app, req).await.status(),
            StatusCode::CREATED
        );
    }

    assert!(store.records().iter().all(|r| r.is_unique));
    assert_eq!(store.len(), 2);
}

#[actix_rt::test]
async fn test_log_click_requires_url_id() {
    let store = Arc::new(MemoryClickStore::new());
    let app = app_with_store!(store.clone());

    let req = TestRequest::post()
        .uri("/api/log")
        .set_json(json!({ "ip_address": "203.0.113.7" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "url_id required");
    assert!(store.is_empty());
}

#[actix_rt::test]
async fn test_log_click_requires_resolvable_ip() {
    let store = Arc::new(MemoryClickStore::new());
    let app = app_with_store!(store.clone());

    let req = TestRequest::post()
        .uri("/api/log")
        .set_json(json!({ "url_id": "abc" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(store.is_empty());
}

#[actix_rt::test]
async fn test_log_click_rejects_malformed_json() {
    let store = Arc::new(MemoryClickStore::new());
    let app = app_with_store!(store.clone());

    let req = TestRequest::post()
        .uri("/api/log")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{\"url_id\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_log_click_storage_failure_returns_500() {
    let app = app_with_store!(Arc::new(BrokenStore));

    let req = TestRequest::post()
        .uri("/api/log")
        .set_json(json!({ "url_id": "abc", "ip_address": "203.0.113.7" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Failed to ingest analytics");
}

// =============================================================================
// GET /api/stats/{url_id}
// =============================================================================

#[actix_rt::test]
async fn test_stats_reflect_logged_clicks() {
    let store = Arc::new(MemoryClickStore::new());
    let app = app_with_store!(store.clone());

    for ip in ["203.0.113.7", "203.0.113.7", "203.0.113.8"] {
        let req = TestRequest::post()
            .uri("/api/log")
            .set_json(json!({ "url_id": "abc", "ip_address": ip, "user_agent": FIREFOX_LINUX }))
            .to_request();
        test::call_service(&app, req).await;
    }

    let req = TestRequest::get().uri("/api/stats/abc").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["summary"]["total_clicks"], 3);
    assert_eq!(body["summary"]["unique_visitors"], 2);
    assert!(body["timeSeries"].is_array());
    assert_eq!(body["devices"][0]["device_type"], "Desktop");
    assert_eq!(body["os"][0]["os"], "Linux");
    assert_eq!(body["geo"][0]["country"], "Unknown");
}

#[actix_rt::test]
async fn test_stats_storage_failure_returns_500() {
    let app = app_with_store!(Arc::new(BrokenStore));

    let req = TestRequest::get().uri("/api/stats/abc").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Server error retrieving stats");
}

// =============================================================================
// /health
// =============================================================================

#[actix_rt::test]
async fn test_liveness_returns_204() {
    let app = app_with_store!(Arc::new(BrokenStore));

    let req = TestRequest::get().uri("/health/live").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[actix_rt::test]
async fn test_readiness_follows_storage() {
    let app = app_with_store!(Arc::new(MemoryClickStore::new()));
    let req = TestRequest::get().uri("/health/ready").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ready");

    let app = app_with_store!(Arc::new(BrokenStore));
    let req = TestRequest::get().uri("/health/ready").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}
