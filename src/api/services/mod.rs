pub mod health;
pub mod ingest;
pub mod stats;

pub use health::{HealthService, health_routes};
pub use ingest::{IngestRequest, IngestService};
pub use stats::StatsService;

use actix_web::web;

/// HTTP 层设置
#[derive(Debug, Clone, Default)]
pub struct ApiSettings {
    /// 可信代理（IP 或 CIDR）
    pub trusted_proxies: Vec<String>,
}

/// /api 路由配置
pub fn api_routes() -> actix_web::Scope {
    web::scope("/api")
        .route("/log", web::post().to(IngestService::log_click))
        .route("/stats/{url_id}", web::get().to(StatsService::link_stats))
}
