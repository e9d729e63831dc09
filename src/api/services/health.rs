use std::sync::Arc;
use std::time::{Duration, Instant};

use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use tracing::{error, trace};

use crate::storage::ClickStore;

/// 就绪检查的数据库超时
const READY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct ReadinessResponse {
    status: &'static str,
    storage: String,
    response_time_ms: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Health Service
///
/// 直接访问存储，不经过处理流程。
pub struct HealthService;

impl HealthService {
    /// 就绪检查：数据库在超时内响应才返回 200
    pub async fn readiness_check(store: web::Data<Arc<dyn ClickStore>>) -> impl Responder {
        let start_time = Instant::now();
        trace!("Received readiness check request");

        let error = match tokio::time::timeout(READY_TIMEOUT, store.ping()).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                error!("Storage readiness check failed: {}", e);
                Some(format!("database error: {}", e.message()))
            }
            Err(_) => {
                error!("Storage readiness check timeout");
                Some("timeout".to_string())
            }
        };

        let ready = error.is_none();
        let body = ReadinessResponse {
            status: if ready { "ready" } else { "unavailable" },
            storage: store.backend_name().to_string(),
            response_time_ms: start_time.elapsed().as_millis() as u32,
            error,
        };

        if ready {
            HttpResponse::Ok().json(body)
        } else {
            HttpResponse::ServiceUnavailable().json(body)
        }
    }

    // 活跃性检查，进程能响应即可
    pub async fn liveness_check() -> impl Responder {
        trace!("Received liveness check request");

        HttpResponse::NoContent().finish()
    }
}

/// Health 路由配置
pub fn health_routes() -> actix_web::Scope {
    web::scope("/health")
        .route("/ready", web::get().to(HealthService::readiness_check))
        .route("/ready", web::head().to(HealthService::readiness_check))
        .route("/live", web::get().to(HealthService::liveness_check))
        .route("/live", web::head().to(HealthService::liveness_check))
}
