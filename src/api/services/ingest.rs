//! 同步写入接口 POST /api/log
//!
//! 直接富化并写入，不经过队列和去重窗口，记录总是 unique。
//! 需要去重语义的调用方必须走队列。

use std::sync::Arc;

use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error};

use super::ApiSettings;
use crate::analytics::{ClickEvent, ClickProcessor};
use crate::utils::ip::extract_client_ip;

#[derive(Debug, Default, Deserialize)]
pub struct IngestRequest {
    #[serde(default)]
    pub url_id: Option<Value>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub referrer: Option<String>,
    #[serde(default)]
    pub utm_source: Option<String>,
    #[serde(default)]
    pub utm_medium: Option<String>,
    #[serde(default)]
    pub utm_campaign: Option<String>,
}

impl IngestRequest {
    /// url_id 可以是字符串或整数
    fn url_id(&self) -> Option<String> {
        match self.url_id.as_ref()? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn bad_request(message: &str) -> HttpResponse {
    HttpResponse::BadRequest().json(json!({ "error": message }))
}

pub struct IngestService;

impl IngestService {
    pub async fn log_click(
        req: HttpRequest,
        body: web::Bytes,
        processor: web::Data<Arc<ClickProcessor>>,
        settings: web::Data<ApiSettings>,
    ) -> impl Responder {
        let payload: IngestRequest = if body.is_empty() {
            IngestRequest::default()
        } else {
            match serde_json::from_slice(&body) {
                Ok(p) => p,
                Err(e) => {
                    debug!("Rejected ingest body: {}", e);
                    return bad_request("Invalid request body");
                }
            }
        };

        let Some(url_id) = payload.url_id() else {
            return bad_request("url_id required");
        };

        let ip_address = non_empty(payload.ip_address)
            .or_else(|| extract_client_ip(&req, &settings.trusted_proxies));
        let Some(ip_address) = ip_address else {
            return bad_request("ip_address required");
        };

        let user_agent = non_empty(payload.user_agent).or_else(|| {
            req.headers()
                .get(header::USER_AGENT)
                .and_then(|h| h.to_str().ok())
                .map(String::from)
        });

        let mut event = ClickEvent::new(url_id, ip_address).with_utm(
            non_empty(payload.utm_source),
            non_empty(payload.utm_medium),
            non_empty(payload.utm_campaign),
        );
        event.user_agent = user_agent;
        event.referrer = non_empty(payload.referrer);

        match processor.ingest_direct(&event).await {
            Ok(_) => HttpResponse::Created().finish(),
            Err(e) => {
                error!("Analytics ingest failed for url_id={}: {}", event.url_id, e);
                HttpResponse::InternalServerError()
                    .json(json!({ "error": "Failed to ingest analytics" }))
            }
        }
    }
}
