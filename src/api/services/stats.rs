use std::sync::Arc;

use actix_web::{HttpResponse, Responder, web};
use serde_json::json;
use tracing::{error, trace};

use crate::storage::ClickStore;

pub struct StatsService;

impl StatsService {
    /// GET /api/stats/{url_id}
    pub async fn link_stats(
        path: web::Path<String>,
        store: web::Data<Arc<dyn ClickStore>>,
    ) -> impl Responder {
        let url_id = path.into_inner();
        trace!("Stats request for url_id={}", url_id);

        match store.link_stats(&url_id).await {
            Ok(stats) => HttpResponse::Ok().json(stats),
            Err(e) => {
                error!("Stats query failed for url_id={}: {}", url_id, e);
                HttpResponse::InternalServerError()
                    .json(json!({ "error": "Server error retrieving stats" }))
            }
        }
    }
}
