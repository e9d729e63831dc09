//! Server mode
//!
//! HTTP ingest, per-link stats and health probes. actix-web handles
//! SIGINT/SIGTERM itself and stops accepting connections gracefully.

use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, middleware::DefaultHeaders, web};
use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::api::{ApiSettings, api_routes, health_routes};
use crate::config::StaticConfig;
use crate::runtime::lifetime::{self, shutdown};
use crate::storage::ClickStore;

pub async fn run_server(config: StaticConfig) -> Result<()> {
    let ctx = lifetime::prepare_startup(config).await?;
    let processor = lifetime::startup::prepare_ingest(&ctx);
    let store: Arc<dyn ClickStore> = ctx.store.clone();

    let api_settings = ApiSettings {
        trusted_proxies: ctx.config.server.trusted_proxies.clone(),
    };
    if api_settings.trusted_proxies.is_empty() {
        warn!(
            "Client IP: auto-detect mode. Connections from private IPs will use X-Forwarded-For. \
             Configure server.trusted_proxies explicitly to restrict this."
        );
    }

    let bind_address = format!("{}:{}", ctx.config.server.host, ctx.config.server.port);
    info!("Starting HTTP server at http://{}", bind_address);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(processor.clone()))
            .app_data(web::Data::new(store.clone()))
            .app_data(web::Data::new(api_settings.clone()))
            .app_data(web::PayloadConfig::new(64 * 1024))
            .wrap(DefaultHeaders::new().add(("Cache-Control", "no-store")))
            .service(health_routes())
            .service(api_routes())
    })
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_millis(5000))
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?;

    server.run().await.context("HTTP server error")?;

    shutdown::close_resources(&ctx.store).await;
    Ok(())
}
