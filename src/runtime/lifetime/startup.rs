use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::analytics::{ClickProcessor, ProcessorSettings};
use crate::config::StaticConfig;
use crate::dedup::{self, DedupStore, MemoryDedupStore};
use crate::queue::{self, ClickQueue};
use crate::services::enrichment::{self, Enricher};
use crate::storage::{ClickStore, SeaOrmClickStore, StorageFactory};

/// 启动后共享的依赖（显式构造、显式关闭，没有全局单例）
pub struct StartupContext {
    pub config: StaticConfig,
    pub store: Arc<SeaOrmClickStore>,
    pub enricher: Arc<dyn Enricher>,
}

/// 消费者额外需要的依赖
pub struct WorkerContext {
    pub queue: Arc<dyn ClickQueue>,
    pub processor: Arc<ClickProcessor>,
}

/// 进程级初始化：TLS provider、数据库与迁移、富化数据
pub async fn prepare_startup(config: StaticConfig) -> Result<StartupContext> {
    let start_time = Instant::now();
    debug!("Starting pre-startup processing...");

    // 多个 install_default 调用时只有第一个生效
    let _ = rustls::crypto::ring::default_provider().install_default();

    let store = StorageFactory::create(&config.database)
        .await
        .context("Failed to create click store")?;
    info!("Using storage backend: {}", store.backend_name());

    let enricher = enrichment::create_enricher(&config.enrichment);
    info!("Using enricher: {}", enricher.name());

    debug!("Pre-startup completed in {:?}", start_time.elapsed());
    Ok(StartupContext {
        config,
        store,
        enricher,
    })
}

/// 连接队列与去重存储，组装处理器
pub async fn prepare_worker(ctx: &StartupContext) -> Result<WorkerContext> {
    let dedup = dedup::create_dedup_store(&ctx.config)
        .await
        .context("Failed to create dedup store")?;
    info!(
        "Using dedup store: {} (window {}s)",
        dedup.backend_name(),
        ctx.config.dedup.ttl_secs
    );

    let queue = queue::create_queue(&ctx.config)
        .await
        .context("Failed to connect to queue")?;

    let processor = build_processor(ctx, dedup);
    Ok(WorkerContext { queue, processor })
}

/// HTTP 模式的处理器
///
/// 同步写入不经过去重窗口，因此不连接共享去重存储。
pub fn prepare_ingest(ctx: &StartupContext) -> Arc<ClickProcessor> {
    build_processor(ctx, Arc::new(MemoryDedupStore::new()))
}

fn build_processor(ctx: &StartupContext, dedup: Arc<dyn DedupStore>) -> Arc<ClickProcessor> {
    let store: Arc<dyn ClickStore> = ctx.store.clone();
    Arc::new(ClickProcessor::new(
        ctx.enricher.clone(),
        dedup,
        store,
        ProcessorSettings::from(&ctx.config),
    ))
}
