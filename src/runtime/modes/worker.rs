//! Worker mode
//!
//! Drains the click queue until Ctrl+C, then finishes in-flight jobs.

use anyhow::Result;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::analytics::{ClickWorker, WorkerSettings};
use crate::config::StaticConfig;
use crate::runtime::lifetime::{self, shutdown};

pub async fn run_worker(config: StaticConfig) -> Result<()> {
    config.require_shared_queue()?;
    let ctx = lifetime::prepare_startup(config).await?;
    let worker_ctx = lifetime::startup::prepare_worker(&ctx).await?;

    // 上一个进程异常退出时留在 active 中的任务
    // 多个 worker 共享队列时，只应在确认没有其他活跃 worker 时执行
    match worker_ctx.queue.recover_stalled().await {
        Ok(0) => {}
        Ok(n) => warn!("Requeued {} stalled jobs from a previous run", n),
        Err(e) => {
            shutdown::close_resources(&ctx.store).await;
            return Err(e.into());
        }
    }

    let (tx, rx) = watch::channel(false);
    tokio::spawn(shutdown::listen_for_shutdown(tx));

    let worker = ClickWorker::new(
        worker_ctx.queue.clone(),
        worker_ctx.processor.clone(),
        WorkerSettings::from(&ctx.config),
    );
    let result = worker.run(rx).await;

    info!("Worker totals: {:?}", worker.stats().snapshot());
    shutdown::close_resources(&ctx.store).await;

    result.map_err(Into::into)
}
