use tokio::signal;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::storage::SeaOrmClickStore;

/// 等待 Ctrl+C，然后通知所有订阅者
pub async fn listen_for_shutdown(tx: watch::Sender<bool>) {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, stopping intake...");
        }
        Err(e) => {
            warn!(
                "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
                e
            );
        }
    }

    let _ = tx.send(true);
}

/// 关闭数据库连接
pub async fn close_resources(store: &SeaOrmClickStore) {
    store.close().await;
    info!("Database connection closed");
}
