//! SeaORM storage backend
//!
//! This module provides click record storage using SeaORM,
//! supporting SQLite, MySQL/MariaDB, and PostgreSQL.

mod click_store;
mod connection;
mod converters;
mod stats;

use sea_orm::{DatabaseBackend, DatabaseConnection};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::errors::{ClickflowError, Result};

pub use connection::{connect_generic, connect_sqlite, run_migrations};
pub use converters::record_to_active_model;

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite:")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
        || database_url == ":memory:"
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(ClickflowError::database_config(format!(
            "无法从 URL 推断数据库类型: {}. 支持的 URL 格式: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// SeaORM 点击记录存储
#[derive(Clone)]
pub struct SeaOrmClickStore {
    db: DatabaseConnection,
    backend_name: String,
}

impl SeaOrmClickStore {
    pub async fn new(config: &DatabaseConfig, backend_name: &str) -> Result<Self> {
        if config.database_url.is_empty() {
            return Err(ClickflowError::database_config("database_url 未设置"));
        }

        let db = if backend_name == "sqlite" {
            connect_sqlite(&config.database_url).await?
        } else {
            connect_generic(
                &config.database_url,
                backend_name,
                config.pool_size,
                config.timeout,
            )
            .await?
        };

        run_migrations(&db).await?;

        info!("{} click store initialized", backend_name.to_uppercase());
        Ok(Self::from_connection(db, backend_name))
    }

    /// 使用已迁移的连接构造（测试使用）
    pub fn from_connection(db: DatabaseConnection, backend_name: &str) -> Self {
        Self {
            db,
            backend_name: backend_name.to_string(),
        }
    }

    pub fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn get_db_backend(&self) -> DatabaseBackend {
        self.db.get_database_backend()
    }

    /// 关闭连接池（进程退出前调用）
    pub async fn close(&self) {
        if let Err(e) = self.db.clone().close().await {
            warn!("Failed to close database connection: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_backend_from_url() {
        assert_eq!(
            infer_backend_from_url("sqlite://clickflow.db?mode=rwc").unwrap(),
            "sqlite"
        );
        assert_eq!(
            infer_backend_from_url("mariadb://u:p@localhost/db").unwrap(),
            "mysql"
        );
        assert_eq!(
            infer_backend_from_url("postgresql://localhost/db").unwrap(),
            "postgres"
        );
        assert!(infer_backend_from_url("redis://localhost").is_err());
    }
}
