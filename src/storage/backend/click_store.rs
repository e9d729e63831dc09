//! ClickStore implementation for SeaOrmClickStore

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::{debug, trace};

use super::SeaOrmClickStore;
use super::converters::{model_to_record, record_to_active_model};
use crate::analytics::ClickRecord;
use crate::errors::{ClickflowError, Result};
use crate::storage::{ClickStore, InsertOutcome, LinkStats};

use migration::entities::click_record;

impl SeaOrmClickStore {
    /// 按写入顺序读出某个链接的全部点击记录
    pub async fn clicks_for(&self, url_id: &str) -> Result<Vec<ClickRecord>> {
        let models = click_record::Entity::find()
            .filter(click_record::Column::UrlId.eq(url_id))
            .order_by_asc(click_record::Column::Id)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(model_to_record).collect())
    }
}

#[async_trait]
impl ClickStore for SeaOrmClickStore {
    async fn insert_click(&self, record: ClickRecord) -> Result<InsertOutcome> {
        let idempotent = record.idempotency_key.is_some();
        let model = record_to_active_model(&record, Utc::now());

        let rows = if idempotent {
            // 唯一索引 + DO NOTHING：重复键影响 0 行
            click_record::Entity::insert(model)
                .on_conflict(
                    OnConflict::column(click_record::Column::IdempotencyKey)
                        .do_nothing()
                        .to_owned(),
                )
                .exec_without_returning(&self.db)
                .await?
        } else {
            click_record::Entity::insert(model)
                .exec_without_returning(&self.db)
                .await?
        };

        if rows == 0 {
            debug!(
                "Click for url_id={} skipped: idempotency key {:?} already stored",
                record.url_id, record.idempotency_key
            );
            return Ok(InsertOutcome::Duplicate);
        }

        trace!(
            "Click stored in {}: url_id={}, is_unique={}",
            self.backend_name, record.url_id, record.is_unique
        );
        Ok(InsertOutcome::Inserted)
    }

    async fn link_stats(&self, url_id: &str) -> Result<LinkStats> {
        self.query_link_stats(url_id).await
    }

    async fn ping(&self) -> Result<()> {
        self.db
            .ping()
            .await
            .map_err(|e| ClickflowError::database_connection(e.to_string()))
    }

    fn backend_name(&self) -> &str {
        &self.backend_name
    }
}
