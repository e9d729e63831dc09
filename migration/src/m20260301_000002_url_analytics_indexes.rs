//! url_analytics 索引
//!
//! - url_id：单链接统计
//! - visited_at：时间范围查询
//! - (url_id, visited_at)：单链接时间序列
//! - idempotency_key 唯一索引：重复投递的写入变为 no-op（NULL 不参与唯一约束）

use sea_orm_migration::prelude::*;

use crate::m20260301_000001_url_analytics::UrlAnalytics;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_url_analytics_url_id")
                    .table(UrlAnalytics::Table)
                    .col(UrlAnalytics::UrlId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_url_analytics_visited_at")
                    .table(UrlAnalytics::Table)
                    .col(UrlAnalytics::VisitedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_url_analytics_url_time")
                    .table(UrlAnalytics::Table)
                    .col(UrlAnalytics::UrlId)
                    .col(UrlAnalytics::VisitedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uq_url_analytics_idempotency_key")
                    .table(UrlAnalytics::Table)
                    .col(UrlAnalytics::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for name in [
            "uq_url_analytics_idempotency_key",
            "idx_url_analytics_url_time",
            "idx_url_analytics_visited_at",
            "idx_url_analytics_url_id",
        ] {
            manager
                .drop_index(
                    Index::drop()
                        .name(name)
                        .table(UrlAnalytics::Table)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }
}
