//! 点击记录表迁移
//!
//! 创建 url_analytics 表，每条记录对应一次成功处理的点击事件：
//! - 原始事件字段 (url_id, ip_address, user_agent, referrer, utm_*)
//! - 富化字段 (country, city, browser, os, device_type)
//! - 去重标记 is_unique 与访问时间 visited_at
//! - 可选的幂等键 idempotency_key（队列 job id）

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UrlAnalytics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UrlAnalytics::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UrlAnalytics::UrlId)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(UrlAnalytics::IpAddress).string_len(45).null())
                    .col(ColumnDef::new(UrlAnalytics::UserAgent).text().null())
                    .col(ColumnDef::new(UrlAnalytics::Referrer).text().null())
                    .col(
                        ColumnDef::new(UrlAnalytics::Country)
                            .string_len(64)
                            .not_null()
                            .default("Unknown"),
                    )
                    .col(
                        ColumnDef::new(UrlAnalytics::City)
                            .string_len(128)
                            .not_null()
                            .default("Unknown"),
                    )
                    .col(
                        ColumnDef::new(UrlAnalytics::Browser)
                            .string_len(64)
                            .not_null()
                            .default("Unknown"),
                    )
                    .col(
                        ColumnDef::new(UrlAnalytics::Os)
                            .string_len(64)
                            .not_null()
                            .default("Unknown"),
                    )
                    .col(
                        ColumnDef::new(UrlAnalytics::DeviceType)
                            .string_len(32)
                            .not_null()
                            .default("Unknown"),
                    )
                    .col(ColumnDef::new(UrlAnalytics::UtmSource).string_len(255).null())
                    .col(ColumnDef::new(UrlAnalytics::UtmMedium).string_len(255).null())
                    .col(ColumnDef::new(UrlAnalytics::UtmCampaign).string_len(255).null())
                    .col(
                        ColumnDef::new(UrlAnalytics::IsUnique)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(UrlAnalytics::VisitedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UrlAnalytics::IdempotencyKey)
                            .string_len(64)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(UrlAnalytics::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UrlAnalytics::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum UrlAnalytics {
    #[sea_orm(iden = "url_analytics")]
    Table,
    Id,
    UrlId,
    IpAddress,
    UserAgent,
    Referrer,
    Country,
    City,
    Browser,
    Os,
    DeviceType,
    UtmSource,
    UtmMedium,
    UtmCampaign,
    IsUnique,
    VisitedAt,
    IdempotencyKey,
    CreatedAt,
}
