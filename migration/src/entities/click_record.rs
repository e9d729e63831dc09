//! Enriched click record entity (`url_analytics`)

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "url_analytics")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub url_id: String,
    pub ip_address: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub user_agent: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub referrer: Option<String>,
    pub country: String,
    pub city: String,
    pub browser: String,
    pub os: String,
    pub device_type: String,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    #[sea_orm(default_value = true)]
    pub is_unique: bool,
    pub visited_at: DateTimeUtc,
    /// Queue job id when idempotent writes are enabled (unique)
    #[sea_orm(unique, nullable)]
    pub idempotency_key: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
