//! 单链接统计查询
//!
//! 提供 GET /api/stats/{url_id} 需要的汇总、小时趋势与分布。

use sea_orm::{
    ColumnTrait, DbBackend, EntityTrait, FromQueryResult, QueryFilter, QueryOrder, QuerySelect,
    sea_query::Expr,
};

use super::SeaOrmClickStore;
use crate::errors::Result;
use crate::storage::models::{
    CountryCount, DeviceCount, LinkStats, LinkSummary, OsCount, TIME_SERIES_LIMIT,
    TOP_COUNTRIES_LIMIT, TimeBucket,
};

use migration::entities::click_record;

// ============ 查询结果类型 ============

#[derive(Debug, FromQueryResult)]
struct SummaryRow {
    total_clicks: i64,
    unique_visitors: i64,
}

const POSTGRES_HOUR_BUCKET: &str = "TO_CHAR(visited_at, 'YYYY-MM-DD HH24:00')";

#[derive(Debug, FromQueryResult)]
struct LabelRow {
    label: String,
    count: i64,
}

impl SeaOrmClickStore {
    /// 按小时截断 visited_at 的表达式（格式 YYYY-MM-DD HH:00）
    fn hour_bucket_expr(&self) -> Expr {
        match self.get_db_backend() {
            DbBackend::Sqlite => Expr::cust("strftime('%Y-%m-%d %H:00', visited_at)"),
            DbBackend::MySql => Expr::cust("DATE_FORMAT(visited_at, '%Y-%m-%d %H:00')"),
            DbBackend::Postgres => Expr::cust(POSTGRES_HOUR_BUCKET),
            // 其他后端按 Postgres 语法
            _ => Expr::cust(POSTGRES_HOUR_BUCKET),
        }
    }

    pub(super) async fn query_link_stats(&self, url_id: &str) -> Result<LinkStats> {
        let summary = self.query_summary(url_id).await?;

        let time_series = self
            .query_time_series(url_id)
            .await?
            .into_iter()
            .map(|r| TimeBucket {
                time_bucket: r.label,
                count: r.count,
            })
            .collect();

        let geo = self
            .query_distribution(url_id, click_record::Column::Country, Some(TOP_COUNTRIES_LIMIT))
            .await?
            .into_iter()
            .map(|r| CountryCount {
                country: r.label,
                count: r.count,
            })
            .collect();

        let devices = self
            .query_distribution(url_id, click_record::Column::DeviceType, None)
            .await?
            .into_iter()
            .map(|r| DeviceCount {
                device_type: r.label,
                count: r.count,
            })
            .collect();

        let os = self
            .query_distribution(url_id, click_record::Column::Os, None)
            .await?
            .into_iter()
            .map(|r| OsCount {
                os: r.label,
                count: r.count,
            })
            .collect();

        Ok(LinkStats {
            summary,
            time_series,
            geo,
            devices,
            os,
        })
    }

    async fn query_summary(&self, url_id: &str) -> Result<LinkSummary> {
        let row = click_record::Entity::find()
            .select_only()
            .column_as(click_record::Column::Id.count(), "total_clicks")
            .column_as(Expr::cust("COUNT(DISTINCT ip_address)"), "unique_visitors")
            .filter(click_record::Column::UrlId.eq(url_id))
            .into_model::<SummaryRow>()
            .one(&self.db)
            .await?;

        Ok(row
            .map(|r| LinkSummary {
                total_clicks: r.total_clicks,
                unique_visitors: r.unique_visitors,
            })
            .unwrap_or_default())
    }

    async fn query_time_series(&self, url_id: &str) -> Result<Vec<LabelRow>> {
        let bucket = self.hour_bucket_expr();
        let rows = click_record::Entity::find()
            .select_only()
            .column_as(bucket.clone(), "label")
            .column_as(click_record::Column::Id.count(), "count")
            .filter(click_record::Column::UrlId.eq(url_id))
            .group_by(bucket)
            .order_by_desc(Expr::cust("label"))
            .limit(TIME_SERIES_LIMIT as u64)
            .into_model::<LabelRow>()
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn query_distribution(
        &self,
        url_id: &str,
        column: click_record::Column,
        limit: Option<usize>,
    ) -> Result<Vec<LabelRow>> {
        let mut query = click_record::Entity::find()
            .select_only()
            .column_as(column, "label")
            .column_as(click_record::Column::Id.count(), "count")
            .filter(click_record::Column::UrlId.eq(url_id))
            .group_by(column)
            .order_by_desc(Expr::cust("count"))
            .order_by_asc(column);

        if let Some(limit) = limit {
            query = query.limit(limit as u64);
        }

        let rows = query.into_model::<LabelRow>().all(&self.db).await?;
        Ok(rows)
    }
}
