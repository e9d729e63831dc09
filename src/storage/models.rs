//! 单链接统计的查询结果

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkSummary {
    pub total_clicks: i64,
    /// 不同 ip_address 的数量
    pub unique_visitors: i64,
}

/// 小时桶，格式 `YYYY-MM-DD HH:00`（UTC）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeBucket {
    pub time_bucket: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryCount {
    pub country: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceCount {
    pub device_type: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OsCount {
    pub os: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkStats {
    pub summary: LinkSummary,
    /// 最近 24 个小时桶，新的在前
    pub time_series: Vec<TimeBucket>,
    /// 前 10 个国家
    pub geo: Vec<CountryCount>,
    pub devices: Vec<DeviceCount>,
    pub os: Vec<OsCount>,
}

/// 时间桶数量
pub const TIME_SERIES_LIMIT: usize = 24;
/// 国家排行数量
pub const TOP_COUNTRIES_LIMIT: usize = 10;
