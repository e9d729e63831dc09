//! 点击事件数据模型
//!
//! - `ClickEvent`：队列中的原始事件（生产者写入后不可变）
//! - `QueuedJob`：队列信封，携带稳定的 job id 与尝试次数
//! - `DedupKey`：(url_id, ip_address) 组合去重键
//! - `ClickRecord`：富化 + 去重后的持久化记录

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::services::enrichment::EnrichedAttributes;

/// 队列中的点击事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickEvent {
    /// 短链接 ID（生产者可能发送字符串或整数）
    #[serde(deserialize_with = "deserialize_url_id")]
    pub url_id: String,
    pub ip_address: String,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub utm_medium: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none", skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,
    /// 点击发生时间（字段名沿用生产者的 `timestamp`）
    #[serde(rename = "timestamp", deserialize_with = "deserialize_timestamp")]
    pub occurred_at: DateTime<Utc>,
}

impl ClickEvent {
    pub fn new(url_id: impl Into<String>, ip_address: impl Into<String>) -> Self {
        Self {
            url_id: url_id.into(),
            ip_address: ip_address.into(),
            user_agent: None,
            referrer: None,
            utm_source: None,
            utm_medium: None,
            utm_campaign: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn with_utm(
        mut self,
        source: Option<String>,
        medium: Option<String>,
        campaign: Option<String>,
    ) -> Self {
        self.utm_source = source;
        self.utm_medium = medium;
        self.utm_campaign = campaign;
        self
    }

    pub fn at(mut self, occurred_at: DateTime<Utc>) -> Self {
        self.occurred_at = occurred_at;
        self
    }

    /// 去重键
    pub fn dedup_key(&self) -> DedupKey {
        DedupKey::new(&self.url_id, &self.ip_address)
    }
}

/// 队列信封
///
/// `id` 由生产者在入队时生成，重投时保持不变，可作为幂等键。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub id: String,
    /// 已失败的尝试次数
    #[serde(default)]
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub payload: ClickEvent,
}

impl QueuedJob {
    pub fn new(payload: ClickEvent) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            attempts: 0,
            enqueued_at: Utc::now(),
            last_error: None,
            payload,
        }
    }

    /// 当前是第几次尝试（从 1 开始）
    pub fn attempt(&self) -> u32 {
        self.attempts + 1
    }
}

/// 去重键：`dedup:{url_id}:{ip_address}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey(String);

impl DedupKey {
    pub fn new(url_id: &str, ip_address: &str) -> Self {
        Self(format!("dedup:{}:{}", url_id, ip_address))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 持久化的点击记录（只追加，不更新）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickRecord {
    pub url_id: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub attributes: EnrichedAttributes,
    pub is_unique: bool,
    pub visited_at: DateTime<Utc>,
    pub idempotency_key: Option<String>,
}

impl ClickRecord {
    pub fn from_event(event: &ClickEvent, attributes: EnrichedAttributes, is_unique: bool) -> Self {
        Self {
            url_id: event.url_id.clone(),
            ip_address: Some(event.ip_address.clone()),
            user_agent: event.user_agent.clone(),
            referrer: event.referrer.clone(),
            utm_source: event.utm_source.clone(),
            utm_medium: event.utm_medium.clone(),
            utm_campaign: event.utm_campaign.clone(),
            attributes,
            is_unique,
            visited_at: event.occurred_at,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

// ============ serde helpers ============

fn deserialize_url_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Signed(i64),
        Unsigned(u64),
    }

    let id = match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s.trim().to_string(),
        RawId::Signed(n) => n.to_string(),
        RawId::Unsigned(n) => n.to_string(),
    };

    if id.is_empty() {
        return Err(serde::de::Error::custom("url_id must not be empty"));
    }
    Ok(id)
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawTimestamp {
        Millis(i64),
        Text(String),
    }

    match RawTimestamp::deserialize(deserializer)? {
        RawTimestamp::Millis(ms) => from_epoch_millis(ms).map_err(serde::de::Error::custom),
        RawTimestamp::Text(s) => parse_timestamp(&s).map_err(serde::de::Error::custom),
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn from_epoch_millis(ms: i64) -> Result<DateTime<Utc>, String> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| format!("timestamp out of range: {}", ms))
}

/// 解析时间戳：RFC 3339 字符串或毫秒级 epoch（数字字符串）
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(ms) = s.parse::<i64>() {
        return from_epoch_millis(ms);
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{}': {}", s, e))
}
