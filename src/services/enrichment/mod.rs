//! 点击富化
//!
//! 原始 IP / User-Agent → 地理与设备属性。纯函数，不做网络 I/O，
//! 任何解析失败都降级为 `"Unknown"`，永远不会让任务失败。

mod device;
mod fixed;
mod geo;

pub use device::parse_device;
pub use fixed::FixedEnricher;
pub use geo::GeoDatabase;

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::EnrichmentConfig;

/// 无法判断时的占位值
pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoAttributes {
    pub country: String,
    pub city: String,
    pub region: String,
}

impl Default for GeoAttributes {
    fn default() -> Self {
        Self {
            country: UNKNOWN.to_string(),
            city: UNKNOWN.to_string(),
            region: UNKNOWN.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAttributes {
    pub browser: String,
    pub os: String,
    pub device_class: String,
}

impl Default for DeviceAttributes {
    fn default() -> Self {
        Self {
            browser: UNKNOWN.to_string(),
            os: UNKNOWN.to_string(),
            device_class: UNKNOWN.to_string(),
        }
    }
}

/// 写入点击记录的富化属性（字段永不为空）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichedAttributes {
    pub country: String,
    pub city: String,
    pub region: String,
    pub browser: String,
    pub os: String,
    pub device_class: String,
}

impl EnrichedAttributes {
    pub fn new(geo: GeoAttributes, device: DeviceAttributes) -> Self {
        Self {
            country: geo.country,
            city: geo.city,
            region: geo.region,
            browser: device.browser,
            os: device.os,
            device_class: device.device_class,
        }
    }

    pub fn unknown() -> Self {
        Self::new(GeoAttributes::default(), DeviceAttributes::default())
    }
}

impl Default for EnrichedAttributes {
    fn default() -> Self {
        Self::unknown()
    }
}

pub trait Enricher: Send + Sync {
    fn resolve_geo(&self, ip: Option<&str>) -> GeoAttributes;

    fn resolve_device(&self, user_agent: Option<&str>) -> DeviceAttributes;

    fn enrich(&self, ip: Option<&str>, user_agent: Option<&str>) -> EnrichedAttributes {
        EnrichedAttributes::new(self.resolve_geo(ip), self.resolve_device(user_agent))
    }

    /// 实现名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 本地富化：MaxMind 数据库 + woothee
pub struct LocalEnricher {
    geo: Option<GeoDatabase>,
}

impl LocalEnricher {
    pub fn new(geo: Option<GeoDatabase>) -> Self {
        Self { geo }
    }

    /// 根据配置初始化
    ///
    /// 数据库未配置或无法读取时只记录警告，所有地理字段为 "Unknown"。
    pub fn from_config(config: &EnrichmentConfig) -> Self {
        let geo = match config.maxminddb_path.as_deref() {
            Some(path) if !path.is_empty() => match GeoDatabase::open(path) {
                Ok(db) => {
                    info!("GeoIP: Using MaxMind database at {}", path);
                    Some(db)
                }
                Err(e) => {
                    warn!(
                        "GeoIP: Failed to load MaxMind database at {}: {}, geo fields will be Unknown",
                        path, e
                    );
                    None
                }
            },
            _ => {
                info!("GeoIP: No MaxMind database configured, geo fields will be Unknown");
                None
            }
        };
        Self::new(geo)
    }

    pub fn has_geo_database(&self) -> bool {
        self.geo.is_some()
    }
}

impl Enricher for LocalEnricher {
    fn resolve_geo(&self, ip: Option<&str>) -> GeoAttributes {
        match (&self.geo, ip) {
            (Some(db), Some(ip)) => db.lookup(ip),
            _ => GeoAttributes::default(),
        }
    }

    fn resolve_device(&self, user_agent: Option<&str>) -> DeviceAttributes {
        parse_device(user_agent)
    }

    fn name(&self) -> &'static str {
        if self.geo.is_some() {
            "maxmind+woothee"
        } else {
            "woothee"
        }
    }
}

pub fn create_enricher(config: &EnrichmentConfig) -> Arc<dyn Enricher> {
    Arc::new(LocalEnricher::from_config(config))
}
