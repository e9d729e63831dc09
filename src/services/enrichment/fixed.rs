use super::{DeviceAttributes, Enricher, GeoAttributes};

/// 固定返回值的富化实现（测试与压测使用）
#[derive(Debug, Clone, Default)]
pub struct FixedEnricher {
    pub geo: GeoAttributes,
    pub device: DeviceAttributes,
}

impl FixedEnricher {
    pub fn new(geo: GeoAttributes, device: DeviceAttributes) -> Self {
        Self { geo, device }
    }

    /// 所有字段都是 "Unknown"
    pub fn unknown() -> Self {
        Self::default()
    }
}

impl Enricher for FixedEnricher {
    fn resolve_geo(&self, _ip: Option<&str>) -> GeoAttributes {
        self.geo.clone()
    }

    fn resolve_device(&self, _user_agent: Option<&str>) -> DeviceAttributes {
        self.device.clone()
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}
