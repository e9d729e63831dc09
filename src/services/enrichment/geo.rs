//! MaxMind GeoLite2 数据库查询

use std::net::IpAddr;

use maxminddb::Reader;
use tracing::trace;

use super::{GeoAttributes, UNKNOWN};
use crate::utils::ip::{is_private_or_local, parse_ip};

/// 内存中的 GeoLite2-City 数据库（只读，可并发查询）
pub struct GeoDatabase {
    reader: Reader<Vec<u8>>,
}

impl GeoDatabase {
    pub fn open(path: &str) -> Result<Self, maxminddb::MaxMindDbError> {
        let reader = Reader::open_readfile(path)?;
        Ok(Self { reader })
    }

    /// 查询 IP，任何失败都返回全 Unknown
    pub fn lookup(&self, ip: &str) -> GeoAttributes {
        let Some(ip_addr) = parse_ip(ip) else {
            return GeoAttributes::default();
        };
        if is_private_or_local(&ip_addr) || ip_addr.is_unspecified() {
            return GeoAttributes::default();
        }
        self.lookup_addr(ip_addr).unwrap_or_default()
    }

    fn lookup_addr(&self, ip: IpAddr) -> Option<GeoAttributes> {
        let result = self.reader.lookup(ip).ok()?;
        let city: maxminddb::geoip2::City = result.decode().ok()??;

        let country = city.country.iso_code.map(String::from);
        let city_name = city.city.names.english.map(String::from);
        let region = city
            .subdivisions
            .first()
            .and_then(|s| s.iso_code)
            .map(String::from);

        trace!(
            "MaxMind lookup for {}: country={:?}, city={:?}, region={:?}",
            ip, country, city_name, region
        );

        Some(GeoAttributes {
            country: country.unwrap_or_else(|| UNKNOWN.to_string()),
            city: city_name.unwrap_or_else(|| UNKNOWN.to_string()),
            region: region.unwrap_or_else(|| UNKNOWN.to_string()),
        })
    }
}
