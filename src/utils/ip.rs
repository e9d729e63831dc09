//! IP 地址处理工具
//!
//! - 私有 / 本地地址检测（富化时跳过 GeoIP 查询）
//! - 可信代理配置（trusted_proxies）与 CIDR 匹配
//! - HTTP 请求的客户端 IP 提取（server feature）

use std::net::{IpAddr, SocketAddr};

/// 检查 IP 是否为私有地址或 localhost
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            // - fc00::/7 (ULA, RFC 4193)
            // - fe80::/10 (Link-local)
            // - ::1 (Loopback)
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// 解析 IP，兼容 `ip:port` 写法
pub fn parse_ip(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim();
    if let Ok(socket_addr) = raw.parse::<SocketAddr>() {
        return Some(socket_addr.ip());
    }
    raw.parse::<IpAddr>().ok()
}

/// 检查 IP 是否在可信代理列表中
pub fn is_trusted_proxy(ip: &str, trusted_proxies: &[String]) -> bool {
    let Some(ip_addr) = parse_ip(ip) else {
        return false;
    };

    trusted_proxies.iter().any(|proxy| {
        if proxy.contains('/') {
            ip_in_cidr(&ip_addr, proxy)
        } else {
            proxy.parse::<IpAddr>().is_ok_and(|p| p == ip_addr)
        }
    })
}

/// CIDR 检查
pub fn ip_in_cidr(ip: &IpAddr, cidr: &str) -> bool {
    let Some((network, prefix_len)) = cidr.split_once('/') else {
        return false;
    };

    let Ok(prefix_len): Result<u8, _> = prefix_len.parse() else {
        return false;
    };

    let Ok(network_addr) = network.parse::<IpAddr>() else {
        return false;
    };

    match (ip, network_addr) {
        (IpAddr::V4(ip), IpAddr::V4(net)) => {
            if prefix_len > 32 {
                return false;
            }
            let mask = u32::MAX.checked_shl(32 - prefix_len as u32).unwrap_or(0);
            let ip_bits = u32::from_be_bytes(ip.octets());
            let net_bits = u32::from_be_bytes(net.octets());
            (ip_bits & mask) == (net_bits & mask)
        }
        (IpAddr::V6(ip), IpAddr::V6(net)) => {
            if prefix_len > 128 {
                return false;
            }
            let mask = u128::MAX.checked_shl(128 - prefix_len as u32).unwrap_or(0);
            let ip_bits = u128::from_be_bytes(ip.octets());
            let net_bits = u128::from_be_bytes(net.octets());
            (ip_bits & mask) == (net_bits & mask)
        }
        _ => false, // IPv4 vs IPv6 不匹配
    }
}

#[cfg(feature = "server")]
mod http {
    use std::net::IpAddr;

    use actix_web::HttpRequest;
    use actix_web::http::header::HeaderMap;
    use tracing::debug;

    use super::{is_private_or_local, is_trusted_proxy};

    /// 从 HttpRequest 提取真实客户端 IP
    ///
    /// 策略（按优先级）：
    /// 1. 显式配置 trusted_proxies 且匹配 → 使用 X-Forwarded-For
    /// 2. 未配置 trusted_proxies 且连接来自私有 IP → 自动检测代理
    /// 3. 默认 → 使用连接 IP
    pub fn extract_client_ip(req: &HttpRequest, trusted_proxies: &[String]) -> Option<String> {
        let conn_info = req.connection_info();
        let peer_ip = conn_info.peer_addr()?;
        let forwarded = || extract_forwarded_ip_from_headers(req.headers());

        if !trusted_proxies.is_empty() {
            if is_trusted_proxy(peer_ip, trusted_proxies) {
                let real_ip = forwarded().unwrap_or_else(|| peer_ip.to_string());
                debug!("Trusted proxy (explicit): {} -> {}", peer_ip, real_ip);
                return Some(real_ip);
            }
            return Some(peer_ip.to_string());
        }

        if let Ok(ip_addr) = peer_ip.parse::<IpAddr>()
            && is_private_or_local(&ip_addr)
            && let Some(real_ip) = forwarded()
        {
            debug!(
                "Auto-detect proxy (private IP {}): using X-Forwarded-For: {}",
                peer_ip, real_ip
            );
            return Some(real_ip);
        }

        Some(peer_ip.to_string())
    }

    /// 从 HeaderMap 提取转发的 IP（X-Forwarded-For 优先，其次 X-Real-IP）
    pub fn extract_forwarded_ip_from_headers(headers: &HeaderMap) -> Option<String> {
        headers
            .get("x-forwarded-for")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|h| h.to_str().ok())
                    .map(|s| s.trim().to_string())
            })
    }
}

#[cfg(feature = "server")]
pub use http::{extract_client_ip, extract_forwarded_ip_from_headers};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_private_or_local_ipv4() {
        assert!(is_private_or_local(&"10.0.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"172.16.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"192.168.1.1".parse().unwrap()));
        assert!(is_private_or_local(&"127.0.0.1".parse().unwrap()));
        assert!(!is_private_or_local(&"8.8.8.8".parse().unwrap()));
        assert!(!is_private_or_local(&"1.1.1.1".parse().unwrap()));
    }

    #[test]
    fn test_is_private_or_local_ipv6() {
        assert!(is_private_or_local(&"::1".parse().unwrap()));
        assert!(is_private_or_local(&"fd00::1".parse().unwrap()));
        assert!(is_private_or_local(&"fe80::1".parse().unwrap()));
        assert!(!is_private_or_local(
            &"2001:4860:4860::8888".parse().unwrap()
        ));
    }

    #[test]
    fn test_parse_ip_accepts_socket_addr() {
        assert_eq!(parse_ip("1.2.3.4:8080"), "1.2.3.4".parse().ok());
        assert_eq!(parse_ip(" 1.2.3.4 "), "1.2.3.4".parse().ok());
        assert_eq!(parse_ip("not-an-ip"), None);
    }

    #[test]
    fn test_ip_in_cidr() {
        let ip: IpAddr = "192.168.1.100".parse().unwrap();
        assert!(ip_in_cidr(&ip, "192.168.1.0/24"));
        assert!(!ip_in_cidr(&ip, "192.168.2.0/24"));
        assert!(!ip_in_cidr(&ip, "192.168.1.0/33"));

        let ip6: IpAddr = "2001:db8::1".parse().unwrap();
        assert!(ip_in_cidr(&ip6, "2001:db8::/32"));
        assert!(!ip_in_cidr(&ip6, "10.0.0.0/8"));
    }

    #[test]
    fn test_is_trusted_proxy() {
        let proxies = vec!["127.0.0.1".to_string(), "10.0.0.0/8".to_string()];
        assert!(is_trusted_proxy("127.0.0.1:8080", &proxies));
        assert!(is_trusted_proxy("10.20.30.40", &proxies));
        assert!(!is_trusted_proxy("8.8.8.8", &proxies));
    }
}
