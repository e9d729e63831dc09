//! User-Agent 解析（woothee）
//!
//! woothee 的原始取值会被归一化为报表使用的粗粒度类别。

use woothee::parser::Parser;

use super::{DeviceAttributes, UNKNOWN};

const WOOTHEE_UNKNOWN: &str = "UNKNOWN";

pub fn parse_device(user_agent: Option<&str>) -> DeviceAttributes {
    let Some(ua) = user_agent.map(str::trim).filter(|ua| !ua.is_empty()) else {
        return DeviceAttributes::default();
    };

    let Some(result) = Parser::new().parse(ua) else {
        return DeviceAttributes::default();
    };

    let browser = if result.name.is_empty() || result.name == WOOTHEE_UNKNOWN {
        UNKNOWN.to_string()
    } else {
        result.name.to_string()
    };

    DeviceAttributes {
        browser,
        os: normalize_os(result.os).to_string(),
        device_class: device_class(result.category, result.os, ua).to_string(),
    }
}

fn normalize_os(os: &str) -> &str {
    match os {
        "" | WOOTHEE_UNKNOWN => UNKNOWN,
        "Mac OSX" => "Mac OS",
        "iPhone" | "iPad" | "iPod" => "iOS",
        os if os.starts_with("Windows") => "Windows",
        os => os,
    }
}

fn device_class<'a>(category: &str, os: &str, ua: &str) -> &'a str {
    match category {
        "pc" | "misc" => "Desktop",
        "smartphone" | "mobilephone" => {
            if os == "iPad" || (os == "Android" && !ua.contains("Mobile")) {
                "Tablet"
            } else {
                "Mobile"
            }
        }
        "appliance" => "Console",
        "crawler" => "Bot",
        _ => UNKNOWN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5 Mobile/15E148 Safari/604.1";
    const SAFARI_IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 16_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5 Mobile/15E148 Safari/604.1";
    const GOOGLEBOT: &str =
        "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

    #[test]
    fn test_chrome_on_windows_is_desktop() {
        let attrs = parse_device(Some(CHROME_WINDOWS));
        assert_eq!(attrs.browser, "Chrome");
        assert_eq!(attrs.os, "Windows");
        assert_eq!(attrs.device_class, "Desktop");
    }

    #[test]
    fn test_iphone_is_mobile_ios() {
        let attrs = parse_device(Some(SAFARI_IPHONE));
        assert_eq!(attrs.browser, "Safari");
        assert_eq!(attrs.os, "iOS");
        assert_eq!(attrs.device_class, "Mobile");
    }

    #[test]
    fn test_ipad_is_tablet() {
        let attrs = parse_device(Some(SAFARI_IPAD));
        assert_eq!(attrs.os, "iOS");
        assert_eq!(attrs.device_class, "Tablet");
    }

    #[test]
    fn test_crawler_is_bot() {
        assert_eq!(parse_device(Some(GOOGLEBOT)).device_class, "Bot");
    }

    #[test]
    fn test_missing_or_garbage_user_agent() {
        assert_eq!(parse_device(None), DeviceAttributes::default());
        assert_eq!(parse_device(Some("   ")), DeviceAttributes::default());

        let garbage = parse_device(Some("\u{0}\u{1}not a browser"));
        assert_eq!(garbage.browser, UNKNOWN);
        assert_eq!(garbage.os, UNKNOWN);
    }

    #[test]
    fn test_normalize_os() {
        assert_eq!(normalize_os("Windows 10"), "Windows");
        assert_eq!(normalize_os("Mac OSX"), "Mac OS");
        assert_eq!(normalize_os("Linux"), "Linux");
        assert_eq!(normalize_os("UNKNOWN"), UNKNOWN);
    }
}
