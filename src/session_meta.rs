//! Best-effort session enrichment.
//!
//! Every authenticated call refreshes the session with what can be learned
//! about the caller: address, OS and client version from the user agent,
//! country from a geo-IP service and MAC address from the local ARP table.
//! Each source may fail independently; a failure leaves that field unset and
//! never fails the request.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::db::SessionMetadata;
use crate::types::ClientDeviceType;

const ARP_TABLE_PATH: &str = "/proc/net/arp";

/// What the transport knows about the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientContext {
    pub remote_addr: Option<String>,
    pub forwarded_for: Option<String>,
    pub user_agent: Option<String>,
    pub client_id: Option<String>,
    pub device_name: Option<String>,
    pub mobile_carrier: Option<String>,
    pub screen_resolution: Option<String>,
    pub time_zone: Option<String>,
}

/// The caller's address: first hop of `X-Forwarded-For`, else the socket peer.
pub fn client_ip(ctx: &ClientContext) -> Option<String> {
    ctx.forwarded_for
        .as_deref()
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| ctx.remote_addr.clone())
}

/// OS, OS version, client version and device type parsed from a user agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserAgentInfo {
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub client_version: Option<String>,
    pub device_type: Option<ClientDeviceType>,
}

fn os_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            (Regex::new(r"(?:iPhone|CPU) OS (\d+(?:[._]\d+)*)").unwrap(), "iOS"),
            (Regex::new(r"iPadOS (\d+(?:[._]\d+)*)").unwrap(), "iPadOS"),
            (Regex::new(r"Android (\d+(?:\.\d+)*)").unwrap(), "Android"),
            (Regex::new(r"Windows NT (\d+(?:\.\d+)*)").unwrap(), "Windows"),
            (Regex::new(r"Mac OS X (\d+(?:[._]\d+)*)").unwrap(), "macOS"),
        ]
    })
}

fn client_version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:971)?town[\w-]*/(\d+(?:\.\d+)*)").unwrap())
}

pub fn parse_user_agent(ua: &str) -> UserAgentInfo {
    let mut info = UserAgentInfo::default();

    for (re, name) in os_patterns() {
        if let Some(caps) = re.captures(ua) {
            info.os_name = Some((*name).to_string());
            info.os_version = caps.get(1).map(|m| m.as_str().replace('_', "."));
            break;
        }
    }
    if info.os_name.is_none() && ua.contains("Linux") {
        info.os_name = Some("Linux".to_string());
    }

    info.client_version = client_version_re()
        .captures(ua)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    info.device_type = if ua.contains("iPad") || ua.contains("Tablet") {
        Some(ClientDeviceType::Tablet)
    } else if ua.contains("iPhone") || ua.contains("Mobile") || ua.contains("Android") {
        Some(ClientDeviceType::Phone)
    } else if ua.contains("Windows") || ua.contains("Macintosh") || ua.contains("X11") {
        Some(ClientDeviceType::Desktop)
    } else {
        None
    };

    info
}

/// Find the hardware address for `ip` in `/proc/net/arp`-formatted text.
pub fn parse_arp_table(contents: &str, ip: &str) -> Option<String> {
    contents.lines().skip(1).find_map(|line| {
        let cols: Vec<&str> = line.split_whitespace().collect();
        match cols.as_slice() {
            [addr, _hw_type, _flags, mac, ..] if *addr == ip && *mac != "00:00:00:00:00:00" => {
                Some(mac.to_lowercase())
            }
            _ => None,
        }
    })
}

/// MAC address of a caller on the local network, if the ARP table knows it.
pub fn mac_address_for(ip: &str) -> Option<String> {
    match std::fs::read_to_string(ARP_TABLE_PATH) {
        Ok(contents) => parse_arp_table(&contents, ip),
        Err(e) => {
            log::debug!("ARP table unavailable: {}", e);
            None
        }
    }
}

/// Approximate location for an address.
pub trait IpLocator: Send + Sync {
    fn locate(&self, ip: &str) -> Option<String>;
}

/// Never knows anything. Used when no geo-IP endpoint is configured.
pub struct NoopLocator;

impl IpLocator for NoopLocator {
    fn locate(&self, _ip: &str) -> Option<String> {
        None
    }
}

/// Geo-IP over HTTP. The URL template contains `{ip}`; the response is a
/// JSON object with a `country`, `country_name` or `country_code` field.
pub struct HttpIpLocator {
    client: reqwest::blocking::Client,
    url_template: String,
}

impl HttpIpLocator {
    pub fn new(url_template: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url_template,
        })
    }

    fn url_for(&self, ip: &str) -> Option<String> {
        let parsed: std::net::IpAddr = ip.parse().ok()?;
        Some(self.url_template.replace("{ip}", &parsed.to_string()))
    }
}

/// Pull the country out of a geo-IP JSON body.
pub fn country_from_geoip(body: &serde_json::Value) -> Option<String> {
    ["country", "country_name", "country_code"]
        .iter()
        .find_map(|k| body.get(*k).and_then(|v| v.as_str()))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl IpLocator for HttpIpLocator {
    fn locate(&self, ip: &str) -> Option<String> {
        let url = self.url_for(ip)?;
        let resp = match self.client.get(&url).send() {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                log::debug!("Geo-IP lookup for {} returned {}", ip, r.status());
                return None;
            }
            Err(e) => {
                log::debug!("Geo-IP lookup for {} failed: {}", ip, e);
                return None;
            }
        };
        match resp.json::<serde_json::Value>() {
            Ok(body) => country_from_geoip(&body),
            Err(e) => {
                log::debug!("Geo-IP response for {} was not JSON: {}", ip, e);
                None
            }
        }
    }
}

/// Collect everything we can learn about the caller.
pub fn collect_metadata(ctx: &ClientContext, locator: &dyn IpLocator) -> SessionMetadata {
    let ip = client_ip(ctx);
    let ua = ctx
        .user_agent
        .as_deref()
        .map(parse_user_agent)
        .unwrap_or_default();

    SessionMetadata {
        client_version: ua.client_version,
        device_name: ctx.device_name.clone(),
        device_type: ua.device_type,
        location: ip.as_deref().and_then(|ip| locator.locate(ip)),
        mac_address: ip.as_deref().and_then(mac_address_for),
        mobile_carrier: ctx.mobile_carrier.clone(),
        os_name: ua.os_name,
        os_version: ua.os_version,
        screen_resolution: ctx.screen_resolution.clone(),
        time_zone: ctx.time_zone.clone(),
        ip_address: ip,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLocator(&'static str);

    impl IpLocator for FixedLocator {
        fn locate(&self, _ip: &str) -> Option<String> {
            Some(self.0.to_string())
        }
    }

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let ctx = ClientContext {
            remote_addr: Some("10.0.0.1".into()),
            forwarded_for: Some(" 203.0.113.9, 10.0.0.1".into()),
            ..Default::default()
        };
        assert_eq!(client_ip(&ctx).as_deref(), Some("203.0.113.9"));

        let ctx = ClientContext {
            remote_addr: Some("10.0.0.1".into()),
            ..Default::default()
        };
        assert_eq!(client_ip(&ctx).as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn test_parse_user_agents() {
        let ios = parse_user_agent(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) town-ios/2.3.1",
        );
        assert_eq!(ios.os_name.as_deref(), Some("iOS"));
        assert_eq!(ios.os_version.as_deref(), Some("17.4"));
        assert_eq!(ios.client_version.as_deref(), Some("2.3.1"));
        assert_eq!(ios.device_type, Some(ClientDeviceType::Phone));

        let mac = parse_user_agent(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15",
        );
        assert_eq!(mac.os_name.as_deref(), Some("macOS"));
        assert_eq!(mac.os_version.as_deref(), Some("10.15.7"));
        assert_eq!(mac.device_type, Some(ClientDeviceType::Desktop));
        assert!(mac.client_version.is_none());

        let android = parse_user_agent("Mozilla/5.0 (Linux; Android 14; Pixel 8) Mobile");
        assert_eq!(android.os_name.as_deref(), Some("Android"));
        assert_eq!(android.os_version.as_deref(), Some("14"));

        assert_eq!(parse_user_agent("curl/8.4.0"), UserAgentInfo::default());
    }

    #[test]
    fn test_parse_arp_table() {
        let table = "IP address       HW type     Flags       HW address            Mask     Device\n\
                     192.168.1.20     0x1         0x2         AA:BB:CC:DD:EE:FF     *        eth0\n\
                     192.168.1.21     0x1         0x0         00:00:00:00:00:00     *        eth0\n";
        assert_eq!(
            parse_arp_table(table, "192.168.1.20").as_deref(),
            Some("aa:bb:cc:dd:ee:ff")
        );
        assert_eq!(parse_arp_table(table, "192.168.1.21"), None);
        assert_eq!(parse_arp_table(table, "192.168.1.99"), None);
    }

    #[test]
    fn test_geoip_body_and_url() {
        let body = serde_json::json!({"ip": "1.2.3.4", "country_name": "United Arab Emirates"});
        assert_eq!(
            country_from_geoip(&body).as_deref(),
            Some("United Arab Emirates")
        );
        assert_eq!(country_from_geoip(&serde_json::json!({"country": ""})), None);

        let locator =
            HttpIpLocator::new("https://geo.test/{ip}/json".into(), Duration::from_secs(1)).unwrap();
        assert_eq!(
            locator.url_for("1.2.3.4").as_deref(),
            Some("https://geo.test/1.2.3.4/json")
        );
        assert_eq!(locator.url_for("not-an-ip/../x"), None);
    }

    #[test]
    fn test_collect_metadata_uses_all_sources() {
        let ctx = ClientContext {
            forwarded_for: Some("203.0.113.9".into()),
            user_agent: Some("Mozilla/5.0 (iPad; CPU OS 16_1 like Mac OS X)".into()),
            time_zone: Some("Asia/Dubai".into()),
            ..Default::default()
        };
        let meta = collect_metadata(&ctx, &FixedLocator("AE"));
        assert_eq!(meta.ip_address.as_deref(), Some("203.0.113.9"));
        assert_eq!(meta.location.as_deref(), Some("AE"));
        assert_eq!(meta.device_type, Some(ClientDeviceType::Tablet));
        assert_eq!(meta.os_version.as_deref(), Some("16.1"));
        assert_eq!(meta.time_zone.as_deref(), Some("Asia/Dubai"));
    }
}
