use reqwest::Url;
use std::net::IpAddr;

/// Reads a yes/no switch such as `RUNSTREAM_UPLOADS_ENABLED=on`.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Unset or unparseable variables count as off.
pub fn env_flag_enabled(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|value| parse_flag(&value))
        .unwrap_or(false)
}

pub fn is_http_url(url: &str) -> bool {
    Url::parse(url.trim())
        .map(|parsed| matches!(parsed.scheme(), "http" | "https") && parsed.has_host())
        .unwrap_or(false)
}

/// True when `url` points at this machine: `localhost`, a loopback address,
/// or the unspecified address a local server binds to.
pub fn is_local_endpoint_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    match bare.parse::<IpAddr>() {
        Ok(addr) => addr.is_loopback() || addr.is_unspecified(),
        Err(_) => host.eq_ignore_ascii_case("localhost"),
    }
}
