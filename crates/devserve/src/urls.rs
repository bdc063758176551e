//! URL composition for the resolved listening endpoint.
//!
//! [`prepare_urls`] is pure: LAN address detection is delegated to a
//! [`LanLookup`], so wildcard-host handling can be tested without a network.

use crate::config::Protocol;
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};

/// The URLs announced for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedEndpoints {
    pub port: u16,
    /// Loopback-facing URL, e.g. `http://localhost:3000/`
    pub local_url: String,
    /// URL reachable from other devices, when a private LAN address is known
    pub lan_url: Option<String>,
    /// `lan_url` without the trailing slash, for embedding in generated config
    pub lan_url_for_config: Option<String>,
    /// URL handed to the browser
    pub browser_url: String,
}

/// Source of the machine's LAN-reachable address.
pub trait LanLookup: Send + Sync {
    fn lan_address(&self) -> Option<IpAddr>;
}

impl<F> LanLookup for F
where
    F: Fn() -> Option<IpAddr> + Send + Sync,
{
    fn lan_address(&self) -> Option<IpAddr> {
        self()
    }
}

/// Discovers the outbound interface address by "connecting" a UDP socket.
///
/// UDP connect only selects a route; no packet is sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdpLanLookup;

impl LanLookup for UdpLanLookup {
    fn lan_address(&self) -> Option<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
        socket.connect((Ipv4Addr::new(10, 255, 255, 255), 1)).ok()?;
        let ip = socket.local_addr().ok()?.ip();
        (!ip.is_unspecified() && !ip.is_loopback()).then_some(ip)
    }
}

/// Hosts that bind every interface.
pub fn is_wildcard_host(host: &str) -> bool {
    matches!(host, "" | "0.0.0.0" | "::" | "[::]")
}

/// Only RFC 1918 IPv4 addresses are announced as LAN URLs.
fn is_private_lan(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private(),
        IpAddr::V6(_) => false,
    }
}

fn format_host(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    }
}

fn format_url(protocol: Protocol, host: &str, port: u16) -> String {
    format!("{}://{}:{}/", protocol, format_host(host), port)
}

/// Compose the local, LAN and browser URLs for `protocol://host:port`.
///
/// Wildcard hosts are announced as `localhost` locally and by their detected
/// private LAN address on the network; a concrete host is used verbatim and
/// gets no LAN URL.
///
/// # Examples
///
/// ```
/// use devserve::config::Protocol;
/// use devserve::urls::prepare_urls;
/// use std::net::{IpAddr, Ipv4Addr};
///
/// let lan = || Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)));
/// let urls = prepare_urls(Protocol::Http, "0.0.0.0", 3000, &lan);
/// assert_eq!(urls.local_url, "http://localhost:3000/");
/// assert_eq!(urls.lan_url_for_config.as_deref(), Some("http://192.168.1.20:3000"));
/// ```
pub fn prepare_urls(
    protocol: Protocol,
    host: &str,
    port: u16,
    lan: &dyn LanLookup,
) -> ResolvedEndpoints {
    let (pretty_host, lan_url) = if is_wildcard_host(host) {
        let lan_url = lan
            .lan_address()
            .filter(is_private_lan)
            .map(|ip| format_url(protocol, &ip.to_string(), port));
        ("localhost".to_string(), lan_url)
    } else {
        (host.to_string(), None)
    };

    let local_url = format_url(protocol, &pretty_host, port);
    let lan_url_for_config = lan_url
        .as_ref()
        .map(|url| url.trim_end_matches('/').to_string());

    ResolvedEndpoints {
        port,
        browser_url: local_url.clone(),
        local_url,
        lan_url,
        lan_url_for_config,
    }
}
