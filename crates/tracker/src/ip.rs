//! Client IP extraction and IP filtering.

use ipnetwork::IpNetwork;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::net::{IpAddr, SocketAddr};

use crate::request::TrackingRequest;

/// Headers that may carry the client IP behind a proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpHeader {
    CfConnectingIp,
    TrueClientIp,
    XForwardedFor,
    Forwarded,
    XRealIp,
}

impl IpHeader {
    /// Header order used when none is configured.
    pub const DEFAULT_ORDER: [IpHeader; 5] = [
        IpHeader::CfConnectingIp,
        IpHeader::TrueClientIp,
        IpHeader::XForwardedFor,
        IpHeader::Forwarded,
        IpHeader::XRealIp,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            IpHeader::CfConnectingIp => "cf-connecting-ip",
            IpHeader::TrueClientIp => "true-client-ip",
            IpHeader::XForwardedFor => "x-forwarded-for",
            IpHeader::Forwarded => "forwarded",
            IpHeader::XRealIp => "x-real-ip",
        }
    }

    fn parse(&self, value: &str) -> Option<IpAddr> {
        match self {
            IpHeader::CfConnectingIp | IpHeader::TrueClientIp | IpHeader::XForwardedFor => {
                // the last entry was appended by the closest proxy
                value.rsplit(',').next().and_then(public_ip)
            }
            IpHeader::Forwarded => value
                .rsplit(',')
                .next()?
                .split(';')
                .filter_map(|part| part.split_once('='))
                .find(|(k, _)| k.trim().eq_ignore_ascii_case("for"))
                .and_then(|(_, v)| public_ip(v.trim().trim_matches('"'))),
            IpHeader::XRealIp => public_ip(value),
        }
    }
}

/// Finds the client IP of a request.
pub trait IpExtractor: Send + Sync {
    fn client_ip(&self, req: &TrackingRequest) -> Option<IpAddr>;
}

/// Reads the first valid proxy header, falling back to the peer address.
///
/// Headers are only honoured if the peer is one of the trusted proxy
/// networks, or if no networks are configured.
#[derive(Debug, Clone)]
pub struct HeaderIpExtractor {
    headers: Vec<IpHeader>,
    trusted: Vec<IpNetwork>,
}

impl HeaderIpExtractor {
    pub fn new(headers: Vec<IpHeader>, trusted: Vec<IpNetwork>) -> Self {
        Self { headers, trusted }
    }

    fn trusts(&self, peer: Option<IpAddr>) -> bool {
        if self.trusted.is_empty() {
            return true;
        }

        peer.is_some_and(|ip| self.trusted.iter().any(|net| net.contains(ip)))
    }
}

impl Default for HeaderIpExtractor {
    fn default() -> Self {
        Self::new(IpHeader::DEFAULT_ORDER.to_vec(), Vec::new())
    }
}

impl IpExtractor for HeaderIpExtractor {
    fn client_ip(&self, req: &TrackingRequest) -> Option<IpAddr> {
        if !self.trusts(req.remote_addr) {
            return req.remote_addr;
        }

        self.headers
            .iter()
            .find_map(|header| {
                let value = req.header(header.name());
                (!value.is_empty()).then(|| header.parse(value)).flatten()
            })
            .or(req.remote_addr)
    }
}

/// Parses an address, with or without port, and rejects private,
/// loopback and unspecified addresses.
fn public_ip(value: &str) -> Option<IpAddr> {
    let value = value.trim();
    let ip = value
        .parse::<IpAddr>()
        .ok()
        .or_else(|| value.parse::<SocketAddr>().ok().map(|s| s.ip()))
        .or_else(|| {
            value
                .rsplit_once(':')
                .and_then(|(host, _)| host.parse::<IpAddr>().ok())
        })?;

    let private = match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            // fc00::/7 unique local
            v6.is_loopback() || v6.is_unspecified() || (v6.segments()[0] & 0xfe00) == 0xfc00
        }
    };

    (!private).then_some(ip)
}

/// Decides whether requests from an IP are ignored.
pub trait IpFilter: Send + Sync {
    fn is_ignored(&self, ip: &IpAddr) -> bool;
}

#[derive(Default)]
struct IpListEntries {
    blocked: HashSet<IpAddr>,
    allowed: HashSet<IpAddr>,
    networks: Vec<IpNetwork>,
}

/// [`IpFilter`] over single addresses and networks, with a whitelist that
/// takes precedence. Can be replaced at runtime.
#[derive(Default)]
pub struct IpList {
    entries: RwLock<IpListEntries>,
}

impl IpList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces all entries.
    pub fn update(&self, blocked: Vec<IpAddr>, allowed: Vec<IpAddr>, networks: Vec<IpNetwork>) {
        let entries = IpListEntries {
            blocked: blocked.into_iter().collect(),
            allowed: allowed.into_iter().collect(),
            networks,
        };
        *self.entries.write() = entries;
    }
}

impl IpFilter for IpList {
    fn is_ignored(&self, ip: &IpAddr) -> bool {
        let entries = self.entries.read();

        if entries.allowed.contains(ip) {
            return false;
        }

        entries.blocked.contains(ip) || entries.networks.iter().any(|net| net.contains(*ip))
    }
}
