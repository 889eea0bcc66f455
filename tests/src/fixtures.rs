//! Test fixtures and request builders.

use chrono::{DateTime, TimeZone, Utc};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::net::IpAddr;
use tracker::TrackingRequest;

pub const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const FIREFOX_UA: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

pub const BOT_UA: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

pub const HOST: &str = "example.com";

pub const CLIENT_ID: u64 = 42;

/// Public address of the default visitor.
pub fn visitor_ip() -> IpAddr {
    "81.2.69.160".parse().unwrap()
}

/// Builder for tracking requests.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    uri: String,
    headers: HeaderMap,
    remote_addr: Option<IpAddr>,
}

impl RequestBuilder {
    /// Request for a page on [`HOST`] from the default visitor.
    pub fn page(path: &str) -> Self {
        Self {
            uri: path.to_string(),
            headers: HeaderMap::new(),
            remote_addr: Some(visitor_ip()),
        }
        .header("host", HOST)
        .header("user-agent", CHROME_UA)
        .header("accept-language", "de-DE,de;q=0.9,en;q=0.8")
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(
            HeaderName::from_bytes(name.as_bytes()).unwrap(),
            HeaderValue::from_str(value).unwrap(),
        );
        self
    }

    pub fn user_agent(self, ua: &str) -> Self {
        self.header("user-agent", ua)
    }

    pub fn referer(self, referer: &str) -> Self {
        self.header("referer", referer)
    }

    pub fn remote_addr(mut self, ip: &str) -> Self {
        self.remote_addr = Some(ip.parse().unwrap());
        self
    }

    pub fn build(self) -> TrackingRequest {
        TrackingRequest::new(self.uri.parse().unwrap(), self.headers, self.remote_addr)
    }
}

/// Page request from the default visitor.
pub fn page(path: &str) -> TrackingRequest {
    RequestBuilder::page(path).build()
}

/// A fixed point in time on a weekday, well away from midnight.
pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 6, 12, 0, 0).unwrap()
}
