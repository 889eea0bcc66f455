//! The inbound request as seen by the tracker.

use http::{HeaderMap, Uri};
use std::net::IpAddr;

/// Parts of an HTTP request the tracker looks at.
#[derive(Debug, Clone, Default)]
pub struct TrackingRequest {
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Peer address of the connection
    pub remote_addr: Option<IpAddr>,
}

impl TrackingRequest {
    pub fn new(uri: Uri, headers: HeaderMap, remote_addr: Option<IpAddr>) -> Self {
        Self {
            uri,
            headers,
            remote_addr,
        }
    }

    /// Header value, or an empty string if it is missing or not valid UTF-8.
    pub fn header(&self, name: &str) -> &str {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }

    pub fn user_agent(&self) -> &str {
        self.header("user-agent")
    }

    pub fn referer(&self) -> &str {
        self.header("referer")
    }

    /// First value of a query parameter, percent-decoded.
    pub fn query(&self, key: &str) -> Option<String> {
        let query = self.uri.query()?;

        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// Trimmed query parameter, empty if missing.
    pub fn query_trimmed(&self, key: &str) -> String {
        self.query(key)
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    }

    /// Absolute URL of the request if it can be determined.
    ///
    /// Server side request URIs usually lack scheme and host; the `Host`
    /// header is used to complete them.
    pub fn url(&self) -> String {
        if self.uri.scheme().is_some() && self.uri.authority().is_some() {
            return self.uri.to_string();
        }

        let path = self
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let host = self.header("host");

        if host.is_empty() {
            path.to_string()
        } else {
            format!("http://{host}{path}")
        }
    }
}
