//! Referrer resolution and referrer spam detection.

use regex::Regex;
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::LazyLock;
use url::Url;

use crate::request::TrackingRequest;

/// Query parameters that may carry the referrer. The flag marks parameters
/// that only apply if no `Referer` header was sent.
const QUERY_PARAMS: [(&str, bool); 5] = [
    ("ref", false),
    ("referer", false),
    ("referrer", false),
    ("source", true),
    ("utm_source", true),
];

static IS_DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.*\.[a-zA-Z]+$").expect("invalid domain regex")
});

static SPAM_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?ix)
        free-?traffic|
        buttons-for|
        best-seo|
        seo-?offer|
        get-free|
        share-buttons|
        social-buttons|
        traffic2cash|
        make-money
    "#,
    )
    .expect("invalid referrer spam regex")
});

const SPAM_HOSTS: &[&str] = &[
    "semalt.com",
    "darodar.com",
    "ilovevitaly.com",
    "priceg.com",
    "hulfingtonpost.com",
    "econom.co",
    "blackhatworth.com",
    "savetubevideo.com",
];

/// Resolved referrer of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Referrer {
    /// Canonical URL without query and fragment
    pub url: String,
    /// Display name, usually the hostname
    pub name: String,
    pub icon: String,
}

pub trait ReferrerResolver: Send + Sync {
    /// Resolves the referrer, preferring `override_ref` if it is not empty.
    ///
    /// Referrers from `own_hostname` and IP addresses resolve to nothing.
    fn resolve(&self, req: &TrackingRequest, override_ref: &str, own_hostname: &str) -> Referrer;

    /// True if the referrer is a known spam source.
    fn is_spam(&self, req: &TrackingRequest) -> bool;
}

/// [`ReferrerResolver`] with a host blacklist and keyword patterns.
pub struct DefaultReferrerResolver {
    spam_hosts: HashSet<String>,
}

impl DefaultReferrerResolver {
    pub fn new() -> Self {
        Self {
            spam_hosts: SPAM_HOSTS.iter().map(|h| h.to_string()).collect(),
        }
    }

    /// Adds hosts to the spam blacklist. Subdomains are matched as well.
    pub fn with_spam_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.spam_hosts
            .extend(hosts.into_iter().map(|h| h.into().to_lowercase()));
        self
    }
}

impl Default for DefaultReferrerResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferrerResolver for DefaultReferrerResolver {
    fn resolve(&self, req: &TrackingRequest, override_ref: &str, own_hostname: &str) -> Referrer {
        let raw = if override_ref.is_empty() {
            from_header_or_query(req)
        } else {
            override_ref.trim().to_string()
        };

        if raw.is_empty() {
            return Referrer::default();
        }

        let parsed = if raw.to_lowercase().starts_with("http") {
            Url::parse(&raw).ok()
        } else if IS_DOMAIN.is_match(&raw) {
            Url::parse(&format!("https://{raw}")).ok()
        } else {
            None
        };

        let Some(mut url) = parsed.filter(|u| u.host_str().is_some()) else {
            if is_ip(&raw) {
                return Referrer::default();
            }

            // non-URL referrers, e.g. from utm_source
            return Referrer {
                name: raw,
                ..Default::default()
            };
        };

        let host = url.host_str().unwrap_or_default().to_lowercase();
        let hostname = engine_core::util::strip_www(&host).to_string();

        if hostname == engine_core::util::strip_www(own_hostname) || is_ip(&hostname) {
            return Referrer::default();
        }

        url.set_query(None);
        url.set_fragment(None);

        let mut canonical = url.to_string();

        if url.path() == "/" {
            canonical.pop();
        }

        Referrer {
            url: canonical,
            name: hostname,
            icon: String::new(),
        }
    }

    fn is_spam(&self, req: &TrackingRequest) -> bool {
        let raw = from_header_or_query(req);

        if raw.is_empty() {
            return false;
        }

        let host = match Url::parse(&raw) {
            Ok(url) => url.host_str().unwrap_or_default().to_lowercase(),
            Err(_) => raw.to_lowercase(),
        };
        let domain = registrable_domain(&host);

        self.spam_hosts.contains(domain) || SPAM_KEYWORDS.is_match(&host)
    }
}

fn from_header_or_query(req: &TrackingRequest) -> String {
    let header = req.referer().trim();

    for (param, prefer_header) in QUERY_PARAMS {
        if prefer_header && !header.is_empty() {
            continue;
        }

        if let Some(value) = req.query(param).filter(|v| !v.is_empty()) {
            return value;
        }
    }

    header.to_string()
}

/// Last two labels of a hostname.
fn registrable_domain(host: &str) -> &str {
    match host.rmatch_indices('.').nth(1) {
        Some((i, _)) => &host[i + 1..],
        None => host,
    }
}

fn is_ip(value: &str) -> bool {
    let value = value.trim_matches('/');

    if value.parse::<IpAddr>().is_ok() {
        return true;
    }

    // host:port and [v6]:port
    value.parse::<std::net::SocketAddr>().is_ok()
        || value
            .rsplit_once(':')
            .is_some_and(|(host, _)| host.parse::<IpAddr>().is_ok())
}
