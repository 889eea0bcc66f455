//! Request classification.
//!
//! Decides whether a request is counted and resolves the visitor's
//! User-Agent and IP on the way.

use engine_core::limits::{MAX_USER_AGENT_LEN, MIN_USER_AGENT_LEN};
use engine_core::util::contains_non_ascii;
use regex::Regex;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, LazyLock};

use crate::config::MinBrowserVersions;
use crate::ip::{IpExtractor, IpFilter};
use crate::referrer::ReferrerResolver;
use crate::request::TrackingRequest;
use crate::ua::{UserAgent, UserAgentParser};

static UA_KEYWORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?ix)
        bot|
        crawl|
        spider|
        slurp|
        scrap|
        headless|
        phantomjs|
        lighthouse|
        pingdom|
        uptime|
        monitor|
        preview|
        facebookexternalhit|
        curl/|
        wget/|
        python-requests|
        python-urllib|
        go-http-client|
        java/|
        okhttp|
        axios/|
        node-fetch|
        httpclient|
        postman
    "#,
    )
    .expect("invalid user agent keyword regex")
});

/// Why a request was not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// `DNT: 1`
    DoNotTrack,
    /// Browser prefetch or link preview
    Prefetch,
    /// Empty, too short, too long or non-ASCII User-Agent
    UserAgentChars,
    /// User-Agent is an IP address
    UserAgentIp,
    /// User-Agent is a UUID
    UserAgentUuid,
    /// Referrer spam
    Referrer,
    /// Browser below the minimum version
    Browser,
    /// Known crawler
    UserAgentBot,
    /// User-Agent contains a bot keyword
    UserAgentKeyword,
    /// Filtered client IP
    Ip,
}

impl IgnoreReason {
    /// Code stored on diagnostic rows.
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreReason::DoNotTrack => "dnt",
            IgnoreReason::Prefetch => "prefetch",
            IgnoreReason::UserAgentChars => "ua-chars",
            IgnoreReason::UserAgentIp => "ua-ip",
            IgnoreReason::UserAgentUuid => "ua-uuid",
            IgnoreReason::Referrer => "referrer",
            IgnoreReason::Browser => "browser",
            IgnoreReason::UserAgentBot => "ua-bot",
            IgnoreReason::UserAgentKeyword => "ua-keyword",
            IgnoreReason::Ip => "ip",
        }
    }
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification result.
#[derive(Debug, Clone)]
pub struct Visitor {
    /// Raw `User-Agent` header, input of the fingerprint
    pub raw_user_agent: String,
    /// Parsed fields, empty for ignored requests
    pub user_agent: UserAgent,
    /// Client IP, empty if unknown
    pub ip: String,
    pub ignore: Option<IgnoreReason>,
}

impl Visitor {
    fn ignored(raw_user_agent: &str, ip: String, reason: IgnoreReason) -> Self {
        Self {
            raw_user_agent: raw_user_agent.to_string(),
            user_agent: UserAgent::default(),
            ip,
            ignore: Some(reason),
        }
    }
}

/// Runs the ignore checks in order and stops at the first match.
pub struct Classifier {
    ua_parser: Arc<dyn UserAgentParser>,
    referrer: Arc<dyn ReferrerResolver>,
    ip_extractor: Arc<dyn IpExtractor>,
    ip_filter: Option<Arc<dyn IpFilter>>,
    min_versions: MinBrowserVersions,
}

impl Classifier {
    pub fn new(
        ua_parser: Arc<dyn UserAgentParser>,
        referrer: Arc<dyn ReferrerResolver>,
        ip_extractor: Arc<dyn IpExtractor>,
        ip_filter: Option<Arc<dyn IpFilter>>,
        min_versions: MinBrowserVersions,
    ) -> Self {
        Self {
            ua_parser,
            referrer,
            ip_extractor,
            ip_filter,
            min_versions,
        }
    }

    pub fn classify(&self, req: &TrackingRequest) -> Visitor {
        let client_ip = self.ip_extractor.client_ip(req);
        let ip = client_ip.map(|ip| ip.to_string()).unwrap_or_default();
        let raw = req.user_agent();

        if req.header("dnt").trim() == "1" {
            return Visitor::ignored(raw, ip, IgnoreReason::DoNotTrack);
        }

        if is_prefetch(req) {
            return Visitor::ignored(raw, ip, IgnoreReason::Prefetch);
        }

        let normalized = raw.trim().to_lowercase();

        if normalized.is_empty()
            || normalized.len() <= MIN_USER_AGENT_LEN
            || normalized.len() > MAX_USER_AGENT_LEN
            || contains_non_ascii(&normalized)
        {
            return Visitor::ignored(raw, ip, IgnoreReason::UserAgentChars);
        }

        if is_ip_like(raw.trim()) {
            return Visitor::ignored(raw, ip, IgnoreReason::UserAgentIp);
        }

        if uuid::Uuid::parse_str(raw.trim()).is_ok() {
            return Visitor::ignored(raw, ip, IgnoreReason::UserAgentUuid);
        }

        if self.referrer.is_spam(req) {
            return Visitor::ignored(raw, ip, IgnoreReason::Referrer);
        }

        let user_agent = self.ua_parser.parse(raw);

        if self.is_outdated(&user_agent) {
            return Visitor::ignored(raw, ip, IgnoreReason::Browser);
        }

        if user_agent.crawler {
            return Visitor::ignored(raw, ip, IgnoreReason::UserAgentBot);
        }

        if UA_KEYWORDS.is_match(&normalized) {
            return Visitor::ignored(raw, ip, IgnoreReason::UserAgentKeyword);
        }

        if let Some(filter) = &self.ip_filter {
            // Without a client address there is nothing to match.
            if client_ip.is_some_and(|addr| filter.is_ignored(&addr)) {
                return Visitor::ignored(raw, ip, IgnoreReason::Ip);
            }
        }

        Visitor {
            raw_user_agent: raw.to_string(),
            user_agent,
            ip,
            ignore: None,
        }
    }

    fn is_outdated(&self, user_agent: &UserAgent) -> bool {
        if user_agent.browser_version.is_empty() {
            return false;
        }

        let Some(min) = self.min_versions.for_browser(&user_agent.browser) else {
            return false;
        };

        let major = user_agent
            .browser_version
            .split('.')
            .next()
            .unwrap_or_default();

        major.parse::<u32>().is_ok_and(|v| v < min)
    }
}

fn is_prefetch(req: &TrackingRequest) -> bool {
    let x_purpose = req.header("x-purpose");
    let purpose = req.header("purpose");

    req.header("x-moz") == "prefetch"
        || matches!(x_purpose, "prefetch" | "preview")
        || matches!(purpose, "prefetch" | "preview")
}

/// True for `1.2.3.4`, `1.2.3.4:80`, `::1` and `[::1]:80`.
fn is_ip_like(value: &str) -> bool {
    value.parse::<IpAddr>().is_ok()
        || value.parse::<SocketAddr>().is_ok()
        || value
            .rsplit_once(':')
            .is_some_and(|(host, _)| host.parse::<IpAddr>().is_ok())
}
