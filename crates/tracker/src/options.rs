//! Per-call options for the tracking entry points.

use chrono::{DateTime, Utc};
use engine_core::limits::{MAX_PATH_LEN, MAX_TITLE_LEN};
use engine_core::util::shorten;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use url::Url;
use validator::Validate;

use crate::request::TrackingRequest;

/// Optional parameters of a page view, event or session extension.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Page URL; the request URL is used if empty
    pub url: String,
    /// Derived from the URL
    pub hostname: String,
    /// Overrides the URL path
    pub path: String,
    pub title: String,
    /// Overrides the referrer from the request
    pub referrer: String,
    pub screen_width: u16,
    pub screen_height: u16,
    /// Overrides the current time, e.g. for imports
    pub time: Option<DateTime<Utc>>,
    /// Overrides the configured page view quota
    pub max_page_views: Option<u16>,
    /// Stored on page views and merged into event metadata
    pub tags: BTreeMap<String, String>,
}

impl Options {
    /// Options from the query of a tracking request: `url`, `t`, `ref`,
    /// `w` and `h`.
    pub fn from_query(req: &TrackingRequest) -> Self {
        let url = req
            .query("url")
            .filter(|u| Url::parse(u).is_ok())
            .unwrap_or_default();

        Self {
            url,
            title: req.query_trimmed("t"),
            referrer: req.query_trimmed("ref"),
            screen_width: req.query("w").and_then(|w| w.parse().ok()).unwrap_or(0),
            screen_height: req.query("h").and_then(|h| h.parse().ok()).unwrap_or(0),
            ..Default::default()
        }
    }

    /// Completes url, hostname and path from the request and truncates
    /// title and path. The path is never empty afterwards.
    pub fn validate(&mut self, req: &TrackingRequest) {
        if self.url.is_empty() {
            self.url = req.url();
        }

        match Url::parse(&self.url) {
            Ok(mut url) => {
                self.hostname = url.host_str().unwrap_or_default().to_lowercase();

                if self.path.is_empty() {
                    self.path = url.path().to_string();
                } else {
                    url.set_path(&self.path);
                    self.url = url.to_string();
                }
            }
            Err(_) if self.path.is_empty() && self.url.starts_with('/') => {
                let end = self.url.find(['?', '#']).unwrap_or(self.url.len());
                self.path = self.url[..end].to_string();
            }
            Err(_) => {}
        }

        self.title = shorten(&self.title, MAX_TITLE_LEN);
        self.path = shorten(&self.path, MAX_PATH_LEN);

        if self.path.is_empty() {
            self.path = "/".to_string();
        }
    }

    /// Tag keys and values, trimmed, without empty entries, sorted by key.
    pub fn tags(&self) -> (Vec<String>, Vec<String>) {
        split(trimmed(&self.tags))
    }
}

/// Parameters of a custom event.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct EventOptions {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    /// Seconds, used for averages
    pub duration: u32,
    pub meta: HashMap<String, String>,
    /// Events that don't reflect user interaction, e.g. a video autoplay
    pub non_interactive: bool,
}

impl EventOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Trims the name and checks its length.
    pub fn prepare(&mut self) -> Result<(), validator::ValidationErrors> {
        self.name = self.name.trim().to_string();
        self.validate()
    }

    /// Metadata merged from tags and `meta`, `meta` winning on conflicts.
    pub fn meta_data(&self, tags: &BTreeMap<String, String>) -> (Vec<String>, Vec<String>) {
        let mut merged = trimmed(tags);
        merged.extend(trimmed(&self.meta));
        split(merged)
    }
}

fn trimmed<'a, I>(entries: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .collect()
}

fn split(entries: BTreeMap<String, String>) -> (Vec<String>, Vec<String>) {
    entries.into_iter().unzip()
}
