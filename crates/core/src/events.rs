//! Immutable interaction records derived from a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::Session;

/// A single page visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageView {
    pub client_id: u64,
    pub visitor_id: u64,
    pub session_id: u32,
    pub time: DateTime<Utc>,
    /// Time spent on the previous page
    pub duration_seconds: u32,
    pub path: String,
    pub title: String,
    pub language: String,
    pub country_code: String,
    pub region: String,
    pub city: String,
    pub referrer: String,
    pub referrer_name: String,
    pub referrer_icon: String,
    pub os: String,
    pub os_version: String,
    pub browser: String,
    pub browser_version: String,
    pub desktop: bool,
    pub mobile: bool,
    pub screen_class: String,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
    pub utm_content: String,
    pub utm_term: String,
    pub tag_keys: Vec<String>,
    pub tag_values: Vec<String>,
}

impl PageView {
    /// Builds a page view for the current exit page of a session.
    pub fn from_session(
        session: &Session,
        time_on_page: u32,
        tag_keys: Vec<String>,
        tag_values: Vec<String>,
    ) -> Self {
        Self {
            client_id: session.client_id,
            visitor_id: session.visitor_id,
            session_id: session.session_id,
            time: session.time,
            duration_seconds: time_on_page,
            path: session.exit_path.clone(),
            title: session.exit_title.clone(),
            language: session.language.clone(),
            country_code: session.country_code.clone(),
            region: session.region.clone(),
            city: session.city.clone(),
            referrer: session.referrer.clone(),
            referrer_name: session.referrer_name.clone(),
            referrer_icon: session.referrer_icon.clone(),
            os: session.os.clone(),
            os_version: session.os_version.clone(),
            browser: session.browser.clone(),
            browser_version: session.browser_version.clone(),
            desktop: session.desktop,
            mobile: session.mobile,
            screen_class: session.screen_class.clone(),
            utm_source: session.utm_source.clone(),
            utm_medium: session.utm_medium.clone(),
            utm_campaign: session.utm_campaign.clone(),
            utm_content: session.utm_content.clone(),
            utm_term: session.utm_term.clone(),
            tag_keys,
            tag_values,
        }
    }
}

/// A custom event, e.g. a sign-up or a download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub client_id: u64,
    pub visitor_id: u64,
    pub session_id: u32,
    pub time: DateTime<Utc>,
    pub name: String,
    pub meta_keys: Vec<String>,
    pub meta_values: Vec<String>,
    pub duration_seconds: u32,
    pub path: String,
    pub title: String,
    pub language: String,
    pub country_code: String,
    pub region: String,
    pub city: String,
    pub referrer: String,
    pub referrer_name: String,
    pub referrer_icon: String,
    pub os: String,
    pub os_version: String,
    pub browser: String,
    pub browser_version: String,
    pub desktop: bool,
    pub mobile: bool,
    pub screen_class: String,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
    pub utm_content: String,
    pub utm_term: String,
}

impl Event {
    /// Builds an event on the current exit page of a session.
    pub fn from_session(
        session: &Session,
        name: impl Into<String>,
        duration_seconds: u32,
        meta_keys: Vec<String>,
        meta_values: Vec<String>,
    ) -> Self {
        Self {
            client_id: session.client_id,
            visitor_id: session.visitor_id,
            session_id: session.session_id,
            time: session.time,
            name: name.into(),
            meta_keys,
            meta_values,
            duration_seconds,
            path: session.exit_path.clone(),
            title: session.exit_title.clone(),
            language: session.language.clone(),
            country_code: session.country_code.clone(),
            region: session.region.clone(),
            city: session.city.clone(),
            referrer: session.referrer.clone(),
            referrer_name: session.referrer_name.clone(),
            referrer_icon: session.referrer_icon.clone(),
            os: session.os.clone(),
            os_version: session.os_version.clone(),
            browser: session.browser.clone(),
            browser_version: session.browser_version.clone(),
            desktop: session.desktop,
            mobile: session.mobile,
            screen_class: session.screen_class.clone(),
            utm_source: session.utm_source.clone(),
            utm_medium: session.utm_medium.clone(),
            utm_campaign: session.utm_campaign.clone(),
            utm_content: session.utm_content.clone(),
            utm_term: session.utm_term.clone(),
        }
    }
}
