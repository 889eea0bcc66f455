//! The session aggregate.
//!
//! A session is stored as a sequence of rows in an append-only log. Each
//! mutation writes the previous state again with `sign = -1` followed by the
//! new state with `sign = 1`, so summing `sign` per session converges to the
//! latest state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Sign of the authoritative row for a session.
pub const SIGN_STATE: i8 = 1;

/// Sign of a row cancelling a previously written state.
pub const SIGN_CANCEL: i8 = -1;

/// One visit of a visitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub sign: i8,
    /// Tenant
    pub client_id: u64,
    /// Fingerprint of the visitor
    pub visitor_id: u64,
    /// Random ID assigned on creation
    pub session_id: u32,
    /// Last time the session was touched
    pub time: DateTime<Utc>,
    /// Creation time
    pub start: DateTime<Utc>,
    pub duration_seconds: u32,
    pub entry_path: String,
    pub exit_path: String,
    pub page_views: u16,
    pub is_bounce: bool,
    pub entry_title: String,
    pub exit_title: String,
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
    /// Number of keep-alive calls that did not count as page views
    #[serde(default)]
    pub extended: u16,
}

impl Session {
    /// Returns a copy of this state that cancels it in the log.
    pub fn cancel(&self) -> Session {
        Session {
            sign: SIGN_CANCEL,
            ..self.clone()
        }
    }

    /// Returns true if the session was touched at or after `not_older_than`.
    pub fn is_active_since(&self, not_older_than: DateTime<Utc>) -> bool {
        self.time >= not_older_than
    }

    /// Returns true if the session was created within `window` before `now`.
    pub fn started_within(&self, now: DateTime<Utc>, window: Duration) -> bool {
        self.start >= now - window
    }
}

/// Seconds between two instants, clamped to zero.
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u32 {
    let secs = to.timestamp() - from.timestamp();
    secs.clamp(0, u32::MAX as i64) as u32
}
