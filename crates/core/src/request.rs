//! Diagnostic record for requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A request that was either ignored (`bot = true`) or started a new session.
///
/// These rows are advisory and only used to tune bot detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub client_id: u64,
    pub visitor_id: u64,
    pub time: DateTime<Utc>,
    /// Only set if IP logging is enabled
    pub ip: String,
    pub user_agent: String,
    pub path: String,
    pub event_name: String,
    pub referrer: String,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
    pub bot: bool,
    pub bot_reason: String,
}
