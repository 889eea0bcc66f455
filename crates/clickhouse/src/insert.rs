//! Row types and batch insert helpers for ClickHouse.

use crate::client::ClickHouseClient;
use clickhouse::Row;
use engine_core::{DbErrorCode, Event, PageView, Request, Result, Session};
use serde::Serialize;
use telemetry::health;
use tracing::debug;

/// Table names.
pub mod tables {
    pub const SESSION: &str = "session";
    pub const PAGE_VIEW: &str = "page_view";
    pub const EVENT: &str = "event";
    pub const REQUEST: &str = "request";
}

/// Session state or cancel row.
#[derive(Debug, Clone, Row, Serialize)]
pub struct SessionRow {
    pub sign: i8,
    pub client_id: u64,
    pub visitor_id: u64,
    pub session_id: u32,
    pub time: i64, // DateTime64(3) as milliseconds
    pub start: i64,
    pub duration_seconds: u32,
    pub entry_path: String,
    pub exit_path: String,
    pub page_views: u16,
    pub is_bounce: u8,
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
    pub desktop: u8,
    pub mobile: u8,
    pub screen_class: String,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
    pub utm_content: String,
    pub utm_term: String,
    pub extended: u16,
}

impl From<&Session> for SessionRow {
    fn from(s: &Session) -> Self {
        Self {
            sign: s.sign,
            client_id: s.client_id,
            visitor_id: s.visitor_id,
            session_id: s.session_id,
            time: s.time.timestamp_millis(),
            start: s.start.timestamp_millis(),
            duration_seconds: s.duration_seconds,
            entry_path: s.entry_path.clone(),
            exit_path: s.exit_path.clone(),
            page_views: s.page_views,
            is_bounce: s.is_bounce as u8,
            entry_title: s.entry_title.clone(),
            exit_title: s.exit_title.clone(),
            language: s.language.clone(),
            country_code: s.country_code.clone(),
            region: s.region.clone(),
            city: s.city.clone(),
            referrer: s.referrer.clone(),
            referrer_name: s.referrer_name.clone(),
            referrer_icon: s.referrer_icon.clone(),
            os: s.os.clone(),
            os_version: s.os_version.clone(),
            browser: s.browser.clone(),
            browser_version: s.browser_version.clone(),
            desktop: s.desktop as u8,
            mobile: s.mobile as u8,
            screen_class: s.screen_class.clone(),
            utm_source: s.utm_source.clone(),
            utm_medium: s.utm_medium.clone(),
            utm_campaign: s.utm_campaign.clone(),
            utm_content: s.utm_content.clone(),
            utm_term: s.utm_term.clone(),
            extended: s.extended,
        }
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct PageViewRow {
    pub client_id: u64,
    pub visitor_id: u64,
    pub session_id: u32,
    pub time: i64,
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
    pub desktop: u8,
    pub mobile: u8,
    pub screen_class: String,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
    pub utm_content: String,
    pub utm_term: String,
    pub tag_keys: Vec<String>,
    pub tag_values: Vec<String>,
}

impl From<&PageView> for PageViewRow {
    fn from(p: &PageView) -> Self {
        Self {
            client_id: p.client_id,
            visitor_id: p.visitor_id,
            session_id: p.session_id,
            time: p.time.timestamp_millis(),
            duration_seconds: p.duration_seconds,
            path: p.path.clone(),
            title: p.title.clone(),
            language: p.language.clone(),
            country_code: p.country_code.clone(),
            region: p.region.clone(),
            city: p.city.clone(),
            referrer: p.referrer.clone(),
            referrer_name: p.referrer_name.clone(),
            referrer_icon: p.referrer_icon.clone(),
            os: p.os.clone(),
            os_version: p.os_version.clone(),
            browser: p.browser.clone(),
            browser_version: p.browser_version.clone(),
            desktop: p.desktop as u8,
            mobile: p.mobile as u8,
            screen_class: p.screen_class.clone(),
            utm_source: p.utm_source.clone(),
            utm_medium: p.utm_medium.clone(),
            utm_campaign: p.utm_campaign.clone(),
            utm_content: p.utm_content.clone(),
            utm_term: p.utm_term.clone(),
            tag_keys: p.tag_keys.clone(),
            tag_values: p.tag_values.clone(),
        }
    }
}

#[derive(Debug, Clone, Row, Serialize)]
pub struct EventRow {
    pub client_id: u64,
    pub visitor_id: u64,
    pub session_id: u32,
    pub time: i64,
    pub event_name: String,
    pub event_meta_keys: Vec<String>,
    pub event_meta_values: Vec<String>,
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
    pub desktop: u8,
    pub mobile: u8,
    pub screen_class: String,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
    pub utm_content: String,
    pub utm_term: String,
}

impl From<&Event> for EventRow {
    fn from(e: &Event) -> Self {
        Self {
            client_id: e.client_id,
            visitor_id: e.visitor_id,
            session_id: e.session_id,
            time: e.time.timestamp_millis(),
            event_name: e.name.clone(),
            event_meta_keys: e.meta_keys.clone(),
            event_meta_values: e.meta_values.clone(),
            duration_seconds: e.duration_seconds,
            path: e.path.clone(),
            title: e.title.clone(),
            language: e.language.clone(),
            country_code: e.country_code.clone(),
            region: e.region.clone(),
            city: e.city.clone(),
            referrer: e.referrer.clone(),
            referrer_name: e.referrer_name.clone(),
            referrer_icon: e.referrer_icon.clone(),
            os: e.os.clone(),
            os_version: e.os_version.clone(),
            browser: e.browser.clone(),
            browser_version: e.browser_version.clone(),
            desktop: e.desktop as u8,
            mobile: e.mobile as u8,
            screen_class: e.screen_class.clone(),
            utm_source: e.utm_source.clone(),
            utm_medium: e.utm_medium.clone(),
            utm_campaign: e.utm_campaign.clone(),
            utm_content: e.utm_content.clone(),
            utm_term: e.utm_term.clone(),
        }
    }
}

/// Diagnostic request row.
#[derive(Debug, Clone, Row, Serialize)]
pub struct RequestRow {
    pub client_id: u64,
    pub visitor_id: u64,
    pub time: i64,
    pub ip: String,
    pub user_agent: String,
    pub path: String,
    pub event_name: String,
    pub referrer: String,
    pub utm_source: String,
    pub utm_medium: String,
    pub utm_campaign: String,
    pub bot: u8,
    pub bot_reason: String,
}

impl From<&Request> for RequestRow {
    fn from(r: &Request) -> Self {
        Self {
            client_id: r.client_id,
            visitor_id: r.visitor_id,
            time: r.time.timestamp_millis(),
            ip: r.ip.clone(),
            user_agent: r.user_agent.clone(),
            path: r.path.clone(),
            event_name: r.event_name.clone(),
            referrer: r.referrer.clone(),
            utm_source: r.utm_source.clone(),
            utm_medium: r.utm_medium.clone(),
            utm_campaign: r.utm_campaign.clone(),
            bot: r.bot as u8,
            bot_reason: r.bot_reason.clone(),
        }
    }
}

/// Inserts rows into a table in a single batch.
///
/// Marks the ClickHouse component unhealthy on failure and healthy again
/// on the next successful insert.
pub async fn insert_rows<T>(client: &ClickHouseClient, table: &str, rows: Vec<T>) -> Result<usize>
where
    T: Row + Serialize,
{
    if rows.is_empty() {
        return Ok(0);
    }

    let count = rows.len();
    let start = std::time::Instant::now();

    let result = async {
        let mut insert = client.inner().insert::<T>(table)?;

        for row in &rows {
            insert.write(row).await?;
        }

        insert.end().await
    }
    .await;

    if let Err(e) = result {
        health().clickhouse.set_unhealthy(e.to_string());
        return Err(engine_core::Error::database(
            DbErrorCode::StoreFailed,
            format!("insert into {}: {}", table, e),
        ));
    }

    health().clickhouse.set_healthy();

    debug!(
        table = table,
        count = count,
        latency_ms = %start.elapsed().as_millis(),
        "Inserted rows to ClickHouse"
    );

    Ok(count)
}
