//! ClickHouse table schemas.
//!
//! Sessions collapse on `sign`: a cancel row (-1) and the state row it
//! repeats share the sorting key and cancel out on merge.

use crate::insert::tables;

pub fn create_database(database: &str) -> String {
    format!("CREATE DATABASE IF NOT EXISTS {database}")
}

pub fn create_session_table(database: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {database}.{table} (
    sign Int8,
    client_id UInt64,
    visitor_id UInt64,
    session_id UInt32,
    time DateTime64(3),
    start DateTime64(3),
    duration_seconds UInt32,
    entry_path String,
    exit_path String,
    page_views UInt16,
    is_bounce UInt8,
    entry_title String,
    exit_title String,
    language LowCardinality(String),
    country_code LowCardinality(FixedString(2)),
    region LowCardinality(String),
    city LowCardinality(String),
    referrer String,
    referrer_name String,
    referrer_icon String,
    os LowCardinality(String),
    os_version LowCardinality(String),
    browser LowCardinality(String),
    browser_version LowCardinality(String),
    desktop UInt8,
    mobile UInt8,
    screen_class LowCardinality(String),
    utm_source String,
    utm_medium String,
    utm_campaign String,
    utm_content String,
    utm_term String,
    extended UInt16 DEFAULT 0
)
ENGINE = CollapsingMergeTree(sign)
PARTITION BY toYYYYMM(time)
ORDER BY (client_id, visitor_id, session_id, time)
SETTINGS index_granularity = 8192
"#,
        table = tables::SESSION
    )
}

pub fn create_page_view_table(database: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {database}.{table} (
    client_id UInt64,
    visitor_id UInt64,
    session_id UInt32,
    time DateTime64(3),
    duration_seconds UInt32,
    path String,
    title String,
    language LowCardinality(String),
    country_code LowCardinality(FixedString(2)),
    region LowCardinality(String),
    city LowCardinality(String),
    referrer String,
    referrer_name String,
    referrer_icon String,
    os LowCardinality(String),
    os_version LowCardinality(String),
    browser LowCardinality(String),
    browser_version LowCardinality(String),
    desktop UInt8,
    mobile UInt8,
    screen_class LowCardinality(String),
    utm_source String,
    utm_medium String,
    utm_campaign String,
    utm_content String,
    utm_term String,
    tag_keys Array(String),
    tag_values Array(String)
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(time)
ORDER BY (client_id, visitor_id, session_id, time)
SETTINGS index_granularity = 8192
"#,
        table = tables::PAGE_VIEW
    )
}

pub fn create_event_table(database: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {database}.{table} (
    client_id UInt64,
    visitor_id UInt64,
    session_id UInt32,
    time DateTime64(3),
    event_name String,
    event_meta_keys Array(String),
    event_meta_values Array(String),
    duration_seconds UInt32,
    path String,
    title String,
    language LowCardinality(String),
    country_code LowCardinality(FixedString(2)),
    region LowCardinality(String),
    city LowCardinality(String),
    referrer String,
    referrer_name String,
    referrer_icon String,
    os LowCardinality(String),
    os_version LowCardinality(String),
    browser LowCardinality(String),
    browser_version LowCardinality(String),
    desktop UInt8,
    mobile UInt8,
    screen_class LowCardinality(String),
    utm_source String,
    utm_medium String,
    utm_campaign String,
    utm_content String,
    utm_term String
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(time)
ORDER BY (client_id, visitor_id, session_id, time)
SETTINGS index_granularity = 8192
"#,
        table = tables::EVENT
    )
}

/// Diagnostic rows expire after 30 days.
pub fn create_request_table(database: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {database}.{table} (
    client_id UInt64,
    visitor_id UInt64,
    time DateTime64(3),
    ip String,
    user_agent String,
    path String,
    event_name String,
    referrer String,
    utm_source String,
    utm_medium String,
    utm_campaign String,
    bot UInt8,
    bot_reason LowCardinality(String)
)
ENGINE = MergeTree()
PARTITION BY toYYYYMM(time)
ORDER BY (client_id, time)
TTL toDateTime(time) + INTERVAL 30 DAY
SETTINGS index_granularity = 8192
"#,
        table = tables::REQUEST
    )
}

/// All DDL in execution order.
pub fn all_tables(database: &str) -> Vec<String> {
    vec![
        create_database(database),
        create_session_table(database),
        create_page_view_table(database),
        create_event_table(database),
        create_request_table(database),
    ]
}
