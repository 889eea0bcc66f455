//! Tests against real Redis and ClickHouse servers.
//!
//! Requires Docker, or the `SESSION_ENGINE_TEST_*_URL` variables pointing
//! at running servers. Run with `cargo test -- --ignored`.

use chrono::Duration;
use clickhouse_client::{init_schema, ClickHouseClient, ClickHouseConfig};
use integration_tests::containers::{ClickHouseContainer, RedisContainer};
use integration_tests::fixtures::{self, CLIENT_ID};
use integration_tests::setup::{test_config, TestContext};
use session_cache::{CacheConfig, CacheError, CacheKind, RedisCache, SessionCache};
use std::sync::Arc;
use tracker::{Options, Tracker};

fn redis_config(url: &str) -> CacheConfig {
    CacheConfig {
        kind: CacheKind::Redis,
        redis_url: url.to_string(),
        key_prefix: "it_".to_string(),
        lock_retries: 3,
        lock_retry_delay_ms: 10,
        ..Default::default()
    }
}

fn at(time: chrono::DateTime<chrono::Utc>) -> Options {
    Options {
        time: Some(time),
        ..Default::default()
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_lock_is_exclusive() {
    let redis = RedisContainer::start().await;
    let cache = RedisCache::connect(&redis_config(&redis.url))
        .await
        .expect("Failed to connect to Redis");
    cache.clear().await;

    let held = cache.lock(1, 99).await.expect("First lock failed");

    match cache.lock(1, 99).await {
        Err(CacheError::LockTimeout { attempts, .. }) => assert_eq!(attempts, 3),
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("lock must be exclusive"),
    }

    // other keys are independent
    cache.lock(1, 100).await.expect("Other key locked").unlock().await;

    held.unlock().await;
    cache.lock(1, 99).await.expect("Lock after release").unlock().await;
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_tracker_with_redis_cache() {
    let redis = RedisContainer::start().await;
    let cache: Arc<dyn SessionCache> = Arc::new(
        RedisCache::connect(&redis_config(&redis.url))
            .await
            .expect("Failed to connect to Redis"),
    );
    cache.clear().await;

    let ctx = TestContext::with_builder(test_config(), |b| b.session_cache(cache.clone()));
    let t0 = fixtures::noon();

    assert!(ctx.tracker.page_view(&fixtures::page("/"), CLIENT_ID, at(t0)).await);
    assert!(
        ctx.tracker
            .page_view(&fixtures::page("/b"), CLIENT_ID, at(t0 + Duration::seconds(5)))
            .await
    );
    ctx.flush().await;

    let sums = ctx.store.sign_sums();
    assert_eq!(sums.len(), 1);
    assert_eq!(ctx.store.sessions().len(), 3);

    // a second tracker sharing the cache continues the same session
    let other = TestContext::with_builder(test_config(), |b| b.session_cache(cache.clone()));
    assert!(
        other
            .tracker
            .page_view(&fixtures::page("/c"), CLIENT_ID, at(t0 + Duration::seconds(10)))
            .await
    );
    other.flush().await;

    let continued = other.store.sessions();
    assert_eq!(continued.len(), 2);
    assert_eq!(continued[1].page_views, 3);
    assert!(sums.contains_key(&continued[1].session_id));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_clickhouse_store_collapses_sessions() {
    let container = ClickHouseContainer::start().await;
    let clickhouse = Arc::new(
        ClickHouseClient::new(ClickHouseConfig {
            url: container.url.clone(),
            database: container.database.clone(),
            ..Default::default()
        })
        .expect("Failed to create ClickHouse client"),
    );
    init_schema(&clickhouse).await.expect("Failed to initialize schema");

    let client_id = rand_client_id();
    let tracker = Tracker::builder(test_config(), clickhouse.clone())
        .build()
        .expect("Failed to build tracker");
    let t0 = fixtures::noon();

    for (i, path) in ["/", "/a", "/b"].iter().enumerate() {
        let time = t0 + Duration::seconds(i as i64 * 10);
        assert!(tracker.page_view(&fixtures::page(path), client_id, at(time)).await);
    }
    tracker.stop().await.expect("Failed to write rows");

    let sign: i64 = clickhouse
        .inner()
        .query("SELECT toInt64(sum(sign)) FROM session WHERE client_id = ?")
        .bind(client_id)
        .fetch_one()
        .await
        .expect("Sign query failed");
    assert_eq!(sign, 1);

    let page_views: u64 = clickhouse
        .inner()
        .query("SELECT toUInt64(sum(page_views * sign)) FROM session WHERE client_id = ?")
        .bind(client_id)
        .fetch_one()
        .await
        .expect("Page view query failed");
    assert_eq!(page_views, 3);

    let rows: u64 = clickhouse
        .inner()
        .query("SELECT count() FROM page_view WHERE client_id = ?")
        .bind(client_id)
        .fetch_one()
        .await
        .expect("Count query failed");
    assert_eq!(rows, 3);
}

fn rand_client_id() -> u64 {
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64
}
