//! Session tracking scenarios over the real tracker.
//!
//! Every test runs the classifier, fingerprint, in-process session cache
//! and pipeline, and inspects the rows that reach the mock store.

use chrono::Duration;
use integration_tests::fixtures::{self, RequestBuilder, CLIENT_ID, HOST};
use integration_tests::mocks::StaticGeo;
use integration_tests::setup::{test_config, TestContext};
use std::sync::Arc;
use tracker::{EventOptions, IpList, Location, Options, TrackerConfig};

fn at(time: chrono::DateTime<chrono::Utc>) -> Options {
    Options {
        time: Some(time),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_page_views_extend_and_event_form_one_session() {
    let ctx = TestContext::new();
    let t0 = fixtures::noon();

    assert!(ctx.tracker.page_view(&fixtures::page("/"), CLIENT_ID, at(t0)).await);
    assert!(
        ctx.tracker
            .page_view(&fixtures::page("/pricing"), CLIENT_ID, at(t0 + Duration::seconds(5)))
            .await
    );
    assert!(
        ctx.tracker
            .extend_session(&fixtures::page("/pricing"), CLIENT_ID, at(t0 + Duration::seconds(35)))
            .await
    );
    assert!(
        ctx.tracker
            .event(
                &fixtures::page("/pricing"),
                CLIENT_ID,
                EventOptions::new("signup"),
                at(t0 + Duration::seconds(40)),
            )
            .await
    );

    ctx.flush().await;

    let sessions = ctx.store.sessions();
    let signs: Vec<i8> = sessions.iter().map(|s| s.sign).collect();
    assert_eq!(signs, vec![1, -1, 1, -1, 1, -1, 1]);

    let sums = ctx.store.sign_sums();
    assert_eq!(sums.len(), 1, "all rows belong to one session");
    assert_eq!(sums.values().copied().collect::<Vec<_>>(), vec![1]);

    let extended = &sessions[4];
    assert_eq!(extended.extended, 1);
    assert_eq!(extended.page_views, 2);
    assert_eq!(extended.time, t0 + Duration::seconds(35));

    let last = sessions.last().unwrap();
    assert_eq!(last.entry_path, "/");
    assert_eq!(last.exit_path, "/pricing");
    assert_eq!(last.page_views, 2);
    assert_eq!(last.extended, 1);
    assert!(!last.is_bounce);
    assert_eq!(last.duration_seconds, 40);
    assert_eq!(last.time, t0 + Duration::seconds(35) + Duration::milliseconds(1));
    assert_eq!(last.browser, "Chrome");
    assert_eq!(last.language, "de");

    let page_views = ctx.store.page_views();
    assert_eq!(page_views.len(), 2);
    assert_eq!(page_views[0].path, "/");
    assert_eq!(page_views[1].path, "/pricing");
    assert_eq!(page_views[1].duration_seconds, 5);

    let events = ctx.store.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "signup");
    assert_eq!(events[0].path, "/pricing");
    assert_eq!(events[0].session_id, last.session_id);

    // one diagnostic row for the new session
    let requests = ctx.store.requests();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].bot);
    assert!(requests[0].ip.is_empty());
}

#[tokio::test]
async fn test_reload_keeps_bounce() {
    let ctx = TestContext::new();
    let t0 = fixtures::noon();

    assert!(ctx.tracker.page_view(&fixtures::page("/"), CLIENT_ID, at(t0)).await);
    assert!(
        ctx.tracker
            .page_view(&fixtures::page("/"), CLIENT_ID, at(t0 + Duration::seconds(5)))
            .await
    );
    ctx.flush().await;

    let sessions = ctx.store.sessions();
    assert_eq!(sessions.len(), 3);
    assert_eq!(sessions[2].page_views, 1);
    assert!(sessions[2].is_bounce);

    // the reload only updates the session
    assert_eq!(ctx.store.page_views().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_page_views_are_serialized() {
    let ctx = TestContext::new();
    let t0 = fixtures::noon();
    let n = 50;

    let handles: Vec<_> = (0..n)
        .map(|i| {
            let tracker = ctx.tracker.clone();
            tokio::spawn(async move {
                let req = fixtures::page(&format!("/page/{i}"));
                tracker.page_view(&req, CLIENT_ID, at(t0)).await
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap());
    }

    ctx.flush().await;

    let sums = ctx.store.sign_sums();
    assert_eq!(sums.len(), 1, "concurrent hits must not fork the session");
    assert_eq!(sums.values().copied().collect::<Vec<_>>(), vec![1]);

    let sessions = ctx.store.sessions();
    assert_eq!(sessions.len(), 2 * n - 1);
    assert_eq!(ctx.store.page_views().len(), n);

    let latest = ctx.store.latest_states();
    assert_eq!(latest.values().map(|s| s.page_views).max(), Some(n as u16));
}

#[tokio::test]
async fn test_page_view_quota() {
    let ctx = TestContext::with_config(TrackerConfig {
        max_page_views: 3,
        ..test_config()
    });
    let t0 = fixtures::noon();

    for (i, path) in ["/a", "/b", "/c"].iter().enumerate() {
        let time = t0 + Duration::seconds(i as i64);
        assert!(ctx.tracker.page_view(&fixtures::page(path), CLIENT_ID, at(time)).await);
    }

    assert!(
        !ctx.tracker
            .page_view(&fixtures::page("/d"), CLIENT_ID, at(t0 + Duration::seconds(3)))
            .await
    );

    // the per-call override wins over the configured quota
    let options = Options {
        max_page_views: Some(10),
        ..at(t0 + Duration::seconds(4))
    };
    assert!(ctx.tracker.page_view(&fixtures::page("/e"), CLIENT_ID, options).await);

    ctx.flush().await;

    assert_eq!(ctx.store.page_views().len(), 4);
    let latest = ctx.store.latest_states();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest.values().next().unwrap().page_views, 4);
}

#[tokio::test]
async fn test_new_referrer_starts_new_session() {
    let ctx = TestContext::new();
    let t0 = fixtures::noon();

    assert!(ctx.tracker.page_view(&fixtures::page("/"), CLIENT_ID, at(t0)).await);

    let req = RequestBuilder::page("/blog")
        .referer("https://duckduckgo.com/")
        .build();
    assert!(ctx.tracker.page_view(&req, CLIENT_ID, at(t0 + Duration::seconds(5))).await);

    ctx.flush().await;

    let sessions = ctx.store.sessions();
    assert_eq!(sessions.len(), 3);
    assert_eq!(sessions[1].sign, -1);
    assert_eq!(sessions[1].session_id, sessions[0].session_id);
    assert_ne!(sessions[2].session_id, sessions[0].session_id);

    let sums = ctx.store.sign_sums();
    assert_eq!(sums[&sessions[0].session_id], 0);
    assert_eq!(sums[&sessions[2].session_id], 1);

    let current = &sessions[2];
    assert_eq!(current.referrer, "https://duckduckgo.com");
    assert_eq!(current.referrer_name, "duckduckgo.com");
    assert_eq!(current.entry_path, "/blog");
    assert_eq!(current.page_views, 1);

    // both sessions were created
    assert_eq!(ctx.store.requests().len(), 2);
}

#[tokio::test]
async fn test_long_referrer_keeps_one_session() {
    let ctx = TestContext::new();
    let t0 = fixtures::noon();
    let referer = format!("https://news.example.org/{}", "a".repeat(250));

    let req = RequestBuilder::page("/").referer(&referer).build();
    assert!(ctx.tracker.page_view(&req, CLIENT_ID, at(t0)).await);

    let req = RequestBuilder::page("/").referer(&referer).build();
    assert!(
        ctx.tracker
            .event(
                &req,
                CLIENT_ID,
                EventOptions::new("click"),
                at(t0 + Duration::seconds(5)),
            )
            .await
    );

    ctx.flush().await;

    let sums = ctx.store.sign_sums();
    assert_eq!(sums.len(), 1, "the same referrer must not start a new session");
    assert_eq!(sums.values().copied().collect::<Vec<_>>(), vec![1]);

    let last = ctx.store.sessions().last().cloned().unwrap();
    assert_eq!(last.referrer.chars().count(), 200);
    assert_eq!(ctx.store.requests().len(), 1);
}

#[tokio::test]
async fn test_self_referral_continues_session() {
    let ctx = TestContext::new();
    let t0 = fixtures::noon();

    assert!(ctx.tracker.page_view(&fixtures::page("/"), CLIENT_ID, at(t0)).await);

    let req = RequestBuilder::page("/docs")
        .referer(&format!("https://www.{HOST}/"))
        .build();
    assert!(ctx.tracker.page_view(&req, CLIENT_ID, at(t0 + Duration::seconds(5))).await);

    ctx.flush().await;
    assert_eq!(ctx.store.sign_sums().len(), 1);
}

#[tokio::test]
async fn test_extend_session() {
    let ctx = TestContext::new();
    let t0 = fixtures::noon();

    // nothing to extend yet
    assert!(!ctx.tracker.extend_session(&fixtures::page("/"), CLIENT_ID, at(t0)).await);

    assert!(ctx.tracker.page_view(&fixtures::page("/"), CLIENT_ID, at(t0)).await);
    assert!(
        ctx.tracker
            .extend_session(&fixtures::page("/other"), CLIENT_ID, at(t0 + Duration::seconds(60)))
            .await
    );

    ctx.flush().await;

    let sessions = ctx.store.sessions();
    assert_eq!(sessions.len(), 3);

    let extended = &sessions[2];
    assert_eq!(extended.extended, 1);
    assert_eq!(extended.page_views, 1);
    assert_eq!(extended.exit_path, "/");
    assert!(extended.is_bounce);
    assert_eq!(extended.duration_seconds, 60);
    assert_eq!(extended.time, t0 + Duration::seconds(60));

    assert_eq!(ctx.store.page_views().len(), 1);
}

#[tokio::test]
async fn test_session_expires() {
    let ctx = TestContext::new();
    let t0 = fixtures::noon();

    assert!(ctx.tracker.page_view(&fixtures::page("/"), CLIENT_ID, at(t0)).await);
    assert!(
        ctx.tracker
            .page_view(&fixtures::page("/"), CLIENT_ID, at(t0 + Duration::minutes(31)))
            .await
    );

    ctx.flush().await;

    let sessions = ctx.store.sessions();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s.sign == 1));
    assert_ne!(sessions[0].session_id, sessions[1].session_id);
}

#[tokio::test]
async fn test_session_continues_across_midnight() {
    let ctx = TestContext::new();
    let before = fixtures::noon() + Duration::hours(11) + Duration::minutes(55);
    let after = before + Duration::minutes(10);
    assert_ne!(before.date_naive(), after.date_naive());

    assert!(ctx.tracker.page_view(&fixtures::page("/"), CLIENT_ID, at(before)).await);
    assert!(ctx.tracker.page_view(&fixtures::page("/b"), CLIENT_ID, at(after)).await);

    ctx.flush().await;

    let sums = ctx.store.sign_sums();
    assert_eq!(sums.len(), 1);

    let sessions = ctx.store.sessions();
    assert_eq!(sessions.len(), 3);
    assert_eq!(sessions[2].page_views, 2);
    assert_eq!(sessions[2].visitor_id, sessions[0].visitor_id);
    assert_eq!(ctx.store.requests().len(), 1);
}

#[tokio::test]
async fn test_tenants_are_isolated() {
    let ctx = TestContext::new();
    let t0 = fixtures::noon();

    assert!(ctx.tracker.page_view(&fixtures::page("/"), 1, at(t0)).await);
    assert!(ctx.tracker.page_view(&fixtures::page("/"), 2, at(t0)).await);
    ctx.flush().await;

    let sessions = ctx.store.sessions();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|s| s.sign == 1));
    assert_eq!(sessions[0].visitor_id, sessions[1].visitor_id);
}

#[tokio::test]
async fn test_different_browsers_are_different_visitors() {
    let ctx = TestContext::new();
    let t0 = fixtures::noon();

    assert!(ctx.tracker.page_view(&fixtures::page("/"), CLIENT_ID, at(t0)).await);

    let firefox = RequestBuilder::page("/")
        .user_agent(fixtures::FIREFOX_UA)
        .build();
    assert!(ctx.tracker.page_view(&firefox, CLIENT_ID, at(t0)).await);

    ctx.flush().await;

    let sessions = ctx.store.sessions();
    assert_eq!(sessions.len(), 2);
    assert_ne!(sessions[0].visitor_id, sessions[1].visitor_id);
    assert_eq!(sessions[1].browser, "Firefox");
}

#[tokio::test]
async fn test_ignored_requests_are_recorded_as_diagnostics() {
    let ctx = TestContext::new();
    let t0 = fixtures::noon();

    let bot = RequestBuilder::page("/?utm_source=%20ads%20")
        .user_agent(fixtures::BOT_UA)
        .build();
    assert!(!ctx.tracker.page_view(&bot, CLIENT_ID, at(t0)).await);

    let dnt = RequestBuilder::page("/").header("dnt", "1").build();
    assert!(!ctx.tracker.page_view(&dnt, CLIENT_ID, at(t0)).await);

    let short = RequestBuilder::page("/").user_agent("curl").build();
    assert!(
        !ctx.tracker
            .event(&short, CLIENT_ID, EventOptions::new("download"), at(t0))
            .await
    );

    ctx.flush().await;

    assert!(ctx.store.sessions().is_empty());
    assert!(ctx.store.page_views().is_empty());
    assert!(ctx.store.events().is_empty());

    let requests = ctx.store.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r.bot));
    assert!(["ua-bot", "ua-keyword"].contains(&requests[0].bot_reason.as_str()));
    assert_eq!(requests[0].utm_source, "ads");
    assert_eq!(requests[1].bot_reason, "dnt");
    assert_eq!(requests[2].bot_reason, "ua-chars");
    assert_eq!(requests[2].event_name, "download");
    assert!(requests.iter().all(|r| r.ip.is_empty()));
}

#[tokio::test]
async fn test_ip_is_logged_when_enabled() {
    let ctx = TestContext::with_config(TrackerConfig {
        log_ip: true,
        ..test_config()
    });

    assert!(ctx.tracker.page_view(&fixtures::page("/"), CLIENT_ID, at(fixtures::noon())).await);
    ctx.flush().await;

    let requests = ctx.store.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].ip, fixtures::visitor_ip().to_string());
}

#[tokio::test]
async fn test_ip_filter() {
    let list = Arc::new(IpList::new());
    list.update(vec![fixtures::visitor_ip()], Vec::new(), Vec::new());

    let ctx = TestContext::with_builder(test_config(), |b| b.ip_filter(list.clone()));
    let t0 = fixtures::noon();

    assert!(!ctx.tracker.page_view(&fixtures::page("/"), CLIENT_ID, at(t0)).await);

    let other = RequestBuilder::page("/").remote_addr("81.2.69.161").build();
    assert!(ctx.tracker.page_view(&other, CLIENT_ID, at(t0)).await);

    ctx.flush().await;

    assert_eq!(ctx.store.sessions().len(), 1);
    let bot_reasons: Vec<String> = ctx
        .store
        .requests()
        .into_iter()
        .filter(|r| r.bot)
        .map(|r| r.bot_reason)
        .collect();
    assert_eq!(bot_reasons, vec!["ip".to_string()]);
}

#[tokio::test]
async fn test_geolocation() {
    let geo = Arc::new(StaticGeo(Location {
        country_code: "de".into(),
        region: "Berlin".into(),
        city: "Berlin".into(),
    }));
    let ctx = TestContext::with_builder(test_config(), |b| b.geo_locator(geo));

    assert!(ctx.tracker.page_view(&fixtures::page("/"), CLIENT_ID, at(fixtures::noon())).await);
    ctx.flush().await;

    let sessions = ctx.store.sessions();
    assert_eq!(sessions[0].country_code, "de");
    assert_eq!(sessions[0].city, "Berlin");
    assert_eq!(ctx.store.page_views()[0].city, "Berlin");
}

#[tokio::test]
async fn test_event_starts_session() {
    let ctx = TestContext::new();

    let mut event = EventOptions::new("  video_play  ");
    event.non_interactive = true;
    event.meta.insert("title".into(), "Intro".into());

    let mut options = at(fixtures::noon());
    options.tags.insert("author".into(), "kim".into());

    assert!(ctx.tracker.event(&fixtures::page("/watch"), CLIENT_ID, event, options).await);
    ctx.flush().await;

    let sessions = ctx.store.sessions();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].is_bounce);

    // the first hit also counts as a page view
    assert_eq!(ctx.store.page_views().len(), 1);

    let events = ctx.store.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "video_play");
    assert_eq!(events[0].meta_keys, vec!["author", "title"]);
    assert_eq!(events[0].meta_values, vec!["kim", "Intro"]);
}

#[tokio::test]
async fn test_invalid_event_name_is_rejected() {
    let ctx = TestContext::new();
    let t0 = fixtures::noon();

    assert!(
        !ctx.tracker
            .event(&fixtures::page("/"), CLIENT_ID, EventOptions::new("   "), at(t0))
            .await
    );
    assert!(
        !ctx.tracker
            .event(&fixtures::page("/"), CLIENT_ID, EventOptions::new("x".repeat(201)), at(t0))
            .await
    );

    ctx.flush().await;
    assert!(ctx.store.sessions().is_empty());
    assert!(ctx.store.requests().is_empty());
}

#[tokio::test]
async fn test_request_dropped_on_full_channel_leaves_no_trace() {
    let ctx = TestContext::with_config(TrackerConfig {
        worker_buffer_size: 1,
        ..test_config()
    });
    let t0 = fixtures::noon();
    let held = ctx.store.hold_writes().await;

    // The worker blocks writing the first bundle, the second fills the channel.
    assert!(ctx.tracker.page_view(&fixtures::page("/"), CLIENT_ID, at(t0)).await);
    assert!(
        ctx.tracker
            .page_view(&fixtures::page("/a"), CLIENT_ID, at(t0 + Duration::seconds(5)))
            .await
    );

    let dropped = tokio::time::timeout(
        std::time::Duration::from_millis(50),
        ctx.tracker
            .page_view(&fixtures::page("/b"), CLIENT_ID, at(t0 + Duration::seconds(10))),
    )
    .await;
    assert!(dropped.is_err(), "the third request must wait for channel capacity");

    drop(held);
    assert!(
        ctx.tracker
            .page_view(&fixtures::page("/c"), CLIENT_ID, at(t0 + Duration::seconds(15)))
            .await
    );
    ctx.flush().await;

    let sums = ctx.store.sign_sums();
    assert_eq!(sums.len(), 1);
    assert_eq!(sums.values().copied().collect::<Vec<_>>(), vec![1]);

    let sessions = ctx.store.sessions();
    assert_eq!(sessions.len(), 5);

    let last = sessions.last().unwrap();
    assert_eq!(last.page_views, 3);
    assert_eq!(last.exit_path, "/c");

    let paths: Vec<String> = ctx.store.page_views().into_iter().map(|p| p.path).collect();
    assert_eq!(paths, vec!["/", "/a", "/c"]);
}

#[tokio::test]
async fn test_stop_drains_and_rejects() {
    let ctx = TestContext::new();

    assert!(ctx.tracker.page_view(&fixtures::page("/"), CLIENT_ID, at(fixtures::noon())).await);
    ctx.tracker.stop().await.unwrap();

    assert_eq!(ctx.store.sessions().len(), 1);
    assert!(ctx.tracker.is_stopped());
    assert!(!ctx.tracker.page_view(&fixtures::page("/"), CLIENT_ID, at(fixtures::noon())).await);

    // stopping twice is fine
    ctx.tracker.stop().await.unwrap();
}

#[tokio::test]
async fn test_store_failure_stops_tracker() {
    let ctx = TestContext::new();
    ctx.store.set_fail_primary(true);

    assert!(ctx.tracker.page_view(&fixtures::page("/"), CLIENT_ID, at(fixtures::noon())).await);
    assert!(ctx.tracker.flush().await.is_err());

    assert!(ctx.tracker.is_stopped());
    assert!(!ctx.tracker.page_view(&fixtures::page("/b"), CLIENT_ID, at(fixtures::noon())).await);
}

#[tokio::test]
async fn test_diagnostic_failure_is_not_fatal() {
    let ctx = TestContext::new();
    ctx.store.set_fail_requests(true);

    assert!(ctx.tracker.page_view(&fixtures::page("/"), CLIENT_ID, at(fixtures::noon())).await);
    ctx.flush().await;

    assert_eq!(ctx.store.sessions().len(), 1);
    assert!(ctx.store.requests().is_empty());
    assert!(!ctx.tracker.is_stopped());
}
