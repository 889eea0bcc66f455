//! Tracking entry points.

use chrono::{DateTime, Duration, Utc};
use engine_core::{Event, PageView, Request, Session, Store};
use pipeline::{Bundle, Pipeline};
use session_cache::{CacheConfig, MemCache, SessionCache};
use std::net::IpAddr;
use std::sync::Arc;
use telemetry::metrics;
use tracing::{debug, warn};

use crate::classify::{Classifier, IgnoreReason, Visitor};
use crate::config::TrackerConfig;
use crate::context::{self, Utm};
use crate::fingerprint::Fingerprinter;
use crate::geo::{GeoLocator, Location};
use crate::ip::{HeaderIpExtractor, IpExtractor, IpFilter, IpHeader};
use crate::options::{EventOptions, Options};
use crate::referrer::{DefaultReferrerResolver, ReferrerResolver};
use crate::request::TrackingRequest;
use crate::session::{self, Arrival, Interaction};
use crate::ua::{UserAgentParser, WootheeParser};

/// Sessions found under the previous day's fingerprint are only adopted if
/// they started within this window.
const PREVIOUS_DAY_WINDOW_HOURS: i64 = 24;

/// Result of running the state machine for one request.
struct Outcome {
    session: Session,
    /// Previous state of this session, or of the session it replaced
    cancel: Option<Session>,
    created: bool,
    time_on_page: u32,
    bounced: bool,
}

/// Turns tracking requests into session, page view and event rows.
///
/// The entry points never fail; they return whether something was
/// recorded. Must be built inside a tokio runtime since it starts the
/// pipeline workers.
pub struct Tracker {
    config: TrackerConfig,
    fingerprinter: Fingerprinter,
    classifier: Classifier,
    referrer: Arc<dyn ReferrerResolver>,
    geo: Option<Arc<dyn GeoLocator>>,
    cache: Arc<dyn SessionCache>,
    pipeline: Pipeline,
}

impl Tracker {
    pub fn builder(config: TrackerConfig, store: Arc<dyn Store>) -> TrackerBuilder {
        TrackerBuilder {
            config,
            store,
            cache: None,
            ua_parser: None,
            referrer: None,
            ip_extractor: None,
            ip_filter: None,
            geo: None,
        }
    }

    /// The validated configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn session_cache(&self) -> &Arc<dyn SessionCache> {
        &self.cache
    }

    pub fn is_stopped(&self) -> bool {
        self.pipeline.is_stopped()
    }

    /// Tracks a page view. Returns true if it was accepted.
    pub async fn page_view(&self, req: &TrackingRequest, client_id: u64, mut options: Options) -> bool {
        if self.pipeline.is_stopped() {
            return false;
        }

        let visitor = self.classifier.classify(req);
        options.validate(req);
        let now = options.time.unwrap_or_else(Utc::now);

        if let Some(reason) = visitor.ignore {
            self.capture_ignored(req, client_id, now, &visitor, reason, &options.path, "")
                .await;
            return false;
        }

        self.record(Interaction::PageView, req, client_id, now, &visitor, &options, |outcome| {
            let request = outcome
                .created
                .then(|| self.request_from_session(&outcome.session, &visitor, ""));

            let page_view = (!outcome.bounced).then(|| {
                let (keys, values) = options.tags();
                PageView::from_session(&outcome.session, outcome.time_on_page, keys, values)
            });

            if page_view.is_some() {
                metrics().page_views.inc();
            }

            Bundle {
                cancel_session: outcome.cancel,
                session: Some(outcome.session),
                page_view,
                event: None,
                request,
            }
        })
        .await
    }

    /// Tracks a custom event. Returns true if it was accepted.
    pub async fn event(
        &self,
        req: &TrackingRequest,
        client_id: u64,
        mut event: EventOptions,
        mut options: Options,
    ) -> bool {
        if self.pipeline.is_stopped() {
            return false;
        }

        if let Err(e) = event.prepare() {
            debug!(client_id = client_id, error = %e, "Invalid event options");
            return false;
        }

        let visitor = self.classifier.classify(req);
        options.validate(req);
        let now = options.time.unwrap_or_else(Utc::now);

        if let Some(reason) = visitor.ignore {
            self.capture_ignored(req, client_id, now, &visitor, reason, &options.path, &event.name)
                .await;
            return false;
        }

        let interaction = Interaction::Event {
            interactive: !event.non_interactive,
        };
        let (meta_keys, meta_values) = event.meta_data(&options.tags);

        self.record(interaction, req, client_id, now, &visitor, &options, |outcome| {
            let request = outcome
                .created
                .then(|| self.request_from_session(&outcome.session, &visitor, &event.name));

            let counts_as_view = outcome.created
                || outcome
                    .cancel
                    .as_ref()
                    .is_some_and(|c| c.page_views < outcome.session.page_views);

            let page_view = counts_as_view.then(|| {
                let (keys, values) = options.tags();
                PageView::from_session(&outcome.session, outcome.time_on_page, keys, values)
            });

            if page_view.is_some() {
                metrics().page_views.inc();
            }

            let event = Event::from_session(
                &outcome.session,
                event.name,
                event.duration,
                meta_keys,
                meta_values,
            );
            metrics().events.inc();

            Bundle {
                cancel_session: outcome.cancel,
                session: Some(outcome.session),
                page_view,
                event: Some(event),
                request,
            }
        })
        .await
    }

    /// Keeps an existing session alive without counting a page view.
    /// Never creates a session.
    pub async fn extend_session(&self, req: &TrackingRequest, client_id: u64, mut options: Options) -> bool {
        if self.pipeline.is_stopped() {
            return false;
        }

        let visitor = self.classifier.classify(req);

        if visitor.ignore.is_some() {
            return false;
        }

        options.validate(req);
        let now = options.time.unwrap_or_else(Utc::now);

        self.record(Interaction::Extend, req, client_id, now, &visitor, &options, |outcome| Bundle {
            cancel_session: outcome.cancel,
            session: Some(outcome.session),
            ..Default::default()
        })
        .await
    }

    /// Writes all buffered rows and keeps accepting requests.
    pub async fn flush(&self) -> pipeline::Result<()> {
        self.pipeline.flush().await
    }

    /// Writes all buffered rows and stops accepting requests.
    pub async fn stop(&self) -> pipeline::Result<()> {
        self.pipeline.stop().await
    }

    /// Looks up the session under the visitor's lock, applies the
    /// interaction and emits the bundle built from the outcome.
    ///
    /// Channel capacity is reserved before anything changes. The bundle is
    /// queued before the new state is cached, so the cache never holds a
    /// state whose rows were not emitted.
    #[allow(clippy::too_many_arguments)]
    async fn record<F>(
        &self,
        interaction: Interaction,
        req: &TrackingRequest,
        client_id: u64,
        now: DateTime<Utc>,
        visitor: &Visitor,
        options: &Options,
        build: F,
    ) -> bool
    where
        F: FnOnce(Outcome) -> Bundle,
    {
        let fingerprint = self
            .fingerprinter
            .fingerprint(&visitor.raw_user_agent, &visitor.ip, now);

        let lock = match self.cache.lock(client_id, fingerprint).await {
            Ok(lock) => lock,
            Err(e) => {
                metrics().lock_failures.inc();
                warn!(client_id = client_id, error = %e, "Failed to lock session, dropping request");
                return false;
            }
        };

        let max_age = now - self.config.session_max_age();
        let mut key = fingerprint;
        let mut found = self.cache.get(client_id, fingerprint, max_age).await;
        let mut previous_day_lock = None;

        // The fingerprint changes at midnight; the session may still live
        // under yesterday's. Locks are always taken newer day first.
        if found.is_none() && max_age.date_naive() != now.date_naive() {
            let previous = self
                .fingerprinter
                .fingerprint(&visitor.raw_user_agent, &visitor.ip, max_age);

            match self.cache.lock(client_id, previous).await {
                Ok(lock) => {
                    previous_day_lock = Some(lock);
                    found = self
                        .cache
                        .get(client_id, previous, max_age)
                        .await
                        .filter(|s| s.started_within(now, Duration::hours(PREVIOUS_DAY_WINDOW_HOURS)));

                    if found.is_some() {
                        key = previous;
                    }
                }
                Err(e) => {
                    warn!(client_id = client_id, error = %e, "Failed to lock previous day session");
                }
            }
        }

        let recorded = match self.transition(interaction, req, client_id, key, now, visitor, options, found) {
            Some(outcome) => match self.pipeline.reserve().await {
                Some(slot) => {
                    let state = outcome.session.clone();
                    slot.send(build(outcome));
                    metrics().requests_tracked.inc();
                    self.cache.put(client_id, key, &state).await;
                    true
                }
                None => false,
            },
            None => false,
        };

        if let Some(lock) = previous_day_lock {
            lock.unlock().await;
        }

        lock.unlock().await;
        recorded
    }

    /// Runs the state machine. Nothing is cached or emitted here.
    #[allow(clippy::too_many_arguments)]
    fn transition(
        &self,
        interaction: Interaction,
        req: &TrackingRequest,
        client_id: u64,
        key: u64,
        now: DateTime<Utc>,
        visitor: &Visitor,
        options: &Options,
        found: Option<Session>,
    ) -> Option<Outcome> {
        if interaction == Interaction::Extend && found.is_none() {
            return None;
        }

        // Stored referrers are shortened; compare like with like.
        let referrer = session::shorten_referrer(
            self.referrer
                .resolve(req, &options.referrer, &options.hostname),
        );
        let utm = Utm::from_request(req);

        let superseded = match found {
            Some(mut session)
                if interaction == Interaction::Extend
                    || !session::attribution_changed(&session, &referrer, &utm) =>
            {
                let limit = options.max_page_views.unwrap_or(self.config.max_page_views);

                if limit > 0 && session.page_views >= limit {
                    metrics().quota_drops.inc();
                    debug!(client_id = client_id, page_views = session.page_views, "Page view quota reached");
                    return None;
                }

                let cancel = session.cancel();
                let advance =
                    session::advance(&mut session, interaction, now, &options.path, &options.title);

                metrics().sessions_continued.inc();
                if interaction == Interaction::Extend {
                    metrics().extensions.inc();
                }

                return Some(Outcome {
                    session,
                    cancel: Some(cancel),
                    created: false,
                    time_on_page: advance.time_on_page,
                    bounced: advance.bounced,
                });
            }
            other => other,
        };

        let session = session::create(Arrival {
            client_id,
            fingerprint: key,
            now,
            path: &options.path,
            title: &options.title,
            user_agent: &visitor.user_agent,
            language: context::language(req),
            location: self.locate(&visitor.ip),
            referrer,
            screen_class: context::screen_class(req, options.screen_width),
            utm,
        });
        metrics().sessions_created.inc();

        let cancel = superseded.map(|old| {
            metrics().sessions_superseded.inc();
            old.cancel()
        });

        Some(Outcome {
            session,
            cancel,
            created: true,
            time_on_page: 0,
            bounced: false,
        })
    }

    fn locate(&self, ip: &str) -> Location {
        match (&self.geo, ip.parse::<IpAddr>()) {
            (Some(geo), Ok(ip)) => geo.locate(&ip),
            _ => Location::default(),
        }
    }

    fn logged_ip(&self, ip: &str) -> String {
        if self.config.log_ip {
            ip.to_string()
        } else {
            String::new()
        }
    }

    fn request_from_session(&self, session: &Session, visitor: &Visitor, event_name: &str) -> Request {
        Request {
            client_id: session.client_id,
            visitor_id: session.visitor_id,
            time: session.time,
            ip: self.logged_ip(&visitor.ip),
            user_agent: visitor.raw_user_agent.clone(),
            path: session.exit_path.clone(),
            event_name: event_name.to_string(),
            referrer: session.referrer.clone(),
            utm_source: session.utm_source.clone(),
            utm_medium: session.utm_medium.clone(),
            utm_campaign: session.utm_campaign.clone(),
            bot: false,
            bot_reason: String::new(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn capture_ignored(
        &self,
        req: &TrackingRequest,
        client_id: u64,
        now: DateTime<Utc>,
        visitor: &Visitor,
        reason: IgnoreReason,
        path: &str,
        event_name: &str,
    ) {
        metrics().requests_ignored.inc();
        debug!(client_id = client_id, reason = %reason, "Ignoring request");

        let request = Request {
            client_id,
            visitor_id: self
                .fingerprinter
                .fingerprint(&visitor.raw_user_agent, &visitor.ip, now),
            time: now,
            ip: self.logged_ip(&visitor.ip),
            user_agent: visitor.raw_user_agent.clone(),
            path: path.to_string(),
            event_name: event_name.to_string(),
            referrer: req.referer().to_string(),
            utm_source: req.query_trimmed("utm_source"),
            utm_medium: req.query_trimmed("utm_medium"),
            utm_campaign: req.query_trimmed("utm_campaign"),
            bot: true,
            bot_reason: reason.as_str().to_string(),
        };

        self.pipeline.send(Bundle::request(request)).await;
    }
}

/// Builder for [`Tracker`]. Collaborators not set use their defaults;
/// geolocation is off unless a locator is given.
pub struct TrackerBuilder {
    config: TrackerConfig,
    store: Arc<dyn Store>,
    cache: Option<Arc<dyn SessionCache>>,
    ua_parser: Option<Arc<dyn UserAgentParser>>,
    referrer: Option<Arc<dyn ReferrerResolver>>,
    ip_extractor: Option<Arc<dyn IpExtractor>>,
    ip_filter: Option<Arc<dyn IpFilter>>,
    geo: Option<Arc<dyn GeoLocator>>,
}

impl TrackerBuilder {
    pub fn session_cache(mut self, cache: Arc<dyn SessionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn user_agent_parser(mut self, parser: Arc<dyn UserAgentParser>) -> Self {
        self.ua_parser = Some(parser);
        self
    }

    pub fn referrer_resolver(mut self, resolver: Arc<dyn ReferrerResolver>) -> Self {
        self.referrer = Some(resolver);
        self
    }

    pub fn ip_extractor(mut self, extractor: Arc<dyn IpExtractor>) -> Self {
        self.ip_extractor = Some(extractor);
        self
    }

    pub fn ip_filter(mut self, filter: Arc<dyn IpFilter>) -> Self {
        self.ip_filter = Some(filter);
        self
    }

    pub fn geo_locator(mut self, geo: Arc<dyn GeoLocator>) -> Self {
        self.geo = Some(geo);
        self
    }

    /// Validates the configuration and starts the pipeline.
    pub fn build(self) -> engine_core::Result<Tracker> {
        let mut config = self.config;
        config.validate()?;

        let ip_extractor = match self.ip_extractor {
            Some(extractor) => extractor,
            None => Arc::new(HeaderIpExtractor::new(
                IpHeader::DEFAULT_ORDER.to_vec(),
                config.trusted_networks()?,
            )),
        };

        let referrer = self
            .referrer
            .unwrap_or_else(|| Arc::new(DefaultReferrerResolver::new()));

        let classifier = Classifier::new(
            self.ua_parser
                .unwrap_or_else(|| Arc::new(WootheeParser::new())),
            referrer.clone(),
            ip_extractor,
            self.ip_filter,
            config.min_browser_versions.clone(),
        );

        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(MemCache::new(CacheConfig::default().max_sessions)));

        let fingerprinter = Fingerprinter::new(
            config.fingerprint_key0,
            config.fingerprint_key1,
            config.salt.clone(),
        );

        let pipeline = Pipeline::start(self.store, config.pipeline_config());

        Ok(Tracker {
            config,
            fingerprinter,
            classifier,
            referrer,
            geo: self.geo,
            cache,
            pipeline,
        })
    }
}
