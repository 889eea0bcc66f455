//! Session state transitions.
//!
//! Pure functions over [`Session`]; locking, caching and emission live in
//! the tracker.

use chrono::{DateTime, Duration, Utc};
use engine_core::limits::{
    MAX_LANGUAGE_LEN, MAX_REFERRER_ICON_LEN, MAX_REFERRER_LEN, MAX_UA_FIELD_LEN,
};
use engine_core::util::shorten;
use engine_core::{seconds_between, Session, SIGN_STATE};

use crate::context::Utm;
use crate::geo::Location;
use crate::referrer::Referrer;
use crate::ua::UserAgent;

/// What the caller reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interaction {
    PageView,
    Event { interactive: bool },
    Extend,
}

/// Everything a new session is built from.
pub(crate) struct Arrival<'a> {
    pub client_id: u64,
    pub fingerprint: u64,
    pub now: DateTime<Utc>,
    pub path: &'a str,
    pub title: &'a str,
    pub user_agent: &'a UserAgent,
    pub language: String,
    pub location: Location,
    pub referrer: Referrer,
    pub screen_class: String,
    pub utm: Utm,
}

/// Cuts a resolved referrer to the lengths stored on a session.
pub(crate) fn shorten_referrer(referrer: Referrer) -> Referrer {
    Referrer {
        url: shorten(&referrer.url, MAX_REFERRER_LEN),
        name: shorten(&referrer.name, MAX_REFERRER_LEN),
        icon: shorten(&referrer.icon, MAX_REFERRER_ICON_LEN),
    }
}

pub(crate) fn create(arrival: Arrival<'_>) -> Session {
    let Arrival {
        client_id,
        fingerprint,
        now,
        path,
        title,
        user_agent,
        language,
        location,
        referrer,
        screen_class,
        utm,
    } = arrival;

    Session {
        sign: SIGN_STATE,
        client_id,
        visitor_id: fingerprint,
        session_id: rand::random(),
        time: now,
        start: now,
        duration_seconds: 0,
        entry_path: path.to_string(),
        exit_path: path.to_string(),
        page_views: 1,
        is_bounce: true,
        entry_title: title.to_string(),
        exit_title: title.to_string(),
        language: shorten(&language, MAX_LANGUAGE_LEN),
        country_code: location.country_code,
        region: location.region,
        city: location.city,
        referrer: shorten(&referrer.url, MAX_REFERRER_LEN),
        referrer_name: shorten(&referrer.name, MAX_REFERRER_LEN),
        referrer_icon: shorten(&referrer.icon, MAX_REFERRER_ICON_LEN),
        os: shorten(&user_agent.os, MAX_UA_FIELD_LEN),
        os_version: shorten(&user_agent.os_version, MAX_UA_FIELD_LEN),
        browser: shorten(&user_agent.browser, MAX_UA_FIELD_LEN),
        browser_version: shorten(&user_agent.browser_version, MAX_UA_FIELD_LEN),
        desktop: user_agent.desktop,
        mobile: user_agent.mobile,
        screen_class,
        utm_source: utm.source,
        utm_medium: utm.medium,
        utm_campaign: utm.campaign,
        utm_content: utm.content,
        utm_term: utm.term,
        extended: 0,
    }
}

/// True if a present referrer or campaign value differs from the session's.
/// Empty values never count as a change.
pub(crate) fn attribution_changed(session: &Session, referrer: &Referrer, utm: &Utm) -> bool {
    fn differs(incoming: &str, stored: &str) -> bool {
        !incoming.is_empty() && incoming != stored
    }

    differs(&referrer.url, &session.referrer)
        || differs(&referrer.name, &session.referrer_name)
        || differs(&utm.source, &session.utm_source)
        || differs(&utm.medium, &session.utm_medium)
        || differs(&utm.campaign, &session.utm_campaign)
        || differs(&utm.content, &session.utm_content)
        || differs(&utm.term, &session.utm_term)
}

/// Outcome of continuing a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Advance {
    /// Seconds since the session was last touched
    pub time_on_page: u32,
    /// Still a bounce after this interaction
    pub bounced: bool,
}

/// Applies an interaction to a continuing session.
pub(crate) fn advance(
    session: &mut Session,
    interaction: Interaction,
    now: DateTime<Utc>,
    path: &str,
    title: &str,
) -> Advance {
    let time_on_page = seconds_between(session.time, now);

    match interaction {
        Interaction::PageView => {
            session.time = now;
            session.is_bounce = session.is_bounce && path == session.exit_path;

            if !session.is_bounce {
                session.page_views = session.page_views.saturating_add(1);
            }
        }
        Interaction::Event { interactive } => {
            // Keeps the event strictly after a page view at the same instant.
            session.time += Duration::milliseconds(1);
            let new_page = path != session.exit_path;

            if new_page {
                session.page_views = session.page_views.saturating_add(1);
            }

            if interactive || new_page {
                session.is_bounce = false;
            }
        }
        Interaction::Extend => {
            session.time = now;

            if session.extended < u16::MAX - 1 {
                session.extended += 1;
            }
        }
    }

    session.duration_seconds = seconds_between(session.start, now);
    session.sign = SIGN_STATE;

    if interaction != Interaction::Extend {
        session.exit_path = path.to_string();
        session.exit_title = title.to_string();
    }

    Advance {
        time_on_page,
        bounced: session.is_bounce,
    }
}
