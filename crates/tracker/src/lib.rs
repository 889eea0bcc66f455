//! Session tracking.
//!
//! [`Tracker`] is the entry point: it classifies a request, derives the
//! visitor fingerprint, runs the session state machine under the per-key
//! cache lock and hands the resulting rows to the emission pipeline.
//!
//! User-Agent parsing, referrer resolution, IP extraction, IP filtering and
//! geolocation are collaborators behind traits, each with a default
//! implementation except geolocation.

pub mod classify;
pub mod config;
pub mod context;
pub mod fingerprint;
pub mod geo;
pub mod ip;
pub mod options;
pub mod referrer;
pub mod request;
mod session;
pub mod tracker;
pub mod ua;

pub use classify::{Classifier, IgnoreReason, Visitor};
pub use config::{MinBrowserVersions, TrackerConfig};
pub use fingerprint::Fingerprinter;
pub use geo::{GeoLocator, Location};
pub use ip::{HeaderIpExtractor, IpExtractor, IpFilter, IpHeader, IpList};
pub use options::{EventOptions, Options};
pub use referrer::{DefaultReferrerResolver, Referrer, ReferrerResolver};
pub use request::TrackingRequest;
pub use tracker::{Tracker, TrackerBuilder};
pub use ua::{UserAgent, UserAgentParser, WootheeParser};
