//! HTTP wiring for the session engine.
//!
//! Maps `POST /hit`, `POST /event` and `POST /session` onto the tracker
//! entry points. The tenant comes from the `X-Client-Id` header.

pub mod extractors;
pub mod response;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::AppState;
