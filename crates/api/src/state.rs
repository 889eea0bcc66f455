//! Application state shared across handlers.

use std::sync::Arc;
use tracker::Tracker;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<Tracker>,
}

impl AppState {
    pub fn new(tracker: Arc<Tracker>) -> Self {
        Self { tracker }
    }
}
