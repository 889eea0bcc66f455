//! Per-worker batch accumulator.

use engine_core::{Event, PageView, Request, Session};

use crate::bundle::Bundle;

/// Rows buffered by one worker, one vector per entity type.
#[derive(Debug, Default)]
pub struct Batches {
    pub sessions: Vec<Session>,
    pub page_views: Vec<PageView>,
    pub events: Vec<Event>,
    pub requests: Vec<Request>,
}

impl Batches {
    pub fn with_capacity(buffer_size: usize) -> Self {
        Self {
            sessions: Vec::with_capacity(buffer_size * 2),
            page_views: Vec::with_capacity(buffer_size),
            events: Vec::with_capacity(buffer_size),
            requests: Vec::with_capacity(buffer_size),
        }
    }

    /// Appends the rows of a bundle, cancel row first.
    pub fn push(&mut self, bundle: Bundle) {
        let Bundle {
            cancel_session,
            session,
            page_view,
            event,
            request,
        } = bundle;

        self.sessions.extend(cancel_session);
        self.sessions.extend(session);
        self.page_views.extend(page_view);
        self.events.extend(event);
        self.requests.extend(request);
    }

    /// True once any batch reached its threshold.
    ///
    /// Sessions get twice the buffer since most updates write a pair of rows.
    pub fn is_full(&self, buffer_size: usize) -> bool {
        self.sessions.len() >= buffer_size * 2
            || self.page_views.len() >= buffer_size
            || self.events.len() >= buffer_size
            || self.requests.len() >= buffer_size
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
            && self.page_views.is_empty()
            && self.events.is_empty()
            && self.requests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sessions.len() + self.page_views.len() + self.events.len() + self.requests.len()
    }

    /// Takes all rows and leaves empty batches behind.
    pub fn take(&mut self) -> Batches {
        std::mem::take(self)
    }
}
