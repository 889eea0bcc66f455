//! Rows produced by one tracked request.

use engine_core::{Event, PageView, Request, Session};

/// Everything one operation emits, sent through the channel in one piece so
/// the cancel row always precedes the row replacing it.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    /// Previous state with `sign = -1`
    pub cancel_session: Option<Session>,
    /// New state with `sign = 1`
    pub session: Option<Session>,
    pub page_view: Option<PageView>,
    pub event: Option<Event>,
    /// Diagnostic record
    pub request: Option<Request>,
}

impl Bundle {
    /// A bundle carrying only a diagnostic record.
    pub fn request(request: Request) -> Self {
        Self {
            request: Some(request),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cancel_session.is_none()
            && self.session.is_none()
            && self.page_view.is_none()
            && self.event.is_none()
            && self.request.is_none()
    }
}
