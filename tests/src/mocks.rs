//! Mock implementations for testing.

use async_trait::async_trait;
use engine_core::{Event, PageView, Request, Result, Session, Store};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{RwLock, RwLockWriteGuard};
use tracker::{GeoLocator, Location};

/// Store that captures every saved row in memory.
///
/// Implements the same `Store` trait as the ClickHouse client, so tests
/// see exactly the rows that would be written.
#[derive(Default)]
pub struct MockStore {
    sessions: Mutex<Vec<Session>>,
    page_views: Mutex<Vec<PageView>>,
    events: Mutex<Vec<Event>>,
    requests: Mutex<Vec<Request>>,
    fail_primary: AtomicBool,
    fail_requests: AtomicBool,
    gate: RwLock<()>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session rows in write order, cancel rows included.
    pub fn sessions(&self) -> Vec<Session> {
        self.sessions.lock().clone()
    }

    pub fn page_views(&self) -> Vec<PageView> {
        self.page_views.lock().clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    /// Sum of signs per session ID. A consistent log has exactly one
    /// surviving state row per session.
    pub fn sign_sums(&self) -> HashMap<u32, i64> {
        let mut sums = HashMap::new();

        for s in self.sessions.lock().iter() {
            *sums.entry(s.session_id).or_insert(0) += s.sign as i64;
        }

        sums
    }

    /// Latest state row per session ID.
    pub fn latest_states(&self) -> HashMap<u32, Session> {
        let mut latest = HashMap::new();

        for s in self.sessions.lock().iter().filter(|s| s.sign == 1) {
            latest.insert(s.session_id, s.clone());
        }

        latest
    }

    /// Fail all session, page view and event writes.
    pub fn set_fail_primary(&self, fail: bool) {
        self.fail_primary.store(fail, Ordering::SeqCst);
    }

    /// Fail diagnostic request writes.
    pub fn set_fail_requests(&self, fail: bool) {
        self.fail_requests.store(fail, Ordering::SeqCst);
    }

    /// Blocks every write until the guard is dropped.
    pub async fn hold_writes(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().await
    }

    fn check_primary(&self) -> Result<()> {
        if self.fail_primary.load(Ordering::SeqCst) {
            return Err(engine_core::Error::internal("Mock store failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MockStore {
    async fn save_sessions(&self, sessions: &[Session]) -> Result<()> {
        let _open = self.gate.read().await;
        self.check_primary()?;
        self.sessions.lock().extend_from_slice(sessions);
        Ok(())
    }

    async fn save_page_views(&self, page_views: &[PageView]) -> Result<()> {
        let _open = self.gate.read().await;
        self.check_primary()?;
        self.page_views.lock().extend_from_slice(page_views);
        Ok(())
    }

    async fn save_events(&self, events: &[Event]) -> Result<()> {
        let _open = self.gate.read().await;
        self.check_primary()?;
        self.events.lock().extend_from_slice(events);
        Ok(())
    }

    async fn save_requests(&self, requests: &[Request]) -> Result<()> {
        let _open = self.gate.read().await;
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(engine_core::Error::internal("Mock request store failure"));
        }

        self.requests.lock().extend_from_slice(requests);
        Ok(())
    }
}

/// Geolocation returning the same location for every address.
pub struct StaticGeo(pub Location);

impl GeoLocator for StaticGeo {
    fn locate(&self, _ip: &IpAddr) -> Location {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn request() -> Request {
        Request {
            client_id: 1,
            visitor_id: 1,
            time: Utc::now(),
            ip: String::new(),
            user_agent: String::new(),
            path: "/".into(),
            event_name: String::new(),
            referrer: String::new(),
            utm_source: String::new(),
            utm_medium: String::new(),
            utm_campaign: String::new(),
            bot: true,
            bot_reason: "dnt".into(),
        }
    }

    #[tokio::test]
    async fn test_mock_store_captures_requests() {
        let store = MockStore::new();
        store.save_requests(&[request()]).await.unwrap();
        assert_eq!(store.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_store_failure_mode() {
        let store = MockStore::new();
        store.set_fail_primary(true);
        assert!(store.save_sessions(&[]).await.is_err());

        // diagnostic writes are independent
        assert!(store.save_requests(&[request()]).await.is_ok());

        store.set_fail_primary(false);
        assert!(store.save_sessions(&[]).await.is_ok());
    }
}
