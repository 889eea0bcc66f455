//! In-process metrics.
//!
//! Atomic counters and gauges plus a millisecond histogram. Read them through
//! [`Metrics::snapshot`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A counter metric.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn reset(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        for (i, &bound) in Self::BUCKET_BOUNDS.iter().enumerate() {
            if ms <= bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        // Value exceeds all buckets, add to last
        self.buckets[10].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns bucket counts.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Counters and timings of the session engine.
#[derive(Debug, Default)]
pub struct Metrics {
    // Tracking entry points
    pub requests_tracked: Counter,
    pub requests_ignored: Counter,
    pub lock_failures: Counter,

    // Session state machine
    pub sessions_created: Counter,
    pub sessions_continued: Counter,
    pub sessions_superseded: Counter,
    pub page_views: Counter,
    pub events: Counter,
    pub extensions: Counter,
    pub quota_drops: Counter,

    // Pipeline
    pub bundles_enqueued: Counter,
    pub bundles_dropped: Counter,
    pub flushes: Counter,

    // Store
    pub sessions_saved: Counter,
    pub page_views_saved: Counter,
    pub events_saved: Counter,
    pub requests_saved: Counter,
    pub store_errors: Counter,
    pub store_retries: Counter,
    pub diagnostic_errors: Counter,
    pub store_latency_ms: Histogram,

    // Gauges
    pub queue_depth: Gauge,
    pub active_workers: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub requests_tracked: u64,
    pub requests_ignored: u64,
    pub lock_failures: u64,
    pub sessions_created: u64,
    pub sessions_continued: u64,
    pub sessions_superseded: u64,
    pub page_views: u64,
    pub events: u64,
    pub extensions: u64,
    pub quota_drops: u64,
    pub bundles_enqueued: u64,
    pub bundles_dropped: u64,
    pub flushes: u64,
    pub sessions_saved: u64,
    pub page_views_saved: u64,
    pub events_saved: u64,
    pub requests_saved: u64,
    pub store_errors: u64,
    pub store_retries: u64,
    pub diagnostic_errors: u64,
    pub store_latency_mean_ms: f64,
    pub queue_depth: u64,
    pub active_workers: u64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            requests_tracked: self.requests_tracked.get(),
            requests_ignored: self.requests_ignored.get(),
            lock_failures: self.lock_failures.get(),
            sessions_created: self.sessions_created.get(),
            sessions_continued: self.sessions_continued.get(),
            sessions_superseded: self.sessions_superseded.get(),
            page_views: self.page_views.get(),
            events: self.events.get(),
            extensions: self.extensions.get(),
            quota_drops: self.quota_drops.get(),
            bundles_enqueued: self.bundles_enqueued.get(),
            bundles_dropped: self.bundles_dropped.get(),
            flushes: self.flushes.get(),
            sessions_saved: self.sessions_saved.get(),
            page_views_saved: self.page_views_saved.get(),
            events_saved: self.events_saved.get(),
            requests_saved: self.requests_saved.get(),
            store_errors: self.store_errors.get(),
            store_retries: self.store_retries.get(),
            diagnostic_errors: self.diagnostic_errors.get(),
            store_latency_mean_ms: self.store_latency_ms.mean(),
            queue_depth: self.queue_depth.get(),
            active_workers: self.active_workers.get(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
