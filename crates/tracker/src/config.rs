//! Tracker configuration.

use engine_core::{Error, Result};
use ipnetwork::IpNetwork;
use pipeline::PipelineConfig;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SALT_LEN: usize = 20;
const MAX_WORKER_TIMEOUT_MS: u64 = 60_000;

/// Oldest accepted major version per browser. Older versions are spoofed
/// more often than they are used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MinBrowserVersions {
    pub chrome: u32,
    pub firefox: u32,
    pub safari: u32,
    pub opera: u32,
    pub edge: u32,
    pub ie: u32,
}

impl Default for MinBrowserVersions {
    fn default() -> Self {
        Self {
            chrome: 70,
            firefox: 68,
            safari: 12,
            opera: 65,
            edge: 88,
            ie: 11,
        }
    }
}

impl MinBrowserVersions {
    /// Minimum major version for a browser name as reported by the parser.
    pub fn for_browser(&self, browser: &str) -> Option<u32> {
        match browser {
            "Chrome" => Some(self.chrome),
            "Firefox" => Some(self.firefox),
            "Safari" => Some(self.safari),
            "Opera" => Some(self.opera),
            "Edge" => Some(self.edge),
            "Internet Explorer" | "IE" => Some(self.ie),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Mixed into every fingerprint; random if empty
    #[serde(default)]
    pub salt: String,

    /// SipHash key halves; random if both are zero
    #[serde(default)]
    pub fingerprint_key0: u64,
    #[serde(default)]
    pub fingerprint_key1: u64,

    /// Pipeline workers, 0 for the number of CPUs
    #[serde(default)]
    pub worker: usize,

    #[serde(default = "default_worker_buffer_size")]
    pub worker_buffer_size: usize,

    #[serde(default = "default_worker_timeout_ms")]
    pub worker_timeout_ms: u64,

    /// Page views per session after which requests are dropped, 0 to disable
    #[serde(default = "default_max_page_views")]
    pub max_page_views: u16,

    #[serde(default = "default_session_max_age_secs")]
    pub session_max_age_secs: u64,

    /// Store the client IP on diagnostic rows
    #[serde(default)]
    pub log_ip: bool,

    #[serde(default = "default_store_retries")]
    pub store_retries: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default)]
    pub min_browser_versions: MinBrowserVersions,

    /// Proxies allowed to set client IP headers (CIDR). Empty trusts all.
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
}

fn default_worker_buffer_size() -> usize {
    500
}

fn default_worker_timeout_ms() -> u64 {
    5_000
}

fn default_max_page_views() -> u16 {
    200
}

fn default_session_max_age_secs() -> u64 {
    30 * 60
}

fn default_store_retries() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    1_000
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            salt: String::new(),
            fingerprint_key0: 0,
            fingerprint_key1: 0,
            worker: 0,
            worker_buffer_size: default_worker_buffer_size(),
            worker_timeout_ms: default_worker_timeout_ms(),
            max_page_views: default_max_page_views(),
            session_max_age_secs: default_session_max_age_secs(),
            log_ip: false,
            store_retries: default_store_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            min_browser_versions: MinBrowserVersions::default(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl TrackerConfig {
    /// Fills in secrets and clamps values. Fails on malformed proxy networks.
    pub fn validate(&mut self) -> Result<()> {
        if self.salt.is_empty() {
            self.salt = rand::rng()
                .sample_iter(Alphanumeric)
                .take(SALT_LEN)
                .map(char::from)
                .collect();
        }

        if self.fingerprint_key0 == 0 && self.fingerprint_key1 == 0 {
            self.fingerprint_key0 = rand::random();
            self.fingerprint_key1 = rand::random();
        }

        if self.worker == 0 {
            self.worker = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
        }

        if self.worker_buffer_size == 0 {
            self.worker_buffer_size = default_worker_buffer_size();
        }

        if self.worker_timeout_ms == 0 {
            self.worker_timeout_ms = default_worker_timeout_ms();
        }

        self.worker_timeout_ms = self.worker_timeout_ms.min(MAX_WORKER_TIMEOUT_MS);

        if self.session_max_age_secs == 0 {
            self.session_max_age_secs = default_session_max_age_secs();
        }

        self.trusted_networks()?;
        Ok(())
    }

    pub fn trusted_networks(&self) -> Result<Vec<IpNetwork>> {
        self.trusted_proxies
            .iter()
            .map(|net| {
                net.parse::<IpNetwork>()
                    .map_err(|e| Error::config(format!("invalid trusted proxy {net}: {e}")))
            })
            .collect()
    }

    pub fn session_max_age(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_max_age_secs as i64)
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            workers: self.worker,
            buffer_size: self.worker_buffer_size,
            timeout: Duration::from_millis(self.worker_timeout_ms),
            store_retries: self.store_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}
