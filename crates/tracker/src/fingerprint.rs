//! Visitor fingerprints.

use chrono::{DateTime, Utc};
use siphasher::sip::SipHasher;
use std::hash::Hasher;

/// Derives the daily pseudonymous visitor ID.
///
/// The hash covers `user_agent ‖ ip ‖ salt ‖ YYYYMMDD`, so the same visitor
/// gets a new ID every calendar day (UTC).
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    key0: u64,
    key1: u64,
    salt: String,
}

impl Fingerprinter {
    pub fn new(key0: u64, key1: u64, salt: impl Into<String>) -> Self {
        Self {
            key0,
            key1,
            salt: salt.into(),
        }
    }

    pub fn fingerprint(&self, user_agent: &str, ip: &str, time: DateTime<Utc>) -> u64 {
        let mut hasher = SipHasher::new_with_keys(self.key0, self.key1);
        hasher.write(user_agent.as_bytes());
        hasher.write(ip.as_bytes());
        hasher.write(self.salt.as_bytes());
        hasher.write(time.format("%Y%m%d").to_string().as_bytes());
        hasher.finish()
    }
}
