//! Geolocation collaborator.

use std::net::IpAddr;

/// Location of an IP address. Empty strings if unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub country_code: String,
    pub region: String,
    pub city: String,
}

/// Looks up the location of a client IP.
pub trait GeoLocator: Send + Sync {
    fn locate(&self, ip: &IpAddr) -> Location;
}
