//! Request extractors.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::request::Parts,
};
use std::net::SocketAddr;
use tracker::TrackingRequest;

use crate::response::ApiError;

/// Header carrying the tenant ID.
pub const CLIENT_ID_HEADER: &str = "X-Client-Id";

/// Tenant ID from the `X-Client-Id` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientId(pub u64);

#[async_trait]
impl<S> FromRequestParts<S> for ClientId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CLIENT_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::bad_request("Missing X-Client-Id header"))?;

        value
            .trim()
            .parse()
            .map(ClientId)
            .map_err(|_| ApiError::bad_request("X-Client-Id must be an unsigned integer"))
    }
}

/// The parts of the request the tracker inspects.
///
/// The peer address is taken from [`ConnectInfo`] if the server was started
/// with it, so header based IP extraction still works without it.
#[derive(Debug, Clone)]
pub struct Tracking(pub TrackingRequest);

#[async_trait]
impl<S> FromRequestParts<S> for Tracking
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let remote_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());

        Ok(Tracking(TrackingRequest::new(
            parts.uri.clone(),
            parts.headers.clone(),
            remote_addr,
        )))
    }
}
