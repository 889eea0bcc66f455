//! Tracking endpoints.
//!
//! Each endpoint accepts its options either as a JSON body or, if the body
//! is empty, from the query string (`url`, `t`, `ref`, `w`, `h`).

use axum::{body::Bytes, extract::State, Json};
use engine_core::limits::MAX_BODY_SIZE_BYTES;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;
use tracker::{EventOptions, Options, TrackingRequest};

use crate::extractors::{ClientId, Tracking};
use crate::response::{ApiError, TrackResponse};
use crate::state::AppState;

/// Body of `POST /event`.
#[derive(Debug, Deserialize)]
pub struct EventBody {
    #[serde(flatten)]
    pub event: EventOptions,
    /// Page options; read from the query if missing
    pub options: Option<Options>,
}

/// POST /hit - Tracks a page view.
pub async fn hit_handler(
    State(state): State<AppState>,
    ClientId(client_id): ClientId,
    Tracking(req): Tracking,
    body: Bytes,
) -> Result<Json<TrackResponse>, ApiError> {
    let options = options_from(&req, parse_body(&body)?);
    let recorded = state.tracker.page_view(&req, client_id, options).await;

    debug!(client_id = client_id, recorded = recorded, "Page view");
    Ok(Json(TrackResponse { recorded }))
}

/// POST /event - Tracks a custom event.
pub async fn event_handler(
    State(state): State<AppState>,
    ClientId(client_id): ClientId,
    Tracking(req): Tracking,
    body: Bytes,
) -> Result<Json<TrackResponse>, ApiError> {
    let Some(EventBody { mut event, options }) = parse_body::<EventBody>(&body)? else {
        return Err(ApiError::bad_request("Missing event body"));
    };

    event
        .prepare()
        .map_err(|e| ApiError::bad_request(format!("Invalid event: {}", e)))?;

    let options = options_from(&req, options);
    let recorded = state.tracker.event(&req, client_id, event, options).await;

    debug!(client_id = client_id, recorded = recorded, "Event");
    Ok(Json(TrackResponse { recorded }))
}

/// POST /session - Keeps the visitor's session alive.
pub async fn session_handler(
    State(state): State<AppState>,
    ClientId(client_id): ClientId,
    Tracking(req): Tracking,
    body: Bytes,
) -> Result<Json<TrackResponse>, ApiError> {
    let options = options_from(&req, parse_body(&body)?);
    let recorded = state.tracker.extend_session(&req, client_id, options).await;

    debug!(client_id = client_id, recorded = recorded, "Session extension");
    Ok(Json(TrackResponse { recorded }))
}

fn options_from(req: &TrackingRequest, body: Option<Options>) -> Options {
    body.unwrap_or_else(|| Options::from_query(req))
}

/// Parses a JSON body. An empty body is `None`.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<Option<T>, ApiError> {
    if body.len() > MAX_BODY_SIZE_BYTES {
        return Err(ApiError::payload_too_large(format!(
            "Payload size {}KB exceeds {}KB limit",
            body.len() / 1024,
            MAX_BODY_SIZE_BYTES / 1024
        )));
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    serde_json::from_slice(body)
        .map(Some)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {}", e)))
}
