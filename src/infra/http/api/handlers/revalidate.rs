//! CMS webhook that evicts cached taxonomy after edits.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{json_rejection, json_response};
use crate::cache::InvalidationTag;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;
use crate::infra::http::middleware::tokens_match;

pub const REVALIDATE_SECRET_HEADER: &str = "x-revalidate-secret";

#[derive(Debug, Deserialize)]
pub struct RevalidateRequest {
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RevalidateResponse {
    pub revalidated: usize,
}

pub async fn revalidate(
    State(state): State<ApiState>,
    headers: HeaderMap,
    payload: Result<Json<RevalidateRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    // Without a configured secret the webhook does not exist.
    let Some(secret) = state.security.revalidate_secret.as_deref() else {
        return Err(ApiError::not_found("Not found"));
    };

    let provided = headers
        .get(REVALIDATE_SECRET_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !tokens_match(provided, secret) {
        return Err(ApiError::unauthorized());
    }

    let Json(request) = payload.map_err(json_rejection)?;
    let tags = parse_tags(request.tags)?;
    let labels: Vec<String> = tags.iter().map(ToString::to_string).collect();

    let revalidated = state.content.invalidate(tags);
    info!(
        target: "folio::http::revalidate",
        tags = ?labels,
        revalidated,
        "revalidation webhook processed"
    );

    let mut response = json_response(StatusCode::OK, RevalidateResponse { revalidated });
    state.cache_headers.apply(&mut response, false);
    Ok(response)
}

fn parse_tags(raw: Vec<String>) -> Result<Vec<InvalidationTag>, ApiError> {
    let tags: Vec<InvalidationTag> = raw
        .into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .map(InvalidationTag::new)
        .collect();

    if tags.is_empty() {
        return Err(ApiError::bad_request(
            "Invalid request body",
            Some("`tags` must name at least one tag".to_string()),
        ));
    }
    Ok(tags)
}
