//! API handlers organized by resource type.
//!
//! Each submodule contains handlers for one resource. Query structs and the
//! helpers shared across modules live here.

mod assets;
mod directory;
mod health;
mod posts;
mod revalidate;
mod taxonomy;

pub use assets::*;
pub use directory::*;
pub use health::*;
pub use posts::*;
pub use revalidate::*;
pub use taxonomy::*;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};

use crate::application::repos::SessionToken;

use super::error::ApiError;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostListQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub featured: Option<bool>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Single-record envelope.
#[derive(Debug, Serialize)]
pub struct DataBody<T> {
    pub data: T,
}

/// Collection envelope with the number of matching records.
#[derive(Debug, Serialize)]
pub struct ListBody<T> {
    pub data: Vec<T>,
    pub total: u64,
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    (status, Json(body)).into_response()
}

pub(crate) fn query_rejection(err: QueryRejection) -> ApiError {
    ApiError::bad_request("Invalid query", Some(err.body_text()))
}

pub(crate) fn json_rejection(err: JsonRejection) -> ApiError {
    ApiError::bad_request("Invalid request body", Some(err.body_text()))
}

pub(crate) fn session_from(jar: &CookieJar, cookie_name: &str) -> Option<SessionToken> {
    jar.get(cookie_name)
        .and_then(|cookie| SessionToken::new(cookie.value()))
}
