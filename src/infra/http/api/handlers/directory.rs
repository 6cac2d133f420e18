//! Roles, users and document types. Never cached by shared caches.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;
use serde::Serialize;

use super::{DataBody, json_response, session_from};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

pub async fn list_roles(State(state): State<ApiState>) -> Result<Response, ApiError> {
    let roles = state.content.list_roles().await?;
    Ok(private(&state, roles))
}

pub async fn list_users(
    State(state): State<ApiState>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let session = session_from(&jar, &state.security.session_cookie);
    let users = state.content.list_users(session.as_ref()).await?;
    Ok(private(&state, users))
}

pub async fn list_document_types(State(state): State<ApiState>) -> Result<Response, ApiError> {
    let types = state.content.list_document_types().await?;
    Ok(private(&state, types))
}

fn private<T: Serialize>(state: &ApiState, data: T) -> Response {
    let mut response = json_response(StatusCode::OK, DataBody { data });
    state.cache_headers.apply(&mut response, false);
    response
}
