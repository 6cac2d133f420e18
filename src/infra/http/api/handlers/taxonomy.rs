//! Category and tag handlers. Taxonomy is always public.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;

use super::{DataBody, ListBody, json_response};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

pub async fn list_categories(State(state): State<ApiState>) -> Result<Response, ApiError> {
    let categories = state.content.get_categories().await?;
    let total = categories.len() as u64;
    let mut response = json_response(
        StatusCode::OK,
        ListBody {
            data: categories,
            total,
        },
    );
    state.cache_headers.apply(&mut response, true);
    Ok(response)
}

pub async fn get_category(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let category = state
        .content
        .get_category_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Category not found"))?;

    let mut response = json_response(StatusCode::OK, DataBody { data: category });
    state.cache_headers.apply(&mut response, true);
    Ok(response)
}

pub async fn list_tags(State(state): State<ApiState>) -> Result<Response, ApiError> {
    let tags = state.content.get_tags().await?;
    let total = tags.len() as u64;
    let mut response = json_response(StatusCode::OK, ListBody { data: tags, total });
    state.cache_headers.apply(&mut response, true);
    Ok(response)
}

pub async fn get_tag(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let tag = state
        .content
        .get_tag_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Tag not found"))?;

    let mut response = json_response(StatusCode::OK, DataBody { data: tag });
    state.cache_headers.apply(&mut response, true);
    Ok(response)
}
