//! Posts handlers

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum_extra::extract::cookie::CookieJar;

use crate::application::repos::PostQueryFilter;
use crate::domain::error::DomainError;
use crate::domain::posts::PostDraft;
use crate::domain::types::PostStatus;

use super::{
    DataBody, ListBody, PostListQuery, json_rejection, json_response, query_rejection,
    session_from,
};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

pub async fn list_posts(
    State(state): State<ApiState>,
    query: Result<Query<PostListQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(query) = query.map_err(query_rejection)?;
    let filter = post_filter(query)?;
    let shareable = is_shareable_listing(&filter);

    let page = state.content.get_posts(filter).await?;

    let mut response = json_response(
        StatusCode::OK,
        ListBody {
            data: page.items,
            total: page.total,
        },
    );
    state.cache_headers.apply(&mut response, shareable);
    Ok(response)
}

pub async fn get_post(
    State(state): State<ApiState>,
    Path(slug): Path<String>,
) -> Result<Response, ApiError> {
    let post = state
        .content
        .get_post_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Post not found"))?;

    let shareable = post.status.is_public();
    let mut response = json_response(StatusCode::OK, DataBody { data: post });
    state.cache_headers.apply(&mut response, shareable);
    Ok(response)
}

pub async fn create_post(
    State(state): State<ApiState>,
    jar: CookieJar,
    payload: Result<Json<PostDraft>, JsonRejection>,
) -> Result<Response, ApiError> {
    let session = session_from(&jar, &state.security.session_cookie);
    let Json(draft) = payload.map_err(json_rejection)?;

    let post = state.content.create_post(session.as_ref(), draft).await?;

    let mut response = json_response(StatusCode::CREATED, DataBody { data: post });
    state.cache_headers.apply(&mut response, false);
    Ok(response)
}

/// Listings default to published posts.
fn post_filter(query: PostListQuery) -> Result<PostQueryFilter, ApiError> {
    let status = match query.status.as_deref().map(str::trim) {
        None | Some("") => PostStatus::Published,
        Some(raw) => raw
            .parse()
            .map_err(|err: DomainError| {
                ApiError::bad_request("Invalid query", Some(err.to_string()))
            })?,
    };

    let defaults = PostQueryFilter::default();
    Ok(PostQueryFilter {
        status: Some(status),
        category: query.category,
        featured: query.featured,
        search: query.search,
        limit: query.limit.unwrap_or(defaults.limit),
        offset: query.offset.unwrap_or(defaults.offset),
    }
    .normalized())
}

/// Search results and non-public statuses must not reach shared caches.
fn is_shareable_listing(filter: &PostQueryFilter) -> bool {
    filter.status.is_some_and(PostStatus::is_public) && filter.search.is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_defaults_to_published() {
        let filter = post_filter(PostListQuery::default()).expect("filter");
        assert_eq!(filter.status, Some(PostStatus::Published));
        assert_eq!(filter.limit, 10);
        assert!(is_shareable_listing(&filter));
    }

    #[test]
    fn search_and_drafts_are_not_shareable() {
        let search = post_filter(PostListQuery {
            search: Some("rust".into()),
            ..PostListQuery::default()
        })
        .expect("filter");
        assert!(!is_shareable_listing(&search));

        let blank_search = post_filter(PostListQuery {
            search: Some("  ".into()),
            ..PostListQuery::default()
        })
        .expect("filter");
        assert!(is_shareable_listing(&blank_search));

        let drafts = post_filter(PostListQuery {
            status: Some("draft".into()),
            ..PostListQuery::default()
        })
        .expect("filter");
        assert!(!is_shareable_listing(&drafts));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = post_filter(PostListQuery {
            status: Some("secret".into()),
            ..PostListQuery::default()
        })
        .expect_err("invalid");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn limit_is_clamped() {
        let filter = post_filter(PostListQuery {
            limit: Some(500),
            offset: Some(20),
            ..PostListQuery::default()
        })
        .expect("filter");
        assert_eq!(filter.limit, 100);
        assert_eq!(filter.offset, 20);
    }
}
