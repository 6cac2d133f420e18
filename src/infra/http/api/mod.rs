pub mod cache_headers;
pub mod error;
pub mod handlers;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::http::middleware::{csrf_guard, log_responses, set_request_context};

pub fn build_router(state: ApiState) -> Router {
    let csrf_state = state.clone();

    Router::new()
        .route(
            "/api/posts",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .route("/api/posts/{slug}", get(handlers::get_post))
        .route("/api/categories", get(handlers::list_categories))
        .route("/api/categories/{slug}", get(handlers::get_category))
        .route("/api/tags", get(handlers::list_tags))
        .route("/api/tags/{slug}", get(handlers::get_tag))
        .route("/api/roles", get(handlers::list_roles))
        .route("/api/users", get(handlers::list_users))
        .route("/api/document-types", get(handlers::list_document_types))
        .route("/api/assets/{*key}", get(handlers::get_asset))
        .route("/api/revalidate", post(handlers::revalidate))
        .route("/_health", get(handlers::health))
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(csrf_state, csrf_guard))
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
