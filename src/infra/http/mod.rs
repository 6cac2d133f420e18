//! HTTP facade over the content service.

pub mod api;
mod middleware;

pub use api::cache_headers::CacheHeaders;
pub use api::{ApiState, build_router};
pub use middleware::RequestContext;
