//! `Cache-Control` values for API responses.
//!
//! Post listings are not cached in-process, so shared caches in front of the
//! server carry that load. Only published content may be stored there.

use axum::http::{HeaderValue, header::CACHE_CONTROL};
use axum::response::Response;

use crate::config::HttpCacheSettings;

pub const NO_STORE: &str = "no-store";

#[derive(Debug, Clone)]
pub struct CacheHeaders {
    public: HeaderValue,
    asset: HeaderValue,
}

impl Default for CacheHeaders {
    fn default() -> Self {
        Self::new(&HttpCacheSettings::default())
    }
}

impl CacheHeaders {
    pub fn new(settings: &HttpCacheSettings) -> Self {
        let public = format!(
            "public, s-maxage={}, stale-while-revalidate={}",
            settings.s_maxage, settings.stale_while_revalidate
        );
        let asset = format!(
            "public, max-age={}, immutable",
            settings.asset_max_age
        );
        Self {
            public: header_value(&public),
            asset: header_value(&asset),
        }
    }

    pub fn public(&self) -> &HeaderValue {
        &self.public
    }

    /// Mark `response` shareable when `public` holds, `no-store` otherwise.
    pub fn apply(&self, response: &mut Response, public: bool) {
        let value = if public {
            self.public.clone()
        } else {
            HeaderValue::from_static(NO_STORE)
        };
        response.headers_mut().insert(CACHE_CONTROL, value);
    }

    pub fn apply_asset(&self, response: &mut Response) {
        response
            .headers_mut()
            .insert(CACHE_CONTROL, self.asset.clone());
    }
}

fn header_value(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static(NO_STORE))
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU64;

    use axum::response::IntoResponse;

    use super::*;

    #[test]
    fn default_windows_match_edge_policy() {
        let headers = CacheHeaders::default();
        assert_eq!(
            headers.public().to_str().expect("ascii"),
            "public, s-maxage=300, stale-while-revalidate=900"
        );
    }

    #[test]
    fn private_responses_are_not_stored() {
        let headers = CacheHeaders::new(&HttpCacheSettings {
            s_maxage: NonZeroU64::new(60).expect("non-zero"),
            stale_while_revalidate: 0,
            asset_max_age: NonZeroU64::new(120).expect("non-zero"),
        });

        let mut response = ().into_response();
        headers.apply(&mut response, false);
        assert_eq!(response.headers()[CACHE_CONTROL], NO_STORE);

        headers.apply(&mut response, true);
        assert_eq!(
            response.headers()[CACHE_CONTROL],
            "public, s-maxage=60, stale-while-revalidate=0"
        );

        headers.apply_asset(&mut response);
        assert_eq!(
            response.headers()[CACHE_CONTROL],
            "public, max-age=120, immutable"
        );
    }
}
