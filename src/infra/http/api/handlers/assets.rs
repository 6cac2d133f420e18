//! Asset proxy: streams files stored in the CMS under `/api/assets/`.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;

use crate::application::repos::StoredAsset;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::state::ApiState;

pub async fn get_asset(
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let asset = state
        .content
        .fetch_asset(&key)
        .await?
        .ok_or_else(|| ApiError::not_found("Asset not found"))?;

    let mut response = build_asset_response(&key, asset);
    state.cache_headers.apply_asset(&mut response);
    Ok(response)
}

fn build_asset_response(key: &str, asset: StoredAsset) -> Response {
    let StoredAsset {
        bytes,
        content_type,
    } = asset;
    let length = bytes.len();

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let content_type = content_type
        .and_then(|value| HeaderValue::from_str(&value).ok())
        .or_else(|| {
            let mime = mime_guess::from_path(key).first_or_octet_stream();
            HeaderValue::from_str(mime.as_ref()).ok()
        });
    if let Some(value) = content_type {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(header::CONTENT_LENGTH, value);
    }

    response
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn upstream_content_type_wins() {
        let response = build_asset_response(
            "cover.bin",
            StoredAsset {
                bytes: Bytes::from_static(b"abc"),
                content_type: Some("image/webp".into()),
            },
        );
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/webp");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "3");
    }

    #[test]
    fn content_type_is_guessed_from_key() {
        let response = build_asset_response(
            "covers/a.png",
            StoredAsset {
                bytes: Bytes::new(),
                content_type: None,
            },
        );
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");

        let unknown = build_asset_response(
            "f0e1",
            StoredAsset {
                bytes: Bytes::new(),
                content_type: None,
            },
        );
        assert_eq!(
            unknown.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );
    }
}
