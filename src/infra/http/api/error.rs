use crate::application::content::ContentError;
use crate::application::error::ErrorReport;
use crate::application::repos::RepoError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

const SOURCE: &str = "infra::http::api";

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// JSON error returned by every API route.
///
/// `detail` is logged through the attached [`ErrorReport`] and never sent to
/// the client; `hint` is.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
    hint: Option<String>,
    detail: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: &'static str, hint: Option<String>) -> Self {
        Self {
            status,
            message,
            hint,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, hint)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized", None)
    }

    pub fn invalid_csrf() -> Self {
        Self::new(StatusCode::FORBIDDEN, "Invalid CSRF token", None)
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, message, None)
    }

    pub fn internal(message: &'static str) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, None)
    }
}

impl From<ContentError> for ApiError {
    fn from(err: ContentError) -> Self {
        let detail = err.to_string();
        let api = match &err {
            ContentError::Validation(domain) => {
                ApiError::bad_request("Invalid input", Some(domain.to_string()))
            }
            ContentError::Unauthorized => ApiError::unauthorized(),
            ContentError::Configuration(_) => ApiError::internal("Service misconfigured"),
            ContentError::Repo(RepoError::InvalidInput { message }) => {
                ApiError::bad_request("Invalid input", Some(message.clone()))
            }
            ContentError::Repo(_) => ApiError::internal("Upstream request failed"),
        };
        api.with_detail(detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: self.message.to_string(),
            hint: self.hint.clone(),
        };
        let mut response = (self.status, Json(body)).into_response();
        // The logging middleware reads this to explain failures.
        let diagnostic = self
            .detail
            .or(self.hint)
            .unwrap_or_else(|| self.message.to_string());
        ErrorReport::from_message(SOURCE, self.status, diagnostic).attach(&mut response);
        response
    }
}
