use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::infra::error::InfraError;

/// Diagnostic detail carried in response extensions for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Failures that stop the process before or while serving.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use axum::response::IntoResponse;

    use super::*;

    #[test]
    fn infra_failures_keep_their_message() {
        let error = AppError::from(InfraError::configuration("cms.url is not set"));
        assert_eq!(error.to_string(), "configuration error: cms.url is not set");
    }

    #[test]
    fn report_travels_in_response_extensions() {
        let mut response = StatusCode::BAD_GATEWAY.into_response();
        ErrorReport::from_message("test", StatusCode::BAD_GATEWAY, "cms down").attach(&mut response);

        let report = response.extensions().get::<ErrorReport>().expect("report");
        assert_eq!(report.messages, ["cms down"]);
    }
}
