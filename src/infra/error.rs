use thiserror::Error;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("cms responded with {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("cms transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("cms payload could not be decoded: {message}")]
    Decode { message: String },
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        Self::Upstream {
            status,
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }

    /// HTTP status reported by the CMS, when the failure came from a response.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            InfraError::Upstream { status, .. } => Some(*status),
            InfraError::Http(err) => err.status().map(|status| status.as_u16()),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, InfraError::Http(err) if err.is_timeout())
    }
}
