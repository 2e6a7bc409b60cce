use crate::access::PolicyStoreError;
use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Policy(PolicyStoreError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Policy(err) => write!(f, "policy error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Policy(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<PolicyStoreError> for AppError {
    fn from(value: PolicyStoreError) -> Self {
        Self::Policy(value)
    }
}

/// Discriminator carried by every failure that crosses the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    Conflict,
    Unclassified,
}

impl ErrorKind {
    pub const fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation | ErrorKind::Unclassified => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Conflict => StatusCode::CONFLICT,
        }
    }
}

/// Domain failures that know their boundary kind.
pub trait Classified: fmt::Display {
    fn kind(&self) -> ErrorKind;

    /// Human-readable detail; `None` renders a bare failure.
    fn message(&self) -> Option<String> {
        Some(self.to_string())
    }
}

/// Translate a classified failure into a response without inspecting it
/// beyond its kind and message.
pub fn failure_response<E: Classified>(error: &E) -> Response {
    let kind = error.kind();
    let body = match error.message() {
        Some(message) => json!({ "error": kind, "message": message }),
        None => json!({ "error": kind }),
    };
    (kind.status(), Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Bare;

    impl fmt::Display for Bare {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("bare")
        }
    }

    impl Classified for Bare {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Forbidden
        }

        fn message(&self) -> Option<String> {
            None
        }
    }

    #[test]
    fn unclassified_defaults_to_bad_request() {
        assert_eq!(ErrorKind::Unclassified.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::Conflict.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn bare_failure_omits_message() {
        let response = failure_response(&Bare);
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn app_error_reports_internal_error() {
        let response = AppError::Config(ConfigError::InvalidPort).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
