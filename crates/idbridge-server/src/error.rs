//! Boundary error mapping
//!
//! Pipeline failures become JSON error responses here. The status code is
//! driven by [`FailureClass`], which keeps the caller-visible contract
//! stable while the body's `error` code tells operators which class fired:
//! `invalid-argument`, `failed-precondition`, `unauthenticated`, or
//! `unavailable`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use idbridge_federation::{FailureClass, FederationError};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// Failures surfaced to HTTP callers
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body carried no usable token
    #[error("id_token is required")]
    MissingIdToken,

    /// A pipeline failure
    #[error(transparent)]
    Federation(#[from] FederationError),
}

/// JSON error body
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl ApiError {
    fn code_and_status(&self) -> (&'static str, StatusCode) {
        match self {
            Self::MissingIdToken => ("invalid-argument", StatusCode::BAD_REQUEST),
            Self::Federation(err) => match err.class() {
                FailureClass::InvalidArgument => ("invalid-argument", StatusCode::BAD_REQUEST),
                FailureClass::FailedPrecondition => {
                    ("failed-precondition", StatusCode::PRECONDITION_FAILED)
                }
                FailureClass::Unauthenticated => ("unauthenticated", StatusCode::UNAUTHORIZED),
                FailureClass::Unavailable => ("unavailable", StatusCode::SERVICE_UNAVAILABLE),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, status) = self.code_and_status();
        warn!(error = %self, code, "request failed");
        let body = ErrorBody {
            error: code,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_token_is_invalid_argument() {
        let (code, status) = ApiError::MissingIdToken.code_and_status();
        assert_eq!(code, "invalid-argument");
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn verification_failures_are_unauthenticated() {
        let err = ApiError::from(FederationError::Expired);
        let (code, status) = err.code_and_status();
        assert_eq!(code, "unauthenticated");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn configuration_failures_are_preconditions() {
        let err = ApiError::from(FederationError::ConfigurationInvalid("audience".into()));
        let (code, status) = err.code_and_status();
        assert_eq!(code, "failed-precondition");
        assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    }

    #[test]
    fn collaborator_failures_are_unavailable() {
        let err = ApiError::from(FederationError::KeySetUnavailable("down".into()));
        let (_, status) = err.code_and_status();
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
