use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::core::{AcquireError, DeliveryError};

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced over HTTP.
///
/// Every variant renders as a `text/plain` diagnostic. Clip production failures
/// are server failures; no cached or partial audio is ever substituted.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Acquire(#[from] AcquireError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Acquire(AcquireError::UnknownSlot(_)) => StatusCode::BAD_REQUEST,
            AppError::Delivery(_) | AppError::Acquire(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), "Request failed: {}", self);
        }

        (
            status,
            [(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            )],
            self.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SlotIndex;

    #[test]
    fn test_status_codes() {
        let upstream = AcquireError::Upstream {
            slot: SlotIndex::new(1),
            message: "503".to_string(),
        };
        assert_eq!(
            AppError::from(DeliveryError::DeliveryFailure {
                slot: SlotIndex::new(1),
                source: upstream.clone(),
            })
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(upstream).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::from(AcquireError::UnknownSlot(SlotIndex::new(9))).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_response_is_plain_text() {
        let response = AppError::from(AcquireError::EmptyResult(SlotIndex::new(2))).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
    }
}
