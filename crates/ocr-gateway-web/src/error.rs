use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use ocr_gateway_core::{BackendError, GatewayError};

use crate::models::ErrorResponse;

/// A [`GatewayError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            GatewayError::BadRequest(_) | GatewayError::UnsupportedImage(_) => {
                StatusCode::BAD_REQUEST
            }
            GatewayError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Timeout(_) | GatewayError::OcrBackend(BackendError::TimedOut(_)) => {
                StatusCode::GATEWAY_TIMEOUT
            }
            GatewayError::OcrBackend(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_client_error() {
            tracing::debug!(status = status.as_u16(), error = %self.0, "rejected request");
        }
        let body = ErrorResponse {
            error: self.0.public_message(),
        };
        (status, Json(body)).into_response()
    }
}
