pub mod health;
pub mod ocr;

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::models::ErrorResponse;

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: "not found".to_string(),
        }),
    )
}
