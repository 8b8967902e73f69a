use axum::Json;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use std::sync::Arc;

use ocr_gateway_core::{GatewayError, recognize_upload};

use crate::error::ApiError;
use crate::models::OcrResponse;
use crate::state::AppState;
use crate::upload;

pub async fn ocr(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<OcrResponse>, ApiError> {
    let multipart = multipart.map_err(|e| GatewayError::BadRequest(e.body_text()))?;
    let upload = upload::parse_multipart(multipart, state.config.max_upload_bytes).await?;

    let extracted_text = recognize_upload(upload, state.backend.clone(), &state.config).await?;

    Ok(Json(OcrResponse { extracted_text }))
}
