use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;

use ocr_gateway_core::{GatewayError, UploadedImage};

/// Name of the multipart field carrying the image.
pub const FILE_FIELD: &str = "file";

/// Pull the `file` field out of a multipart upload. Other fields are drained
/// and ignored; if `file` appears more than once the first one wins.
pub async fn parse_multipart(
    mut multipart: Multipart,
    max_upload_bytes: usize,
) -> Result<UploadedImage, GatewayError> {
    let mut file: Option<UploadedImage> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_upload_bytes))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == FILE_FIELD && file.is_none() {
            let filename = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| multipart_error(e, max_upload_bytes))?
                .to_vec();

            file = Some(UploadedImage {
                filename,
                content_type,
                data,
            });
        } else {
            field
                .bytes()
                .await
                .map_err(|e| multipart_error(e, max_upload_bytes))?;
        }
    }

    file.ok_or_else(|| GatewayError::BadRequest("no file provided".to_string()))
}

fn multipart_error(err: MultipartError, max_upload_bytes: usize) -> GatewayError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GatewayError::UploadTooLarge {
            limit: max_upload_bytes,
        }
    } else {
        GatewayError::BadRequest(format!("failed to read form field: {}", err.body_text()))
    }
}
