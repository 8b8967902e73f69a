//! The request pipeline: validate → decode → recognize.

use std::sync::Arc;
use std::time::Instant;

use crate::backend::{BackendError, OcrBackend};
use crate::decode::{self, DecodedImage};
use crate::{Config, GatewayError};

/// An image received from a client, before any validation.
#[derive(Debug, Clone, Default)]
pub struct UploadedImage {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

/// Run one upload through the whole pipeline and return the recognized text.
///
/// Decoding and recognition both run on the blocking pool. Recognition is
/// bounded by `config.ocr_timeout`.
pub async fn recognize_upload(
    upload: UploadedImage,
    backend: Arc<dyn OcrBackend>,
    config: &Config,
) -> Result<String, GatewayError> {
    if upload.data.is_empty() {
        return Err(GatewayError::BadRequest("uploaded file is empty".to_string()));
    }
    if upload.data.len() > config.max_upload_bytes {
        return Err(GatewayError::UploadTooLarge {
            limit: config.max_upload_bytes,
        });
    }

    let filename = upload.filename.unwrap_or_else(|| "upload".to_string());
    let size = upload.data.len();
    let decoded = decode_blocking(upload.data, config).await?;

    tracing::debug!(
        filename = %filename,
        size,
        format = decode::format_name(decoded.format),
        width = decoded.width(),
        height = decoded.height(),
        "decoded upload"
    );

    let start = Instant::now();
    let text = recognize_blocking(decoded, backend, config).await?;

    tracing::info!(
        filename = %filename,
        size,
        chars = text.chars().count(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "recognized text"
    );

    Ok(text)
}

async fn decode_blocking(data: Vec<u8>, config: &Config) -> Result<DecodedImage, GatewayError> {
    let limits = config.images.clone();
    tokio::task::spawn_blocking(move || decode::decode_image(&data, &limits))
        .await
        .map_err(|e| join_failure("decoder", e))?
}

/// A blocking task that panicked or was cancelled is a server fault, not a
/// problem with the upload.
fn join_failure(stage: &str, err: tokio::task::JoinError) -> GatewayError {
    tracing::error!(stage, error = %err, "blocking task aborted");
    GatewayError::Internal(format!("{stage} task aborted"))
}

async fn recognize_blocking(
    image: DecodedImage,
    backend: Arc<dyn OcrBackend>,
    config: &Config,
) -> Result<String, GatewayError> {
    let backend_name = backend.name().to_string();
    let task = tokio::task::spawn_blocking(move || backend.recognize(&image));

    match tokio::time::timeout(config.ocr_timeout, task).await {
        Ok(Ok(Ok(text))) => Ok(text),
        Ok(Ok(Err(BackendError::TimedOut(limit)))) => {
            tracing::warn!(backend = %backend_name, ?limit, "backend killed after deadline");
            Err(GatewayError::Timeout(limit))
        }
        Ok(Ok(Err(e))) => {
            tracing::error!(backend = %backend_name, error = %e, "OCR backend failed");
            Err(GatewayError::OcrBackend(e))
        }
        Ok(Err(join_err)) => {
            tracing::error!(backend = %backend_name, error = %join_err, "OCR backend task aborted");
            Err(GatewayError::OcrBackend(BackendError::Failed(
                "backend task aborted".to_string(),
            )))
        }
        Err(_) => {
            tracing::warn!(
                backend = %backend_name,
                timeout = ?config.ocr_timeout,
                "OCR backend timed out"
            );
            Err(GatewayError::Timeout(config.ocr_timeout))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::Duration;

    use image::{DynamicImage, ImageBuffer, ImageFormat, Luma};

    struct Dimensions;

    impl OcrBackend for Dimensions {
        fn name(&self) -> &str {
            "dimensions"
        }

        fn recognize(&self, image: &DecodedImage) -> Result<String, BackendError> {
            Ok(format!("{}x{}", image.width(), image.height()))
        }
    }

    struct Sleepy(Duration);

    impl OcrBackend for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn recognize(&self, _image: &DecodedImage) -> Result<String, BackendError> {
            std::thread::sleep(self.0);
            Ok(String::new())
        }
    }

    struct Broken;

    impl OcrBackend for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn recognize(&self, _image: &DecodedImage) -> Result<String, BackendError> {
            Err(BackendError::Failed("language pack missing".to_string()))
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(width, height, Luma([0u8])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn upload(data: Vec<u8>) -> UploadedImage {
        UploadedImage {
            filename: Some("scan.png".to_string()),
            content_type: Some("image/png".to_string()),
            data,
        }
    }

    #[tokio::test]
    async fn recognizes_decoded_image() {
        let text = recognize_upload(upload(png(3, 5)), Arc::new(Dimensions), &Config::default())
            .await
            .unwrap();
        assert_eq!(text, "3x5");
    }

    #[tokio::test]
    async fn empty_upload_is_bad_request() {
        let err = recognize_upload(upload(Vec::new()), Arc::new(Dimensions), &Config::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::BadRequest(_)));
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected_before_decoding() {
        let config = Config {
            max_upload_bytes: 16,
            ..Config::default()
        };
        let err = recognize_upload(upload(vec![0u8; 17]), Arc::new(Dimensions), &config)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UploadTooLarge { limit: 16 }));
    }

    #[tokio::test]
    async fn backend_failure_is_reported() {
        let err = recognize_upload(upload(png(2, 2)), Arc::new(Broken), &Config::default())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::OcrBackend(BackendError::Failed(_))));
    }

    #[tokio::test]
    async fn panicking_task_becomes_internal_error() {
        let join_err = tokio::task::spawn_blocking(|| -> u8 { panic!("decoder exploded") })
            .await
            .unwrap_err();
        let err = join_failure("decoder", join_err);
        assert!(matches!(err, GatewayError::Internal(_)));
        assert!(!err.public_message().contains("exploded"));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let config = Config {
            ocr_timeout: Duration::from_millis(50),
            ..Config::default()
        };
        let backend = Arc::new(Sleepy(Duration::from_millis(500)));
        let err = recognize_upload(upload(png(2, 2)), backend, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Timeout(d) if d == Duration::from_millis(50)));
    }
}
