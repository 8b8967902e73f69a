use std::time::Duration;
use thiserror::Error;

pub mod backend;
pub mod config_file;
pub mod decode;
pub mod pipeline;
pub mod tesseract;

// Re-export for convenience
pub use backend::{BackendError, OcrBackend};
pub use decode::{DecodedImage, ImageLimits, decode_image};
pub use pipeline::{UploadedImage, recognize_upload};
pub use tesseract::{TesseractBackend, TesseractOptions};

/// Default TCP port the gateway listens on.
pub const DEFAULT_PORT: u16 = 6000;

/// Default upper bound on an uploaded image, in megabytes.
pub const DEFAULT_MAX_UPLOAD_MB: usize = 20;

/// Default bound on a single backend call.
pub const DEFAULT_OCR_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything that can go wrong while turning an upload into text.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("{0}")]
    BadRequest(String),
    #[error("upload exceeds the {limit} byte limit")]
    UploadTooLarge { limit: usize },
    #[error("unsupported image: {0}")]
    UnsupportedImage(String),
    #[error("OCR backend error: {0}")]
    OcrBackend(#[from] BackendError),
    #[error("OCR did not finish within {}s", .0.as_secs_f32())]
    Timeout(Duration),
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Message safe to hand back to a client. Backend failures are collapsed
    /// into a generic message; the detail only goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::OcrBackend(BackendError::NotAvailable(_)) => {
                "OCR backend is not available".to_string()
            }
            GatewayError::OcrBackend(BackendError::TimedOut(limit)) => {
                GatewayError::Timeout(*limit).to_string()
            }
            GatewayError::OcrBackend(_) => "OCR backend failed to process the image".to_string(),
            GatewayError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Runtime configuration for a gateway instance.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    pub ocr_timeout: Duration,
    pub images: ImageLimits,
    pub tesseract: TesseractOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            ocr_timeout: DEFAULT_OCR_TIMEOUT,
            images: ImageLimits::default(),
            tesseract: TesseractOptions::default(),
        }
    }
}

impl Config {
    /// `host:port` string suitable for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Tesseract options with the gateway timeout applied to the child process.
    pub fn tesseract_options(&self) -> TesseractOptions {
        TesseractOptions {
            timeout: Some(self.ocr_timeout),
            ..self.tesseract.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_values() {
        let config = Config::default();
        assert_eq!(config.port, 6000);
        assert_eq!(config.bind_addr(), "127.0.0.1:6000");
        assert_eq!(config.max_upload_bytes, 20 * 1024 * 1024);
        assert_eq!(config.ocr_timeout, Duration::from_secs(30));
    }

    #[test]
    fn tesseract_options_inherit_gateway_timeout() {
        let config = Config {
            ocr_timeout: Duration::from_secs(7),
            ..Config::default()
        };
        assert_eq!(
            config.tesseract_options().timeout,
            Some(Duration::from_secs(7))
        );
    }

    #[test]
    fn backend_details_are_not_public() {
        let err = GatewayError::OcrBackend(BackendError::Failed(
            "Error opening data file /usr/share/tessdata/xyz.traineddata".to_string(),
        ));
        assert!(err.to_string().contains("tessdata"));
        assert!(!err.public_message().contains("tessdata"));
    }

    #[test]
    fn internal_errors_are_not_public() {
        let err = GatewayError::Internal("task 12 panicked with message \"boom\"".to_string());
        assert_eq!(err.public_message(), "internal server error");
    }

    #[test]
    fn client_errors_keep_their_message() {
        let err = GatewayError::BadRequest("no file provided".to_string());
        assert_eq!(err.public_message(), "no file provided");
    }
}
