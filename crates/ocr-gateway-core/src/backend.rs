//! The OCR backend capability.
//!
//! The gateway never recognizes text itself; it hands a decoded image to an
//! [`OcrBackend`] and returns whatever text comes back. Implementations are
//! blocking and are always driven from a blocking worker thread.

use std::time::Duration;

use thiserror::Error;

use crate::decode::DecodedImage;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend not available: {0}")]
    NotAvailable(String),
    #[error("recognition failed: {0}")]
    Failed(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode image for backend: {0}")]
    Encode(#[from] image::ImageError),
    #[error("backend did not finish within {0:?}")]
    TimedOut(Duration),
}

/// A text recognition engine.
pub trait OcrBackend: Send + Sync {
    /// Short identifier used in logs and the health endpoint.
    fn name(&self) -> &str;

    /// Whether the engine can currently be invoked (binary installed, models present...).
    fn is_available(&self) -> bool {
        true
    }

    /// Recognize the text in `image`. May block for as long as the engine needs.
    fn recognize(&self, image: &DecodedImage) -> Result<String, BackendError>;
}
