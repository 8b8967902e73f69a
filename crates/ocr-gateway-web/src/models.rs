use serde::{Deserialize, Serialize};

/// Body of a successful `POST /ocr`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrResponse {
    pub extracted_text: String,
}

/// Body of every error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend: String,
    pub available: bool,
}
