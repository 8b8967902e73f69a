use std::sync::Arc;

use ocr_gateway_core::{Config, OcrBackend};

/// Shared application state accessible from all handlers. Read-only after
/// construction.
pub struct AppState {
    pub config: Config,
    pub backend: Arc<dyn OcrBackend>,
}
