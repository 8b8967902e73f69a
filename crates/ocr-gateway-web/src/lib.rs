pub mod error;
pub mod handlers;
pub mod models;
pub mod server;
pub mod state;
pub mod upload;

pub use error::ApiError;
pub use models::{ErrorResponse, HealthResponse, OcrResponse};
pub use server::{OcrServer, RunningServer};
