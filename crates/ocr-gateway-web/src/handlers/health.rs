use axum::Json;
use axum::extract::State;
use std::sync::Arc;

use crate::models::HealthResponse;
use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let backend = state.backend.clone();
    // Probing may spawn a process.
    let available = tokio::task::spawn_blocking(move || backend.is_available())
        .await
        .unwrap_or(false);

    Json(HealthResponse {
        status: "ok".to_string(),
        backend: state.backend.name().to_string(),
        available,
    })
}
