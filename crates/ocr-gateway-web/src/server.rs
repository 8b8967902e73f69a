use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use ocr_gateway_core::{Config, OcrBackend};

use crate::handlers;
use crate::state::AppState;

/// Headroom on top of the upload limit for multipart boundaries and headers.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// An OCR gateway: configuration plus the backend it forwards images to.
///
/// Build the router with [`OcrServer::router`] to drive it in-process, or
/// [`OcrServer::start`] to serve it on a socket.
pub struct OcrServer {
    state: Arc<AppState>,
}

impl OcrServer {
    pub fn new(config: Config, backend: Arc<dyn OcrBackend>) -> Self {
        Self {
            state: Arc::new(AppState { config, backend }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.state.config
    }

    pub fn router(&self) -> Router {
        let body_limit = DefaultBodyLimit::max(
            self.state
                .config
                .max_upload_bytes
                .saturating_add(MULTIPART_OVERHEAD),
        );

        Router::new()
            .route("/ocr", post(handlers::ocr::ocr))
            .route("/health", get(handlers::health::health))
            .fallback(handlers::not_found)
            .layer(body_limit)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind the configured address and start serving in the background.
    pub async fn start(&self) -> std::io::Result<RunningServer> {
        let listener = tokio::net::TcpListener::bind(self.state.config.bind_addr()).await?;
        let local_addr = listener.local_addr()?;
        let app = self.router();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        tracing::info!(
            addr = %local_addr,
            backend = self.state.backend.name(),
            "OCR gateway listening"
        );

        Ok(RunningServer {
            local_addr,
            shutdown: Some(shutdown_tx),
            handle,
        })
    }
}

/// Handle to a server started with [`OcrServer::start`].
pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections, let in-flight requests finish, and wait
    /// for the server task to exit.
    pub async fn stop(mut self) -> std::io::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tracing::info!(addr = %self.local_addr, "OCR gateway shutting down");
        self.wait().await
    }

    /// Wait for the server task to exit without asking it to.
    pub async fn wait(self) -> std::io::Result<()> {
        self.handle.await.map_err(std::io::Error::other)?
    }
}
