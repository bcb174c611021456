//! HTTP surface: `GET /health` and `POST /api/analyze`.
//!
//! Every response carries a fixed set of security headers. The analyze
//! route charges the rate limiter before it reads the body.

mod handlers;
mod router;

use std::net::SocketAddr;

use axum::Router;
use thiserror::Error;
use tokio::sync::watch;

use crate::review::ReviewPipeline;

#[derive(Clone)]
pub(crate) struct AppState {
    pub pipeline: ReviewPipeline,
}

/// Default request body cap: 1 MiB.
pub const DEFAULT_MAX_BODY_SIZE: usize = 1_048_576;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, #[source] std::io::Error),

    #[error("server error: {0}")]
    Server(String),
}

/// Build the application router without binding a socket.
///
/// Handy for in-process tests via `tower::ServiceExt::oneshot`.
pub fn router(pipeline: ReviewPipeline) -> Router {
    router::build_router(
        AppState { pipeline },
        DEFAULT_MAX_BODY_SIZE,
    )
}

pub struct ReviewServer {
    addr: SocketAddr,
    max_body_size: usize,
    pipeline: ReviewPipeline,
    shutdown_rx: watch::Receiver<bool>,
}

impl ReviewServer {
    #[must_use]
    pub fn new(
        bind: &str,
        port: u16,
        pipeline: ReviewPipeline,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let addr: SocketAddr = format!("{bind}:{port}").parse().unwrap_or_else(|e| {
            tracing::warn!("invalid bind '{bind}': {e}, falling back to 127.0.0.1:{port}");
            SocketAddr::from(([127, 0, 0, 1], port))
        });

        Self {
            addr,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            pipeline,
            shutdown_rx,
        }
    }

    #[must_use]
    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Run until the shutdown channel flips to `true`.
    ///
    /// The limiter's expiry sweeper runs for the lifetime of the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or hits a fatal I/O error.
    pub async fn serve(self) -> Result<(), ServerError> {
        let sweeper = self.pipeline.limiter().start_sweeper();
        let state = AppState {
            pipeline: self.pipeline,
        };
        let router = router::build_router(state, self.max_body_size);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| ServerError::Bind(self.addr.to_string(), e))?;
        tracing::info!("resume-review listening on {}", self.addr);

        let mut shutdown_rx = self.shutdown_rx;
        let result = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            while !*shutdown_rx.borrow_and_update() {
                if shutdown_rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
            tracing::info!("resume-review shutting down");
        })
        .await
        .map_err(|e| ServerError::Server(format!("{e}")));

        sweeper.stop().await;
        result
    }
}
