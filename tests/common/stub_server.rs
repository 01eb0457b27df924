//! Minimal stand-in server whose progress streams end without a result.

use axum::{
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;

/// One progress frame, then the body ends.
pub const TRUNCATED_STREAM: &str =
    "data: {\"progress\":30,\"message\":\"Starting download...\"}\n\n";

pub struct DroppingStreamServer {
    pub base_url: String,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl DroppingStreamServer {
    pub async fn spawn() -> Self {
        let app = Router::new()
            .route(
                "/api/track-info",
                post(|| async {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({ "error": "could not fetch track info" })),
                    )
                }),
            )
            .route(
                "/api/download-progress/{url}",
                get(|| async {
                    (
                        [(header::CONTENT_TYPE, "text/event-stream")],
                        TRUNCATED_STREAM,
                    )
                        .into_response()
                }),
            );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}", port),
            _shutdown_tx: Some(shutdown_tx),
        }
    }
}

impl Drop for DroppingStreamServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
