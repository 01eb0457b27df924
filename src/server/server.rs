use anyhow::{Context, Result};
use std::time::Duration;

use tracing::{error, info};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

#[cfg(feature = "slowdown")]
use super::slowdown_request;
use super::{artifact, log_requests, progress_stream, state::*};
use crate::metadata::ResolvedMetadata;

#[derive(Deserialize, Debug, Default)]
pub struct LinkBody {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Serialize)]
struct TrackInfoResponse {
    success: bool,
    #[serde(flatten)]
    metadata: ResolvedMetadata,
}

#[derive(Serialize)]
struct DownloadResponse {
    success: bool,
    filename: String,
    title: String,
    message: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    uptime: String,
}

pub(super) fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

/// Validates the `url` of a request body, answering bad input with a JSON error.
fn validated_url(
    state: &ServerState,
    body: Result<Json<LinkBody>, JsonRejection>,
) -> Result<String, Response> {
    let Json(body) =
        body.map_err(|rejection| json_error(rejection.status(), rejection.body_text()))?;
    state
        .resolver
        .rules()
        .validate(body.url.as_deref())
        .map(str::to_string)
        .map_err(|err| json_error(StatusCode::BAD_REQUEST, err.to_string()))
}

async fn track_info(
    State(state): State<ServerState>,
    body: Result<Json<LinkBody>, JsonRejection>,
) -> Response {
    let link = match validated_url(&state, body) {
        Ok(link) => link,
        Err(response) => return response,
    };
    let link = link.as_str();

    match state.resolver.resolve(link).await {
        Ok(metadata) => Json(TrackInfoResponse {
            success: true,
            metadata,
        })
        .into_response(),
        Err(err) => {
            error!("Track info for {} failed: {}", link, err);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

async fn download(
    State(state): State<ServerState>,
    body: Result<Json<LinkBody>, JsonRejection>,
) -> Response {
    let link = match validated_url(&state, body) {
        Ok(link) => link,
        Err(response) => return response,
    };
    let link = link.as_str();

    match state.runner.run(link, None).await {
        Ok(result) => Json(DownloadResponse {
            success: true,
            filename: result.filename,
            title: result.title,
            message: "Download completed".to_string(),
        })
        .into_response(),
        Err(err) => {
            error!("Download of {} failed: {}", link, err);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime: format_uptime(state.start_time.elapsed()),
    })
}

pub fn make_app(state: ServerState) -> Router {
    let api_routes: Router = Router::new()
        .route("/track-info", post(track_info))
        .route("/download", post(download))
        .route(
            "/download-progress/{url}",
            get(progress_stream::download_progress),
        )
        .route("/download/{filename}", get(artifact::fetch_artifact))
        .route("/health", get(health))
        .with_state(state.clone());

    let mut app: Router = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    #[cfg(feature = "slowdown")]
    {
        app = app.layer(middleware::from_fn(slowdown_request));
    }
    app = app.layer(middleware::from_fn_with_state(state, log_requests));

    app
}

pub async fn run_server(state: ServerState) -> Result<()> {
    let port = state.config.port;
    let app = make_app(state);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    info!("Listening on http://127.0.0.1:{}", port);

    Ok(axum::serve(listener, app).await?)
}
