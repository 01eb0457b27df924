//! Server-sent progress events for one conversion.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, warn};

use super::server::json_error;
use super::state::ServerState;
use crate::conversion::{JobEvent, StreamPayload};

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);
const JOB_VANISHED: &str = "conversion ended without a result";

/// Turns job events into payloads, ending right after the first terminal one.
///
/// A channel that closes before any terminal event yields a synthesized failure.
pub fn payloads(rx: UnboundedReceiver<JobEvent>) -> impl Stream<Item = StreamPayload> {
    stream::unfold(Some(rx), |rx| async move {
        let mut rx = rx?;
        match rx.recv().await {
            Some(event) => {
                let payload = StreamPayload::from(&event);
                let next = if event.is_terminal() { None } else { Some(rx) };
                Some((payload, next))
            }
            None => {
                warn!("Conversion channel closed without a terminal event");
                Some((StreamPayload::failed(JOB_VANISHED), None))
            }
        }
    })
}

fn to_event(payload: StreamPayload) -> Result<Event, Infallible> {
    let json = serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string());
    Ok(Event::default().data(json))
}

pub async fn download_progress(
    State(state): State<ServerState>,
    Path(url): Path<String>,
) -> Response {
    let link = match state.resolver.rules().validate(Some(url.as_str())) {
        Ok(link) => link.to_string(),
        Err(err) => return json_error(StatusCode::BAD_REQUEST, err.to_string()),
    };
    debug!("Opening progress stream for {}", link);

    let rx = state.runner.spawn(link);
    Sse::new(payloads(rx).map(to_event))
        .keep_alive(KeepAlive::new().interval(KEEP_ALIVE_INTERVAL))
        .into_response()
}
