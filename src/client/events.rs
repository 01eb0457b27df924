//! Client side of the progress stream.

use std::collections::VecDeque;

use tracing::{debug, warn};

use super::error::ClientError;
use crate::conversion::{ProgressUpdate, StreamPayload};

/// Incremental decoder for `text/event-stream` bodies.
///
/// Only `data:` fields are kept; comments and other fields are skipped.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    /// Feeds raw bytes, returning the data of every event they complete.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    events.push(self.data.join("\n"));
                    self.data.clear();
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            if field == "data" {
                self.data.push(value.to_string());
            }
        }
        events
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Progress(ProgressUpdate),
    Completed { filename: String, title: String },
    Failed { error: String },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Progress(_))
    }
}

impl From<StreamPayload> for StreamEvent {
    fn from(payload: StreamPayload) -> Self {
        match payload.success {
            Some(true) => StreamEvent::Completed {
                filename: payload.filename.unwrap_or_default(),
                title: payload.title.unwrap_or_default(),
            },
            Some(false) => StreamEvent::Failed {
                error: payload.error.unwrap_or(payload.message),
            },
            None => StreamEvent::Progress(ProgressUpdate::new(
                payload.progress.unwrap_or(0),
                payload.message,
            )),
        }
    }
}

/// Open progress stream for one conversion.
pub struct ProgressSubscription {
    response: reqwest::Response,
    decoder: SseDecoder,
    pending: VecDeque<StreamEvent>,
    finished: bool,
}

impl ProgressSubscription {
    pub(super) fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Next event; `Ok(None)` once the terminal event was returned.
    ///
    /// A stream that ends or breaks before its terminal event yields
    /// [`ClientError::Transport`].
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>, ClientError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                if event.is_terminal() {
                    self.finished = true;
                    self.pending.clear();
                }
                return Ok(Some(event));
            }
            if self.finished {
                return Ok(None);
            }

            let chunk = self
                .response
                .chunk()
                .await
                .map_err(|e| ClientError::Transport(e.to_string()))?;
            let Some(chunk) = chunk else {
                return Err(ClientError::Transport(
                    "progress stream ended before the conversion finished".to_string(),
                ));
            };

            for data in self.decoder.push(&chunk) {
                match serde_json::from_str::<StreamPayload>(&data) {
                    Ok(payload) => self.pending.push_back(payload.into()),
                    Err(e) => warn!("Skipping malformed progress event {:?}: {}", data, e),
                }
            }
            debug!("Buffered {} progress events", self.pending.len());
        }
    }
}
