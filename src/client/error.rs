use thiserror::Error;

use crate::link::ValidationError;
use crate::queue::QueueError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The progress stream went away before a terminal event.
    #[error("Connection error: {0}")]
    Transport(String),

    #[error("server responded with {status}: {message}")]
    Server { status: u16, message: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
