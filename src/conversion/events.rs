//! Events emitted by a conversion job and their wire form.

use serde::{Deserialize, Serialize};

use super::runner::{ConversionError, ConversionResult};

pub const COMPLETED_MESSAGE: &str = "Completed!";
pub const FAILED_MESSAGE: &str = "Download failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub percent: u8,
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(percent: u8, message: impl Into<String>) -> Self {
        Self {
            percent: percent.min(100),
            message: message.into(),
        }
    }
}

/// Zero or more `Progress` events, then exactly one `Finished`.
#[derive(Debug)]
pub enum JobEvent {
    Progress(ProgressUpdate),
    Finished(Result<ConversionResult, ConversionError>),
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobEvent::Finished(_))
    }
}

/// JSON payload of one progress stream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StreamPayload {
    pub fn progress(update: &ProgressUpdate) -> Self {
        Self {
            success: None,
            progress: Some(update.percent),
            message: update.message.clone(),
            filename: None,
            title: None,
            error: None,
        }
    }

    pub fn completed(result: &ConversionResult) -> Self {
        Self {
            success: Some(true),
            progress: Some(100),
            message: COMPLETED_MESSAGE.to_string(),
            filename: Some(result.filename.clone()),
            title: Some(result.title.clone()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: Some(false),
            progress: Some(0),
            message: FAILED_MESSAGE.to_string(),
            filename: None,
            title: None,
            error: Some(error.into()),
        }
    }

    /// Terminal payloads carry `success`, progress updates don't.
    pub fn is_terminal(&self) -> bool {
        self.success.is_some()
    }
}

impl From<&JobEvent> for StreamPayload {
    fn from(event: &JobEvent) -> Self {
        match event {
            JobEvent::Progress(update) => StreamPayload::progress(update),
            JobEvent::Finished(Ok(result)) => StreamPayload::completed(result),
            JobEvent::Finished(Err(err)) => StreamPayload::failed(err.to_string()),
        }
    }
}
