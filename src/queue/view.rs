//! Aggregate view of the queue, as shown to the user.

use super::models::{QueueItem, QueueStatus};
use super::store::QueueStore;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QueueSummary {
    pub pending: usize,
    pub downloading: usize,
    pub completed: usize,
    pub error: usize,
}

impl QueueSummary {
    pub fn from_items(items: &[QueueItem]) -> Self {
        items.iter().fold(Self::default(), |mut acc, item| {
            match item.status {
                QueueStatus::Pending => acc.pending += 1,
                QueueStatus::Downloading => acc.downloading += 1,
                QueueStatus::Completed => acc.completed += 1,
                QueueStatus::Error => acc.error += 1,
            }
            acc
        })
    }

    pub fn total(&self) -> usize {
        self.pending + self.downloading + self.completed + self.error
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonState {
    pub label: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueView {
    pub summary: QueueSummary,
    pub download_all: ButtonState,
    pub download_completed: ButtonState,
}

impl QueueView {
    pub fn new(summary: QueueSummary, batch_running: bool) -> Self {
        let download_all = if batch_running {
            ButtonState {
                label: "Downloading...".to_string(),
                enabled: false,
            }
        } else if summary.pending > 0 {
            ButtonState {
                label: format!("Download all ({})", summary.pending),
                enabled: true,
            }
        } else {
            ButtonState {
                label: "Download all".to_string(),
                enabled: false,
            }
        };

        let download_completed = if summary.completed > 0 {
            ButtonState {
                label: format!("Download completed ({})", summary.completed),
                enabled: true,
            }
        } else {
            ButtonState {
                label: "Download completed".to_string(),
                enabled: false,
            }
        };

        Self {
            summary,
            download_all,
            download_completed,
        }
    }

    pub fn of(store: &QueueStore) -> Self {
        Self::new(
            QueueSummary::from_items(store.items()),
            store.is_batch_running(),
        )
    }
}

/// One-line status for an item.
pub fn status_text(item: &QueueItem) -> String {
    match item.status {
        QueueStatus::Pending => "Waiting".to_string(),
        QueueStatus::Downloading => item
            .progress_message
            .clone()
            .unwrap_or_else(|| format!("{}%", item.progress.unwrap_or(0))),
        QueueStatus::Completed => format!("Completed: {}", item.display_title()),
        QueueStatus::Error => format!(
            "Error: {}",
            item.error.as_deref().unwrap_or("Unknown error")
        ),
    }
}
