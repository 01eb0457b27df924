use serde::{Deserialize, Serialize};

use crate::metadata::{ResolvedCollection, ResolvedItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Downloading,
    Completed,
    Error,
}

impl QueueStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Completed | QueueStatus::Error)
    }
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Downloading => "downloading",
            QueueStatus::Completed => "completed",
            QueueStatus::Error => "error",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: u64,
    pub url: String,
    pub status: QueueStatus,
    /// Display title, `"<uploader> - <title>"` when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub song_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_message: Option<String>,
}

impl QueueItem {
    pub fn new(id: u64, item: NewItem) -> Self {
        Self {
            id,
            url: item.url,
            status: QueueStatus::Pending,
            title: item.title,
            uploader: item.uploader,
            song_title: item.song_title,
            duration: item.duration,
            collection_name: item.collection_name,
            filename: None,
            error: None,
            progress: None,
            progress_message: None,
        }
    }

    /// Title to show, falling back to the url.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.url)
    }
}

/// Data for an item about to be queued.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewItem {
    pub url: String,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub song_title: Option<String>,
    pub duration: Option<f64>,
    pub collection_name: Option<String>,
}

impl NewItem {
    /// An item queued without metadata.
    pub fn bare(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn from_resolved(item: &ResolvedItem, collection_name: Option<&str>) -> Self {
        Self {
            url: item.url.clone(),
            title: Some(item.full_title.clone()),
            uploader: item.uploader.clone(),
            song_title: item.title.clone(),
            duration: item.duration,
            collection_name: collection_name.map(str::to_string),
        }
    }

    pub fn from_collection(collection: &ResolvedCollection) -> Vec<Self> {
        let name = collection.display_title();
        collection
            .items
            .iter()
            .map(|item| Self::from_resolved(item, Some(name)))
            .collect()
    }
}

/// Everything the store persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub items: Vec<QueueItem>,
    /// Next id to hand out; never decreases.
    pub next_id: u64,
}

impl Default for QueueSnapshot {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_id: 1,
        }
    }
}
