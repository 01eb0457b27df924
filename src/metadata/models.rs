//! Resolved metadata returned to clients.

use serde::{Deserialize, Serialize};

/// Display title used when a single item has no usable metadata.
pub const UNKNOWN_TRACK_TITLE: &str = "Unknown Track";

/// Display title used when a collection has no derivable name.
pub const UNKNOWN_COLLECTION_TITLE: &str = "Playlist";

const UNAVAILABLE_SENTINELS: [&str; 4] = ["na", "null", "undefined", "none"];

/// Normalizes an upstream field, mapping "not available" sentinels to `None`.
pub fn normalize_field(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty()
        || UNAVAILABLE_SENTINELS
            .iter()
            .any(|s| value.eq_ignore_ascii_case(s))
    {
        None
    } else {
        Some(value.to_string())
    }
}

/// `"<uploader> - <title>"` when both are known, else the title.
pub fn compose_display_title(title: Option<&str>, uploader: Option<&str>) -> Option<String> {
    match (title, uploader) {
        (Some(title), Some(uploader)) => Some(format!("{} - {}", uploader, title)),
        (Some(title), None) => Some(title.to_string()),
        _ => None,
    }
}

/// Raw per-item fields as reported by the upstream lookup, already normalized.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemFields {
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub duration: Option<f64>,
}

impl ItemFields {
    /// Parses the first line of a `title|uploader|duration` triple.
    pub fn parse_delimited(output: &str) -> Self {
        let line = output.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        let mut parts = line.split('|');
        let title = normalize_field(parts.next());
        let uploader = normalize_field(parts.next());
        let duration = normalize_field(parts.next())
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d >= 0.0);
        Self {
            title,
            uploader,
            duration,
        }
    }

    /// Prefers fields from `other` where present, keeping ours otherwise.
    pub fn superseded_by(self, other: ItemFields) -> Self {
        Self {
            title: other.title.or(self.title),
            uploader: other.uploader.or(self.uploader),
            duration: other.duration.or(self.duration),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.uploader.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedItem {
    pub url: String,
    pub title: Option<String>,
    pub uploader: Option<String>,
    pub duration: Option<f64>,
    pub full_title: String,
}

impl ResolvedItem {
    pub fn from_fields(url: impl Into<String>, fields: ItemFields, fallback_title: &str) -> Self {
        let full_title =
            compose_display_title(fields.title.as_deref(), fields.uploader.as_deref())
                .unwrap_or_else(|| fallback_title.to_string());
        Self {
            url: url.into(),
            title: fields.title,
            uploader: fields.uploader,
            duration: fields.duration,
            full_title,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCollection {
    pub collection_title: Option<String>,
    pub collection_uploader: Option<String>,
    pub count: usize,
    pub items: Vec<ResolvedItem>,
}

impl ResolvedCollection {
    pub fn new(
        collection_title: Option<String>,
        collection_uploader: Option<String>,
        items: Vec<ResolvedItem>,
    ) -> Self {
        Self {
            collection_title,
            collection_uploader,
            count: items.len(),
            items,
        }
    }

    pub fn display_title(&self) -> &str {
        self.collection_title
            .as_deref()
            .unwrap_or(UNKNOWN_COLLECTION_TITLE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedMetadata {
    Single(ResolvedItem),
    Collection(ResolvedCollection),
}

impl ResolvedMetadata {
    pub fn is_collection(&self) -> bool {
        matches!(self, ResolvedMetadata::Collection(_))
    }
}
