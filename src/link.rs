//! Link validation and classification.
//!
//! Shared by the server request boundary and the queue client, which both
//! reject missing or foreign links before doing any work.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_DOMAIN: &str = "soundcloud.com";
pub const DEFAULT_COLLECTION_MARKER: &str = "/sets/";
pub const DEFAULT_BACK_REFERENCE_MARKER: &str = "?in=";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("URL is required")]
    MissingLink,

    #[error("Only {0} URLs are allowed")]
    ForeignDomain(String),
}

/// Whether a link points at one item or at a collection of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Single,
    Collection,
}

#[derive(Debug, Clone)]
pub struct LinkRules {
    pub domain: String,
    pub collection_marker: String,
    /// Present on links to a single item opened from inside a collection.
    pub back_reference_marker: String,
}

impl Default for LinkRules {
    fn default() -> Self {
        Self::for_domain(DEFAULT_DOMAIN)
    }
}

impl LinkRules {
    pub fn for_domain(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            collection_marker: DEFAULT_COLLECTION_MARKER.to_string(),
            back_reference_marker: DEFAULT_BACK_REFERENCE_MARKER.to_string(),
        }
    }

    /// Validates a submitted link, returning it trimmed.
    pub fn validate<'a>(&self, raw: Option<&'a str>) -> Result<&'a str, ValidationError> {
        let link = raw.map(str::trim).unwrap_or_default();
        if link.is_empty() {
            return Err(ValidationError::MissingLink);
        }
        if !self.is_hosted(link) {
            return Err(ValidationError::ForeignDomain(self.domain.clone()));
        }
        Ok(link)
    }

    pub fn is_hosted(&self, url: &str) -> bool {
        url.contains(&self.domain)
    }

    pub fn classify(&self, link: &str) -> LinkKind {
        if link.contains(&self.collection_marker) && !link.contains(&self.back_reference_marker) {
            LinkKind::Collection
        } else {
            LinkKind::Single
        }
    }

    /// Name of the collection path segment, e.g. `sets` for `/sets/`.
    pub fn collection_segment(&self) -> &str {
        self.collection_marker.trim_matches('/')
    }

    /// Path segments following the hosting domain, query and fragment excluded.
    pub fn path_segments<'a>(&self, url: &'a str) -> Vec<&'a str> {
        let Some(start) = url.find(&self.domain) else {
            return Vec::new();
        };
        let rest = &url[start + self.domain.len()..];
        let end = rest.find(['?', '#']).unwrap_or(rest.len());
        rest[..end].split('/').filter(|s| !s.is_empty()).collect()
    }
}
