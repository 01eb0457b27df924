use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::lookup::MetadataLookup;
use super::models::{ResolvedItem, ResolvedMetadata, UNKNOWN_TRACK_TITLE};
use super::strategies::{default_strategies, CollectionStrategy, StrategyContext};
use crate::link::{LinkKind, LinkRules};

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub item_timeout: Duration,
    pub enumeration_timeout: Duration,
    pub enrichment_timeout: Duration,
    /// How many leading collection members get a real metadata lookup.
    pub enrichment_head: usize,
    pub placeholder_fallback: bool,
    pub placeholder_count: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            item_timeout: Duration::from_secs(30),
            enumeration_timeout: Duration::from_secs(45),
            enrichment_timeout: Duration::from_secs(5),
            enrichment_head: 3,
            placeholder_fallback: false,
            placeholder_count: 3,
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("could not fetch track info: {reason}")]
pub struct UpstreamError {
    pub reason: String,
}

impl UpstreamError {
    fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

pub struct MetadataResolver {
    lookup: Arc<dyn MetadataLookup>,
    rules: LinkRules,
    settings: ResolverSettings,
    strategies: Vec<Box<dyn CollectionStrategy>>,
}

impl MetadataResolver {
    pub fn new(lookup: Arc<dyn MetadataLookup>, rules: LinkRules, settings: ResolverSettings) -> Self {
        let strategies = default_strategies(&settings);
        Self::with_strategies(lookup, rules, settings, strategies)
    }

    pub fn with_strategies(
        lookup: Arc<dyn MetadataLookup>,
        rules: LinkRules,
        settings: ResolverSettings,
        strategies: Vec<Box<dyn CollectionStrategy>>,
    ) -> Self {
        Self {
            lookup,
            rules,
            settings,
            strategies,
        }
    }

    pub fn rules(&self) -> &LinkRules {
        &self.rules
    }

    /// Resolves a link into a single item or a collection of at least two.
    pub async fn resolve(&self, link: &str) -> Result<ResolvedMetadata, UpstreamError> {
        match self.rules.classify(link) {
            LinkKind::Single => Ok(ResolvedMetadata::Single(self.resolve_single(link).await?)),
            LinkKind::Collection => self.resolve_collection(link).await,
        }
    }

    /// One metadata lookup for a single item.
    pub async fn resolve_single(&self, link: &str) -> Result<ResolvedItem, UpstreamError> {
        let fields = self
            .lookup
            .describe(link, self.settings.item_timeout)
            .await
            .map_err(|err| {
                warn!("Metadata lookup failed for {}: {}", link, err);
                UpstreamError::new(err.to_string())
            })?;
        debug!("Resolved {}: {:?}", link, fields);
        Ok(ResolvedItem::from_fields(link, fields, UNKNOWN_TRACK_TITLE))
    }

    async fn resolve_collection(&self, link: &str) -> Result<ResolvedMetadata, UpstreamError> {
        let ctx = StrategyContext {
            lookup: self.lookup.as_ref(),
            rules: &self.rules,
            settings: &self.settings,
        };
        for strategy in &self.strategies {
            let Some(mut collection) = strategy.attempt(link, &ctx).await else {
                continue;
            };
            info!(
                "Resolved {} members of {} with {}",
                collection.count,
                link,
                strategy.name()
            );
            return match collection.items.len() {
                0 => Ok(ResolvedMetadata::Single(self.resolve_single(link).await?)),
                1 => Ok(ResolvedMetadata::Single(collection.items.remove(0))),
                _ => Ok(ResolvedMetadata::Collection(collection)),
            };
        }
        Err(UpstreamError::new(format!(
            "no strategy could list the members of {}",
            link
        )))
    }
}
