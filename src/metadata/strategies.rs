//! Collection resolution strategies, tried in order until one yields members.

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, warn};

use super::guess::{collection_names, guess_from_url};
use super::lookup::{MetadataLookup, RequestProfile};
use super::models::{ResolvedCollection, ResolvedItem, UNKNOWN_COLLECTION_TITLE};
use super::resolver::ResolverSettings;
use crate::link::LinkRules;

/// Everything a strategy may use while resolving one collection link.
pub struct StrategyContext<'a> {
    pub lookup: &'a dyn MetadataLookup,
    pub rules: &'a LinkRules,
    pub settings: &'a ResolverSettings,
}

#[async_trait]
pub trait CollectionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns `None` when this strategy could not produce any member.
    async fn attempt(&self, link: &str, ctx: &StrategyContext<'_>) -> Option<ResolvedCollection>;
}

fn member_fallback_title(position: usize, collection_title: &str) -> String {
    format!("Track {} from {}", position, collection_title)
}

/// Flat member enumeration with one request profile.
pub struct FlatEnumeration {
    profile: RequestProfile,
}

impl FlatEnumeration {
    pub fn new(profile: RequestProfile) -> Self {
        Self { profile }
    }
}

#[async_trait]
impl CollectionStrategy for FlatEnumeration {
    fn name(&self) -> &'static str {
        match self.profile {
            RequestProfile::Default => "flat-enumeration",
            RequestProfile::AlternateUserAgent => "flat-enumeration-user-agent",
            RequestProfile::AlternateAccept => "flat-enumeration-accept",
        }
    }

    async fn attempt(&self, link: &str, ctx: &StrategyContext<'_>) -> Option<ResolvedCollection> {
        let members = match ctx
            .lookup
            .enumerate(link, self.profile, ctx.settings.enumeration_timeout)
            .await
        {
            Ok(members) => members,
            Err(err) => {
                warn!("{} failed for {}: {}", self.name(), link, err);
                return None;
            }
        };
        let members: Vec<String> = members
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty() && ctx.rules.is_hosted(m))
            .collect();
        if members.is_empty() {
            debug!("{} returned no usable members for {}", self.name(), link);
            return None;
        }

        let (collection_title, collection_uploader) = collection_names(link, ctx.rules);
        let display = collection_title
            .clone()
            .unwrap_or_else(|| UNKNOWN_COLLECTION_TITLE.to_string());

        let head = ctx.settings.enrichment_head.min(members.len());
        let enriched = join_all(
            members[..head]
                .iter()
                .map(|url| ctx.lookup.describe(url, ctx.settings.enrichment_timeout)),
        )
        .await;
        let mut enriched = enriched.into_iter();

        let mut items = Vec::with_capacity(members.len());
        for (idx, url) in members.iter().enumerate() {
            let mut fields = guess_from_url(url, ctx.rules);
            if let Some(lookup_result) = enriched.next() {
                match lookup_result {
                    Ok(real) => fields = fields.superseded_by(real),
                    Err(err) => debug!("Keeping guessed metadata for {}: {}", url, err),
                }
            }
            let fallback = member_fallback_title(idx + 1, &display);
            items.push(ResolvedItem::from_fields(url.as_str(), fields, &fallback));
            if (idx + 1) % 50 == 0 {
                debug!("Prepared {}/{} members of {}", idx + 1, members.len(), link);
            }
        }

        Some(ResolvedCollection::new(
            collection_title,
            collection_uploader,
            items,
        ))
    }
}

/// Synthesizes placeholder entries from the link path alone.
///
/// Requires an `/<owner>/<collection segment>/<title>` shaped link.
pub struct PathDerivedFallback {
    placeholder_count: usize,
}

impl PathDerivedFallback {
    pub fn new(placeholder_count: usize) -> Self {
        Self { placeholder_count }
    }
}

#[async_trait]
impl CollectionStrategy for PathDerivedFallback {
    fn name(&self) -> &'static str {
        "path-derived"
    }

    async fn attempt(&self, link: &str, ctx: &StrategyContext<'_>) -> Option<ResolvedCollection> {
        let segments = ctx.rules.path_segments(link);
        let shaped = segments.len() >= 3 && segments[1] == ctx.rules.collection_segment();
        if !shaped {
            return None;
        }
        let (collection_title, collection_uploader) = collection_names(link, ctx.rules);
        let display = collection_title
            .clone()
            .unwrap_or_else(|| UNKNOWN_COLLECTION_TITLE.to_string());
        warn!(
            "Using {} placeholder entries for {}",
            self.placeholder_count, link
        );

        let mut items: Vec<ResolvedItem> = (1..=self.placeholder_count)
            .map(|n| ResolvedItem {
                url: format!("{}#track-{}", link, n),
                title: Some(member_fallback_title(n, &display)),
                uploader: collection_uploader.clone(),
                duration: None,
                full_title: member_fallback_title(n, &display),
            })
            .collect();
        items.push(ResolvedItem {
            url: link.to_string(),
            title: collection_title.clone(),
            uploader: collection_uploader.clone(),
            duration: None,
            full_title: display.clone(),
        });

        Some(ResolvedCollection::new(
            collection_title,
            collection_uploader,
            items,
        ))
    }
}

/// Default chain: the three enumeration profiles, then the opt-in placeholder.
pub fn default_strategies(settings: &ResolverSettings) -> Vec<Box<dyn CollectionStrategy>> {
    let mut strategies: Vec<Box<dyn CollectionStrategy>> = vec![
        Box::new(FlatEnumeration::new(RequestProfile::Default)),
        Box::new(FlatEnumeration::new(RequestProfile::AlternateUserAgent)),
        Box::new(FlatEnumeration::new(RequestProfile::AlternateAccept)),
    ];
    if settings.placeholder_fallback {
        strategies.push(Box::new(PathDerivedFallback::new(
            settings.placeholder_count,
        )));
    }
    strategies
}
