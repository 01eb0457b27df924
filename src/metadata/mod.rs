//! Metadata resolution for single items and collections.

mod guess;
mod lookup;
mod models;
mod resolver;
mod strategies;

pub use guess::{guess_from_url, humanize_slug};
pub use lookup::{LookupError, MetadataLookup, RequestProfile, ToolLookup};
pub use models::{
    compose_display_title, normalize_field, ItemFields, ResolvedCollection, ResolvedItem,
    ResolvedMetadata, UNKNOWN_TRACK_TITLE,
};
pub use resolver::{MetadataResolver, ResolverSettings, UpstreamError};
pub use strategies::{
    default_strategies, CollectionStrategy, FlatEnumeration, PathDerivedFallback, StrategyContext,
};
