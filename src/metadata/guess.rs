//! Best-effort names derived from link paths, used when upstream is silent.

use super::models::{normalize_field, ItemFields};
use crate::link::LinkRules;

/// Turns a path slug into words: `-`/`_` become spaces, each word capitalized.
pub fn humanize_slug(slug: &str) -> String {
    let decoded = urlencoding::decode(slug)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| slug.to_string());
    decoded
        .replace(['-', '_'], " ")
        .split(' ')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Guesses uploader and title from an `/<owner>/<slug>` item link.
///
/// Infallible: links that don't have that shape yield empty fields.
pub fn guess_from_url(url: &str, rules: &LinkRules) -> ItemFields {
    let segments = rules.path_segments(url);
    match segments.as_slice() {
        [owner, slug, ..] => ItemFields {
            title: normalize_field(Some(&humanize_slug(slug))),
            uploader: normalize_field(Some(&humanize_slug(owner))),
            duration: None,
        },
        _ => ItemFields::default(),
    }
}

/// Collection title and owner taken from the link path.
///
/// The title is the last path segment with hyphens turned into spaces, the
/// owner is the first segment as-is.
pub fn collection_names(link: &str, rules: &LinkRules) -> (Option<String>, Option<String>) {
    let segments = rules.path_segments(link);
    let owner = segments.first().and_then(|s| normalize_field(Some(s)));
    let title = segments
        .last()
        .filter(|_| segments.len() > 1)
        .and_then(|s| normalize_field(Some(&s.replace('-', " "))));
    (title, owner)
}
