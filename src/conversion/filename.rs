//! File name sanitization for converted artifacts.

use lazy_static::lazy_static;
use regex::Regex;

pub const MAX_FILENAME_CHARS: usize = 100;

/// Used when sanitization leaves nothing behind.
pub const FALLBACK_STEM: &str = "track";

lazy_static! {
    static ref DISALLOWED: Regex = Regex::new(r"[^\w\s\-.]").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Maps arbitrary text to a file name token made of word characters,
/// hyphens, underscores and dots, with whitespace runs turned into a single
/// underscore and the result truncated to [`MAX_FILENAME_CHARS`] characters.
///
/// Never fails; fully invalid input yields an empty string.
pub fn sanitize_filename(input: &str) -> String {
    let kept = DISALLOWED.replace_all(input, "");
    let joined = WHITESPACE.replace_all(&kept, "_");
    joined.chars().take(MAX_FILENAME_CHARS).collect()
}

/// Sanitized stem, or [`FALLBACK_STEM`] when nothing usable remains.
pub fn artifact_stem(display_title: &str) -> String {
    let stem = sanitize_filename(display_title);
    if stem.trim_matches(['_', '.']).is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        stem
    }
}
