//! Turns marked-up entry text into a filesystem-safe name component

use regex::Regex;
use std::sync::OnceLock;

/// Keeps names under the 255-character NTFS component limit with room for an extension
pub const MAX_NAME_CHARS: usize = 240;

fn markup_tag() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<.*?>").expect("static pattern is valid"))
}

/// Strip markup and unsafe characters from `raw`.
///
/// Tags are removed, whitespace runs become a single `_`, and anything other
/// than letters, digits, `-` and `_` is dropped (dots included). The result is
/// truncated to [`MAX_NAME_CHARS`] characters and may be empty.
pub fn sanitize(raw: &str) -> String {
    let without_tags = markup_tag().replace_all(raw, "");

    without_tags
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(MAX_NAME_CHARS)
        .collect()
}

/// Make an identifier safe to embed in a single path component.
///
/// Separators, NUL and control characters are dropped. A value made only of
/// dots collapses to empty so `.` and `..` never reach the filesystem. Other
/// characters, dots included, are kept so identifiers like `12.1` survive.
pub fn path_component(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| !matches!(c, '/' | '\\') && !c.is_control())
        .take(MAX_NAME_CHARS)
        .collect();

    if kept.chars().all(|c| c == '.') {
        String::new()
    } else {
        kept
    }
}
