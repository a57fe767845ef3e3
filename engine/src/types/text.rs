//! String finishing steps: plain-text stripping, separator joins and length limits.

use once_cell::sync::Lazy;
use regex::Regex;

static LINE_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*br\s*/?\s*>").expect("line break pattern"));

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern"));

/// Strip HTML markup, turning `<br>` variants into newlines.
pub fn to_plain_text(input: &str) -> String {
    let text = LINE_BREAK.replace_all(input, "\n");
    TAG.replace_all(&text, "").into_owned()
}

/// Join non-empty parts with `separator`.
pub fn join_non_empty<I>(parts: I, separator: &str) -> String
where
    I: IntoIterator<Item = String>,
{
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Truncate to `max` characters; `0` means unlimited.
pub fn truncate_chars(input: String, max: usize) -> String {
    if max == 0 || input.chars().count() <= max {
        return input;
    }
    input.chars().take(max).collect()
}
