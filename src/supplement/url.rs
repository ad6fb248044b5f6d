use std::sync::LazyLock;

use regex::Regex;

/// `scheme://` followed by anything up to whitespace or a closing paren.
static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s)]+").expect("URL pattern is valid"));

/// First web address embedded in `text`, if any. At most one per passage.
pub fn extract_url(text: &str) -> Option<&str> {
    URL_PATTERN.find(text).map(|m| m.as_str())
}
