use std::sync::OnceLock;

use regex::Regex;

/// Permissive link pattern: `http://`/`https://` URLs, `www.` hosts, and bare
/// domains with an optional path. Trailing-character noise is bounded by the
/// whitespace/quote exclusion class; no network validation happens here.
const URL_PATTERN: &str =
    r#"\b(?:https?://|www\.)[^\s<>"']+|(?:[a-zA-Z0-9-]+\.)+[a-zA-Z]{2,}(?:/[^\s<>"']*)?"#;

fn url_regex() -> &'static Regex {
    static URL_REGEX: OnceLock<Regex> = OnceLock::new();
    URL_REGEX.get_or_init(|| Regex::new(URL_PATTERN).expect("url pattern compiles"))
}

/// Extract URL-like substrings from message text, in order of appearance.
/// Duplicates are preserved; an empty or link-free text yields an empty
/// vector and callers skip all further processing.
pub fn extract_urls(text: &str) -> Vec<String> {
    url_regex().find_iter(text).map(|found| found.as_str().to_owned()).collect()
}
