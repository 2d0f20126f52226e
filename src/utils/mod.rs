//! Utility functions and helpers.

pub mod http;
pub mod log;

use unicode_segmentation::UnicodeSegmentation;
use url::Url;

/// Extract the domain from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
}

/// Collapse every whitespace run to a single space and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cut `s` to at most `max` grapheme clusters. Returns whether it was cut.
pub fn truncate_graphemes(s: &str, max: usize) -> (&str, bool) {
    match s.grapheme_indices(true).nth(max) {
        Some((idx, _)) => (&s[..idx], true),
        None => (s, false),
    }
}

/// Reduce a header value to printable ASCII.
///
/// Non-ASCII characters are dropped and whitespace is collapsed, so the
/// value is always a valid HTTP header.
pub fn ascii_header(s: &str) -> String {
    let ascii: String = s
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| c.is_ascii() && !c.is_ascii_control())
        .collect();
    collapse_whitespace(&ascii)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_domain() {
        assert_eq!(
            get_domain("https://example.com/path"),
            Some("example.com".to_string())
        );
        assert_eq!(
            get_domain("https://sub.example.com:8080/path"),
            Some("sub.example.com".to_string())
        );
        assert_eq!(get_domain("not a url"), None);
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  Unit \t 4B \n $2,100 "), "Unit 4B $2,100");
    }

    #[test]
    fn test_truncate_graphemes() {
        assert_eq!(truncate_graphemes("Unit 4B", 4), ("Unit", true));
        assert_eq!(truncate_graphemes("Unit", 10), ("Unit", false));
        // multi-byte characters are never split
        assert_eq!(truncate_graphemes("café au lait", 4), ("café", true));
    }

    #[test]
    fn test_ascii_header() {
        assert_eq!(ascii_header("🏠 New listings:  afny.org"), "New listings: afny.org");
        assert_eq!(ascii_header("line\nbreak"), "line break");
    }
}
