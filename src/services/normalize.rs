// src/services/normalize.rs

//! Content normalizer.
//!
//! Turns stripped page text into a canonical, line-ordered form:
//!
//! 1. trim lines and drop empty ones
//! 2. collapse whitespace runs
//! 3. apply the source's content window, if any
//! 4. keep listing-like lines plus a little trailing context
//!
//! Normalization is idempotent, and the relevance filter never returns an
//! empty signal: if it would discard nearly everything, the unfiltered text
//! is used instead.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{ContentWindow, NormalizeConfig, Source};
use crate::utils::collapse_whitespace;

/// Lines that look like they describe a listing.
static LISTING_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:units?|apts?|apartments?|bedrooms?|bdrms?|br|studios?|rents?|rental|rentals|lease|leasing|lotter(?:y|ies)|applications?|apply|deadline|income|ami|waitlist|building|floor|sq\.?\s?ft)\b|\$\s?\d",
    )
    .expect("listing line pattern")
});

/// Street addresses ("120 Broome Street").
static ADDRESS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b\d+\s+[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\s+(?:Street|St|Avenue|Ave|Place|Pl|Road|Rd|Boulevard|Blvd|Drive|Dr|Lane|Ln)\b",
    )
    .expect("address line pattern")
});

/// Navigation, social and legal lines.
static BOILERPLATE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:home|menu|search|skip to (?:main )?content|about(?: us)?|contact(?: us)?|log ?in|log ?out|sign (?:in|up)|register|privacy(?: policy)?|terms(?: (?:of|&) (?:use|service|conditions))?|accessibility|sitemap|back to top|share|follow us.*|facebook|instagram|twitter|x|linkedin|youtube|tiktok|cookie.*|we use cookies.*|accept(?: all)?|copyright.*|©.*|.*all rights reserved.*)$",
    )
    .expect("boilerplate line pattern")
});

/// Generic rent/apartment/unit vocabulary.
static LISTING_VOCABULARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:rents?|rental|rentals|apartments?|apts?|units?|bedrooms?|studios?|lease)\b",
    )
    .expect("listing vocabulary pattern")
});

/// Whether the page still talks about rentals at all.
pub fn looks_listing_like(text: &str) -> bool {
    LISTING_VOCABULARY.is_match(text)
}

/// Canonicalizes fetched page text.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    config: NormalizeConfig,
}

impl Normalizer {
    pub fn new(config: NormalizeConfig) -> Self {
        Self { config }
    }

    /// Normalize raw (HTML-stripped) text for `source`.
    pub fn normalize(&self, raw: &str, source: &Source) -> String {
        let lines = clean_lines(raw);
        let joined = lines.join("\n");

        let (windowed, anchored) = match &source.window {
            Some(window) => apply_window(&joined, window),
            None => (joined.as_str(), false),
        };
        let lines = clean_lines(windowed);

        if !self.config.relevance_filter {
            return lines.join("\n");
        }
        self.filter_relevant(lines, anchored).join("\n")
    }

    /// Keep listing-like lines with trailing context.
    ///
    /// `keep_first` pins the first line, which carries the window start
    /// marker, so a second pass finds the same window.
    fn filter_relevant(&self, lines: Vec<String>, keep_first: bool) -> Vec<String> {
        let total_chars: usize = lines.iter().map(|l| l.len()).sum();
        if total_chars == 0 {
            return lines;
        }

        let mut kept: Vec<&String> = Vec::new();
        let mut context_left = 0usize;

        for (i, line) in lines.iter().enumerate() {
            if i == 0 && keep_first {
                kept.push(line);
                continue;
            }
            if BOILERPLATE_LINE.is_match(line) {
                context_left = context_left.saturating_sub(1);
                continue;
            }
            if LISTING_LINE.is_match(line) || ADDRESS_LINE.is_match(line) {
                kept.push(line);
                context_left = self.config.context_lines;
            } else if context_left > 0 {
                kept.push(line);
                context_left -= 1;
            }
        }

        let kept_chars: usize = kept.iter().map(|l| l.len()).sum();
        let ratio = kept_chars as f64 / total_chars as f64;
        if kept.is_empty() || ratio < self.config.min_retained_ratio {
            log::debug!(
                "Relevance filter kept {:.1}% of text; using unfiltered text",
                ratio * 100.0
            );
            return lines;
        }

        kept.into_iter().cloned().collect()
    }
}

/// Trim and collapse every line, dropping empty ones.
fn clean_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Cut `text` to the configured window. Returns the slice and whether a
/// start marker anchored it.
fn apply_window<'a>(text: &'a str, window: &ContentWindow) -> (&'a str, bool) {
    let marker = |m: &Option<String>| {
        m.as_deref()
            .map(collapse_whitespace)
            .filter(|m| !m.is_empty())
    };

    let mut slice = text;
    let mut anchored = false;

    if let Some(start) = marker(&window.start) {
        if let Some(idx) = slice.find(&start) {
            slice = &slice[idx..];
            anchored = true;
        }
    }
    // A match at offset 0 would empty the window; the next one is the cut.
    if let Some(end) = marker(&window.end) {
        if let Some((idx, _)) = slice.match_indices(end.as_str()).find(|(i, _)| *i > 0) {
            slice = &slice[..idx];
        }
    }

    if slice.trim().is_empty() {
        log::debug!("Content window left no text; ignoring window");
        return (text, false);
    }
    (slice, anchored)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "
        Home
        Menu
        Available   Re-Rentals

        120 Broome Street Unit 4B
           Monthly rent: $2,104
        Income: $70,000 - $90,000
        Posted January 2026
        Some unrelated paragraph about the organization.
        Another unrelated paragraph.
        Yet another unrelated paragraph.
        Follow us
        Facebook
        © 2026 Housing Partners. All rights reserved.
    ";

    fn normalizer() -> Normalizer {
        Normalizer::new(NormalizeConfig::default())
    }

    fn source() -> Source {
        Source::new("https://example.com/rentals")
    }

    #[test]
    fn test_trims_and_collapses_lines() {
        let n = Normalizer::new(NormalizeConfig {
            relevance_filter: false,
            ..NormalizeConfig::default()
        });
        let out = n.normalize("  a   b  \n\n\t c\u{a0}d \n", &source());
        assert_eq!(out, "a b\nc d");
    }

    #[test]
    fn test_relevance_filter_keeps_listing_lines_in_order() {
        let out = normalizer().normalize(PAGE, &source());
        let lines: Vec<&str> = out.lines().collect();

        assert!(lines.contains(&"Available Re-Rentals"));
        assert!(lines.contains(&"120 Broome Street Unit 4B"));
        assert!(lines.contains(&"Monthly rent: $2,104"));
        assert!(!lines.contains(&"Home"));
        assert!(!lines.contains(&"Facebook"));
        assert!(!out.contains("All rights reserved"));
        assert!(!out.contains("Yet another unrelated"));

        let unit = lines.iter().position(|l| l.contains("Unit 4B")).unwrap();
        let rent = lines.iter().position(|l| l.contains("Monthly rent")).unwrap();
        assert!(unit < rent);
    }

    #[test]
    fn test_context_lines_after_match() {
        let out = normalizer().normalize(PAGE, &source());
        // two context lines follow the last listing-like line
        assert!(out.contains("Posted January 2026"));
        assert!(out.contains("Some unrelated paragraph about the organization."));
        assert!(!out.contains("Another unrelated paragraph."));
    }

    #[test]
    fn test_filter_falls_back_when_nothing_matches() {
        let text = "Welcome to our site\nWe are a community organization\nNews and events";
        let out = normalizer().normalize(text, &source());
        assert_eq!(out, text);
    }

    #[test]
    fn test_content_window() {
        let text = "Nav stuff\nOther Programs\nAffordable Housing\nUnit 3 rent $1,500\nContact Us\nUnit 9 footer";
        let src = source().with_window(Some("Affordable Housing"), Some("Contact Us"));
        let out = normalizer().normalize(text, &src);
        assert_eq!(out, "Affordable Housing\nUnit 3 rent $1,500");
    }

    #[test]
    fn test_missing_window_markers_leave_text() {
        let text = "Unit 3 rent $1,500";
        let src = source().with_window(Some("Not There"), Some("Also Missing"));
        assert_eq!(normalizer().normalize(text, &src), text);
    }

    #[test]
    fn test_window_that_empties_text_is_ignored() {
        let text = "Contact Us\nUnit 3 rent $1,500";
        let src = source().with_window(None, Some("Contact Us"));
        // "Contact Us" itself is then dropped as navigation
        assert_eq!(normalizer().normalize(text, &src), "Unit 3 rent $1,500");
    }

    #[test]
    fn test_idempotent() {
        let n = normalizer();
        let inputs = [
            PAGE,
            "",
            "   \n\n  ",
            "Welcome\nNothing to see",
            "Home\nUnit 1 $900\nHome\nabout\nx\ny\nz\nUnit 2 $950",
        ];
        for input in inputs {
            let once = n.normalize(input, &source());
            let twice = n.normalize(&once, &source());
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn test_idempotent_with_window() {
        let n = normalizer();
        let src = source().with_window(Some("Affordable Housing"), Some("Contact"));
        let text = "Affordable Housing intro\nUnrelated\nAffordable Housing Unit 7 rent $1,100\nmore\nContact";
        let once = n.normalize(text, &src);
        let twice = n.normalize(&once, &src);
        assert_eq!(once, twice);
        assert!(once.starts_with("Affordable Housing intro"));
    }

    #[test]
    fn test_idempotent_with_leading_end_marker() {
        let n = normalizer();
        let src = source().with_window(Some("Affordable"), Some("Footer"));
        let text = "Footer\ncafé – Apt 3\nFooter\nFooter\nApply now\nUnit 4B rent $1,500";
        let once = n.normalize(text, &src);
        let twice = n.normalize(&once, &src);
        assert_eq!(once, twice);
        assert!(once.contains("Apt 3"));
        assert!(!once.contains("Unit 4B"));
    }

    #[test]
    fn test_looks_listing_like() {
        assert!(looks_listing_like("Apartment rentals coming soon"));
        assert!(looks_listing_like("2 bedroom unit"));
        assert!(!looks_listing_like("Community news and events"));
    }
}
