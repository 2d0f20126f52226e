//! Monitored source definition.

use serde::{Deserialize, Serialize};

/// How the raw page text is obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    /// Single GET request
    #[default]
    Plain,
    /// Headless-browser render through the configured render endpoint
    Rendered,
}

/// How successive snapshots of a source are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffMode {
    /// Compare extracted listing identifier sets
    #[default]
    Identifiers,
    /// Compare normalized page text
    Text,
}

/// Optional boilerplate trim applied during normalization.
///
/// Text before the first `start` marker and from the first `end` marker
/// onwards is dropped. Missing markers leave the text untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentWindow {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

/// A monitored page. The URL is its identity and its state-store key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Page URL
    pub url: String,

    /// Fetch transport hint
    #[serde(default)]
    pub fetch: FetchStrategy,

    /// Name of the bound extraction strategy (registry fallback when unset)
    #[serde(default)]
    pub strategy: Option<String>,

    /// Comparison mode
    #[serde(default)]
    pub mode: DiffMode,

    /// Content window markers
    #[serde(default)]
    pub window: Option<ContentWindow>,

    /// Per-source identifier ceiling, overrides `[sanity].max_identifiers`
    #[serde(default)]
    pub max_identifiers: Option<usize>,
}

impl Source {
    /// Create a plain-fetch, identifier-mode source.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            fetch: FetchStrategy::Plain,
            strategy: None,
            mode: DiffMode::Identifiers,
            window: None,
            max_identifiers: None,
        }
    }

    pub fn with_strategy(mut self, name: impl Into<String>) -> Self {
        self.strategy = Some(name.into());
        self
    }

    pub fn with_mode(mut self, mode: DiffMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_fetch(mut self, fetch: FetchStrategy) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn with_window(mut self, start: Option<&str>, end: Option<&str>) -> Self {
        self.window = Some(ContentWindow {
            start: start.map(str::to_string),
            end: end.map(str::to_string),
        });
        self
    }

    /// Host part of the URL, used in notification titles.
    pub fn host(&self) -> String {
        crate::utils::get_domain(&self.url).unwrap_or_else(|| self.url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_defaults_from_toml() {
        let source: Source = toml::from_str(r#"url = "https://afny.org/re-rentals""#).unwrap();
        assert_eq!(source.fetch, FetchStrategy::Plain);
        assert_eq!(source.mode, DiffMode::Identifiers);
        assert!(source.strategy.is_none());
        assert!(source.window.is_none());
    }

    #[test]
    fn test_source_full_toml() {
        let source: Source = toml::from_str(
            r#"
            url = "https://city5.nyc/"
            fetch = "rendered"
            strategy = "city5"
            mode = "text"
            max_identifiers = 40
            window = { start = "Available Units", end = "Contact Us" }
            "#,
        )
        .unwrap();
        assert_eq!(source.fetch, FetchStrategy::Rendered);
        assert_eq!(source.mode, DiffMode::Text);
        assert_eq!(source.strategy.as_deref(), Some("city5"));
        assert_eq!(source.max_identifiers, Some(40));
        let window = source.window.unwrap();
        assert_eq!(window.start.as_deref(), Some("Available Units"));
        assert_eq!(window.end.as_deref(), Some("Contact Us"));
    }

    #[test]
    fn test_host() {
        let source = Source::new("https://www.spjny.com/affordable-rentals");
        assert_eq!(source.host(), "www.spjny.com");
    }
}
