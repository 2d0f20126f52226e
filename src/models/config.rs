//! Application configuration structures.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::TimeDelta;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{DiffMode, FetchStrategy, Source};
use crate::error::{AppError, Result};

/// Name of the built-in fallback extraction strategy.
pub const GENERIC_STRATEGY: &str = "generic";

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP fetching behavior
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Text normalization settings
    #[serde(default)]
    pub normalize: NormalizeConfig,

    /// Text-diff mode thresholds
    #[serde(default)]
    pub diff: DiffConfig,

    /// Extraction sanity limits
    #[serde(default)]
    pub sanity: SanityConfig,

    /// Alert policy settings
    #[serde(default)]
    pub alerts: AlertConfig,

    /// Push notification endpoint
    #[serde(default)]
    pub notify: NotifyConfig,

    /// State directory
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Config-defined extraction strategies
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,

    /// Monitored pages
    #[serde(default = "defaults::default_sources")]
    pub sources: Vec<Source>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Look up a configured source by URL.
    pub fn source(&self, url: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.url == url)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetch.user_agent is empty"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(AppError::validation("fetch.timeout_secs must be > 0"));
        }
        if self.alerts.failure_threshold == 0 {
            return Err(AppError::validation("alerts.failure_threshold must be >= 1"));
        }
        if !(0.0..=1.0).contains(&self.normalize.min_retained_ratio) {
            return Err(AppError::validation(
                "normalize.min_retained_ratio must be within 0.0..=1.0",
            ));
        }
        if self.sanity.max_identifiers == 0 {
            return Err(AppError::validation("sanity.max_identifiers must be > 0"));
        }
        if let Some(endpoint) = &self.notify.endpoint {
            validate_http_url(endpoint, "notify.endpoint")?;
        }
        if let Some(endpoint) = &self.fetch.render_endpoint {
            validate_http_url(endpoint, "fetch.render_endpoint")?;
        }
        if self.sources.is_empty() {
            return Err(AppError::validation("No sources defined"));
        }

        let mut strategy_names: HashSet<&str> = HashSet::new();
        strategy_names.insert(GENERIC_STRATEGY);
        for strategy in &self.strategies {
            if !strategy_names.insert(strategy.name.as_str()) {
                return Err(AppError::validation(format!(
                    "Duplicate strategy name '{}'",
                    strategy.name
                )));
            }
            strategy.validate()?;
        }

        let mut urls: HashSet<&str> = HashSet::new();
        for source in &self.sources {
            validate_http_url(&source.url, "source url")?;
            if !urls.insert(source.url.as_str()) {
                return Err(AppError::validation(format!(
                    "Duplicate source {}",
                    source.url
                )));
            }
            if let Some(name) = &source.strategy {
                if !strategy_names.contains(name.as_str()) {
                    return Err(AppError::validation(format!(
                        "Source {} is bound to unknown strategy '{}'",
                        source.url, name
                    )));
                }
            }
            if source.max_identifiers == Some(0) {
                return Err(AppError::validation(format!(
                    "Source {} has max_identifiers = 0",
                    source.url
                )));
            }
        }
        Ok(())
    }
}

fn validate_http_url(value: &str, field: &str) -> Result<()> {
    let url = Url::parse(value)
        .map_err(|e| AppError::validation(format!("{field} '{value}' is not a URL: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(AppError::validation(format!(
            "{field} '{value}' has unsupported scheme '{other}'"
        ))),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            normalize: NormalizeConfig::default(),
            diff: DiffConfig::default(),
            sanity: SanityConfig::default(),
            alerts: AlertConfig::default(),
            notify: NotifyConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
            strategies: Vec::new(),
            sources: defaults::default_sources(),
        }
    }
}

/// HTTP client and fetching behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Retries after the first failed attempt
    #[serde(default = "defaults::fetch_retries")]
    pub max_retries: u32,

    /// Base backoff between retries, doubled per attempt
    #[serde(default = "defaults::retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Delay between sources in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Pages shorter than this are treated as failed fetches
    #[serde(default = "defaults::min_content_chars")]
    pub min_content_chars: usize,

    /// Case-insensitive markers of block/error pages
    #[serde(default = "defaults::blocked_markers")]
    pub blocked_markers: Vec<String>,

    /// Render service for `fetch = "rendered"` sources
    #[serde(default)]
    pub render_endpoint: Option<String>,

    /// Settle delay the render service waits after the page is idle
    #[serde(default = "defaults::render_settle")]
    pub render_settle_ms: u64,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Backoff before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_retries: defaults::fetch_retries(),
            retry_backoff_ms: defaults::retry_backoff(),
            request_delay_ms: defaults::request_delay(),
            min_content_chars: defaults::min_content_chars(),
            blocked_markers: defaults::blocked_markers(),
            render_endpoint: None,
            render_settle_ms: defaults::render_settle(),
        }
    }
}

/// Normalization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Keep only listing-like lines plus trailing context
    #[serde(default = "defaults::enabled")]
    pub relevance_filter: bool,

    /// Non-matching lines kept after each listing-like line
    #[serde(default = "defaults::context_lines")]
    pub context_lines: usize,

    /// Fall back to unfiltered text below this retained fraction (by chars)
    #[serde(default = "defaults::min_retained_ratio")]
    pub min_retained_ratio: f64,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            relevance_filter: defaults::enabled(),
            context_lines: defaults::context_lines(),
            min_retained_ratio: defaults::min_retained_ratio(),
        }
    }
}

/// Text-diff thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Changed regions shorter than this (trimmed) are ignored
    #[serde(default = "defaults::min_segment_chars")]
    pub min_segment_chars: usize,

    /// Characters of context around an addition
    #[serde(default = "defaults::context_chars")]
    pub context_chars: usize,

    #[serde(default = "defaults::max_snippets")]
    pub max_snippets: usize,

    #[serde(default = "defaults::max_summary_chars")]
    pub max_summary_chars: usize,

    /// Removal snippets are cut to this length
    #[serde(default = "defaults::max_removal_chars")]
    pub max_removal_chars: usize,

    /// Aggregate changed characters below which the diff is ignored
    #[serde(default = "defaults::min_changed_chars")]
    pub min_changed_chars: usize,

    /// Give up aligning after this many milliseconds
    #[serde(default = "defaults::diff_timeout")]
    pub timeout_ms: u64,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            min_segment_chars: defaults::min_segment_chars(),
            context_chars: defaults::context_chars(),
            max_snippets: defaults::max_snippets(),
            max_summary_chars: defaults::max_summary_chars(),
            max_removal_chars: defaults::max_removal_chars(),
            min_changed_chars: defaults::min_changed_chars(),
            timeout_ms: defaults::diff_timeout(),
        }
    }
}

/// Limits on identifier sets before they are trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanityConfig {
    /// Absolute ceiling on identifiers per source
    #[serde(default = "defaults::max_identifiers")]
    pub max_identifiers: usize,

    /// Maximum growth over the baseline size in one run
    #[serde(default = "defaults::max_growth")]
    pub max_growth: usize,

    /// Growth check is skipped below this baseline size
    #[serde(default = "defaults::min_baseline")]
    pub min_baseline: usize,
}

impl Default for SanityConfig {
    fn default() -> Self {
        Self {
            max_identifiers: defaults::max_identifiers(),
            max_growth: defaults::max_growth(),
            min_baseline: defaults::min_baseline(),
        }
    }
}

/// Alert policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Minimum seconds between content-change alerts per source
    #[serde(default = "defaults::content_cooldown")]
    pub content_cooldown_secs: u64,

    /// Minimum seconds between outage alerts per source
    #[serde(default = "defaults::outage_cooldown")]
    pub outage_cooldown_secs: u64,

    /// Consecutive failures before an outage alert
    #[serde(default = "defaults::failure_threshold")]
    pub failure_threshold: u32,

    /// Removal-only changes smaller than this stay silent
    #[serde(default = "defaults::min_removed")]
    pub min_removed: usize,

    /// Added identifiers listed in a message
    #[serde(default = "defaults::max_listed_added")]
    pub max_listed_added: usize,

    /// Removed identifiers listed in a message
    #[serde(default = "defaults::max_listed_removed")]
    pub max_listed_removed: usize,
}

impl AlertConfig {
    pub fn content_cooldown(&self) -> TimeDelta {
        seconds(self.content_cooldown_secs)
    }

    pub fn outage_cooldown(&self) -> TimeDelta {
        seconds(self.outage_cooldown_secs)
    }
}

fn seconds(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            content_cooldown_secs: defaults::content_cooldown(),
            outage_cooldown_secs: defaults::outage_cooldown(),
            failure_threshold: defaults::failure_threshold(),
            min_removed: defaults::min_removed(),
            max_listed_added: defaults::max_listed_added(),
            max_listed_removed: defaults::max_listed_removed(),
        }
    }
}

/// Push notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// ntfy topic URL; alerts are only logged when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default = "defaults::notify_timeout")]
    pub timeout_secs: u64,

    /// Retries after the first failed delivery
    #[serde(default = "defaults::notify_retries")]
    pub max_retries: u32,

    #[serde(default = "defaults::listing_tags")]
    pub listing_tags: Vec<String>,

    #[serde(default = "defaults::removal_tags")]
    pub removal_tags: Vec<String>,

    #[serde(default = "defaults::change_tags")]
    pub change_tags: Vec<String>,

    #[serde(default = "defaults::outage_tags")]
    pub outage_tags: Vec<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: defaults::notify_timeout(),
            max_retries: defaults::notify_retries(),
            listing_tags: defaults::listing_tags(),
            removal_tags: defaults::removal_tags(),
            change_tags: defaults::change_tags(),
            outage_tags: defaults::outage_tags(),
        }
    }
}

/// State directory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "defaults::state_dir")]
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: defaults::state_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

/// A named, regex-driven extraction strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,

    pub patterns: Vec<PatternConfig>,

    /// Overrides the default identifier validity rules
    #[serde(default)]
    pub validity: Option<ValidityConfig>,
}

impl StrategyConfig {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("Strategy with empty name"));
        }
        if self.patterns.is_empty() {
            return Err(AppError::validation(format!(
                "Strategy '{}' has no patterns",
                self.name
            )));
        }
        for pattern in &self.patterns {
            Regex::new(&pattern.regex)?;
        }
        if let Some(validity) = &self.validity {
            validity.validate(&self.name)?;
        }
        Ok(())
    }
}

/// One regex with a `$n` / `${name}` output template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    pub regex: String,

    #[serde(default = "defaults::whole_match")]
    pub template: String,
}

/// Acceptance rules for candidate identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityConfig {
    #[serde(default = "defaults::min_id_len")]
    pub min_len: usize,

    #[serde(default = "defaults::max_id_len")]
    pub max_len: usize,

    /// Require a digit or one of `keywords`
    #[serde(default = "defaults::enabled")]
    pub require_digit_or_keyword: bool,

    /// Address/unit/building words (case-insensitive, whole word)
    #[serde(default = "defaults::id_keywords")]
    pub keywords: Vec<String>,

    /// Navigation/UI phrases that disqualify a candidate (case-insensitive)
    #[serde(default = "defaults::noise_phrases")]
    pub noise: Vec<String>,
}

impl ValidityConfig {
    fn validate(&self, strategy: &str) -> Result<()> {
        if self.min_len == 0 || self.min_len > self.max_len {
            return Err(AppError::validation(format!(
                "Strategy '{strategy}' has inconsistent identifier length bounds {}..{}",
                self.min_len, self.max_len
            )));
        }
        Ok(())
    }
}

impl Default for ValidityConfig {
    fn default() -> Self {
        Self {
            min_len: defaults::min_id_len(),
            max_len: defaults::max_id_len(),
            require_digit_or_keyword: defaults::enabled(),
            keywords: defaults::id_keywords(),
            noise: defaults::noise_phrases(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    use super::{DiffMode, FetchStrategy, Source};

    pub fn enabled() -> bool {
        true
    }

    // Fetch defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/120.0.0.0 Safari/537.36"
            .into()
    }
    pub fn timeout() -> u64 {
        45
    }
    pub fn fetch_retries() -> u32 {
        2
    }
    pub fn retry_backoff() -> u64 {
        2_000
    }
    pub fn request_delay() -> u64 {
        1_000
    }
    pub fn min_content_chars() -> usize {
        50
    }
    pub fn blocked_markers() -> Vec<String> {
        vec![
            "access denied".into(),
            "403 forbidden".into(),
            "attention required! | cloudflare".into(),
            "verify you are human".into(),
        ]
    }
    pub fn render_settle() -> u64 {
        5_000
    }

    // Normalize defaults
    pub fn context_lines() -> usize {
        2
    }
    pub fn min_retained_ratio() -> f64 {
        0.05
    }

    // Diff defaults
    pub fn min_segment_chars() -> usize {
        10
    }
    pub fn context_chars() -> usize {
        120
    }
    pub fn max_snippets() -> usize {
        5
    }
    pub fn max_summary_chars() -> usize {
        1_500
    }
    pub fn max_removal_chars() -> usize {
        160
    }
    pub fn min_changed_chars() -> usize {
        20
    }
    pub fn diff_timeout() -> u64 {
        2_000
    }

    // Sanity defaults
    pub fn max_identifiers() -> usize {
        150
    }
    pub fn max_growth() -> usize {
        40
    }
    pub fn min_baseline() -> usize {
        5
    }

    // Alert defaults
    pub fn content_cooldown() -> u64 {
        3 * 60 * 60
    }
    pub fn outage_cooldown() -> u64 {
        24 * 60 * 60
    }
    pub fn failure_threshold() -> u32 {
        3
    }
    pub fn min_removed() -> usize {
        3
    }
    pub fn max_listed_added() -> usize {
        10
    }
    pub fn max_listed_removed() -> usize {
        5
    }

    // Notify defaults
    pub fn notify_timeout() -> u64 {
        20
    }
    pub fn notify_retries() -> u32 {
        2
    }
    pub fn listing_tags() -> Vec<String> {
        vec!["house".into(), "tada".into()]
    }
    pub fn removal_tags() -> Vec<String> {
        vec!["house".into(), "wastebasket".into()]
    }
    pub fn change_tags() -> Vec<String> {
        vec!["static".into(), "monitor".into()]
    }
    pub fn outage_tags() -> Vec<String> {
        vec!["warning".into(), "monitor".into()]
    }

    pub fn state_dir() -> PathBuf {
        PathBuf::from("state")
    }
    pub fn log_level() -> String {
        "info".into()
    }

    // Strategy defaults
    pub fn whole_match() -> String {
        "$0".into()
    }
    pub fn min_id_len() -> usize {
        4
    }
    pub fn max_id_len() -> usize {
        120
    }
    pub fn id_keywords() -> Vec<String> {
        [
            "unit", "apt", "apartment", "apartments", "building", "bldg", "floor", "street",
            "st", "avenue", "ave", "road", "rd", "place", "pl", "boulevard", "blvd", "studio",
            "bedroom", "br",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
    pub fn noise_phrases() -> Vec<String> {
        [
            "cookie", "log in", "login", "sign in", "sign up", "subscribe", "newsletter",
            "facebook", "instagram", "twitter", "linkedin", "youtube", "click here",
            "privacy", "terms of", "all rights reserved", "results", "household", "person",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    // Source defaults
    pub fn default_sources() -> Vec<Source> {
        let rendered = [
            "https://iaffordny.com/re-rentals",
            "https://afny.org/re-rentals",
            "https://mgnyconsulting.com/listings/",
            "https://city5.nyc/",
            "https://ibis.powerappsportals.com/",
            "https://east-village-homes-owner-llc.rentcafewebsite.com/",
        ];
        let static_pages = [
            "https://www.spjny.com/affordable-rentals",
            "https://www.thebridgeny.org/news-and-media",
            "https://www.taxaceny.com/projects-8",
        ];

        let mut sources: Vec<Source> = rendered
            .iter()
            .map(|url| Source::new(*url).with_fetch(FetchStrategy::Rendered))
            .collect();
        sources.extend(
            static_pages
                .iter()
                .map(|url| Source::new(*url).with_mode(DiffMode::Text)),
        );
        sources.push(
            Source::new("https://sites.google.com/affordablelivingnyc.com/hpd/home")
                .with_mode(DiffMode::Text)
                .with_window(Some("Affordable Housing"), None),
        );
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.fetch.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_failure_threshold() {
        let mut config = Config::default();
        config.alerts.failure_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_strategy_binding() {
        let mut config = Config::default();
        config.sources = vec![Source::new("https://example.com/").with_strategy("missing")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_generic_binding() {
        let mut config = Config::default();
        config.sources = vec![Source::new("https://example.com/").with_strategy("generic")];
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_sources() {
        let mut config = Config::default();
        config.sources = vec![
            Source::new("https://example.com/"),
            Source::new("https://example.com/"),
        ];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_regex() {
        let mut config = Config::default();
        config.strategies = vec![StrategyConfig {
            name: "broken".into(),
            patterns: vec![PatternConfig {
                regex: "Unit (".into(),
                template: "$0".into(),
            }],
            validity: None,
        }];
        assert!(matches!(config.validate(), Err(AppError::Regex(_))));
    }

    #[test]
    fn validate_rejects_non_http_source() {
        let mut config = Config::default();
        config.sources = vec![Source::new("ftp://example.com/listings")];
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config = Config::from_toml(
            r#"
            [alerts]
            failure_threshold = 5

            [[sources]]
            url = "https://example.com/rentals"
            "#,
        )
        .unwrap();
        assert_eq!(config.alerts.failure_threshold, 5);
        assert_eq!(config.alerts.content_cooldown_secs, 3 * 60 * 60);
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.fetch.timeout_secs, 45);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn example_config_is_valid() {
        let config = Config::from_toml(include_str!("../../config/monitor.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert!(!config.strategies.is_empty());
    }

    #[test]
    fn backoff_doubles() {
        let fetch = FetchConfig {
            retry_backoff_ms: 100,
            ..FetchConfig::default()
        };
        assert_eq!(fetch.backoff(1), Duration::from_millis(100));
        assert_eq!(fetch.backoff(2), Duration::from_millis(200));
        assert_eq!(fetch.backoff(3), Duration::from_millis(400));
    }

    #[test]
    fn cooldown_conversion_saturates() {
        let alerts = AlertConfig {
            content_cooldown_secs: u64::MAX,
            ..AlertConfig::default()
        };
        assert_eq!(alerts.content_cooldown(), TimeDelta::MAX);
        assert_eq!(AlertConfig::default().outage_cooldown(), TimeDelta::hours(24));
    }
}
