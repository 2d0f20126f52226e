//! Identifier extraction.
//!
//! Strategies turn normalized page text into a set of stable listing
//! identifiers. The [`ExtractorRegistry`] maps sources to strategies and
//! falls back to the [`GenericStrategy`] when a bound strategy comes back
//! empty on a page that still reads like a listings page.

mod generic;
mod pattern;
mod validity;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

pub use generic::GenericStrategy;
pub use pattern::PatternStrategy;
pub use validity::ValidityRules;

use crate::error::{AppError, Result};
use crate::models::{Config, GENERIC_STRATEGY, Source};
use crate::services::normalize::looks_listing_like;

/// A way of finding listing identifiers in normalized text.
pub trait ExtractionStrategy: Send + Sync {
    /// Registry name.
    fn name(&self) -> &str;

    /// Raw candidates, before validation.
    fn candidates(&self, text: &str) -> Vec<String>;

    /// Acceptance rules for this strategy's candidates.
    fn validity(&self) -> &ValidityRules;

    /// Validated identifier set. Identical text always yields an identical set.
    fn extract(&self, text: &str) -> BTreeSet<String> {
        self.candidates(text)
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| self.validity().accepts(c))
            .collect()
    }
}

/// Identifiers found for one source, with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub identifiers: BTreeSet<String>,
    /// Strategy that produced `identifiers`
    pub strategy: String,
    /// Whether the generic fallback replaced the bound strategy
    pub used_fallback: bool,
}

/// Strategy registry keyed by name, with per-source bindings.
pub struct ExtractorRegistry {
    strategies: HashMap<String, Arc<dyn ExtractionStrategy>>,
    bindings: HashMap<String, String>,
    fallback: Arc<dyn ExtractionStrategy>,
}

impl ExtractorRegistry {
    /// Registry containing only the generic strategy.
    pub fn new() -> Self {
        let fallback: Arc<dyn ExtractionStrategy> = Arc::new(GenericStrategy::new());
        let mut strategies = HashMap::new();
        strategies.insert(GENERIC_STRATEGY.to_string(), Arc::clone(&fallback));
        Self {
            strategies,
            bindings: HashMap::new(),
            fallback,
        }
    }

    /// Build the registry from configured strategies and source bindings.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut registry = Self::new();
        for strategy in &config.strategies {
            registry.register(Arc::new(PatternStrategy::from_config(strategy)?));
        }
        for source in &config.sources {
            if let Some(name) = &source.strategy {
                registry.bind(&source.url, name)?;
            }
        }
        Ok(registry)
    }

    /// Add or replace a strategy under its own name.
    pub fn register(&mut self, strategy: Arc<dyn ExtractionStrategy>) {
        self.strategies.insert(strategy.name().to_string(), strategy);
    }

    /// Bind a source URL to a registered strategy.
    pub fn bind(&mut self, url: &str, name: &str) -> Result<()> {
        if !self.strategies.contains_key(name) {
            return Err(AppError::config(format!(
                "Unknown extraction strategy '{name}' for {url}"
            )));
        }
        self.bindings.insert(url.to_string(), name.to_string());
        Ok(())
    }

    /// Strategy bound to `url`, if any.
    pub fn strategy_for(&self, url: &str) -> Option<&Arc<dyn ExtractionStrategy>> {
        self.bindings
            .get(url)
            .and_then(|name| self.strategies.get(name))
    }

    /// Extract identifiers for `source` from normalized text.
    pub fn extract(&self, text: &str, source: &Source) -> Extraction {
        let Some(strategy) = self.strategy_for(&source.url) else {
            return Extraction {
                identifiers: self.fallback.extract(text),
                strategy: self.fallback.name().to_string(),
                used_fallback: false,
            };
        };

        let identifiers = strategy.extract(text);
        let is_fallback = Arc::ptr_eq(strategy, &self.fallback);
        if identifiers.is_empty() && !is_fallback && looks_listing_like(text) {
            log::warn!(
                "Strategy '{}' found nothing on {}; trying generic fallback",
                strategy.name(),
                source.url
            );
            return Extraction {
                identifiers: self.fallback.extract(text),
                strategy: self.fallback.name().to_string(),
                used_fallback: true,
            };
        }

        Extraction {
            identifiers,
            strategy: strategy.name().to_string(),
            used_fallback: false,
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PatternConfig, StrategyConfig};

    /// Strategy that never finds anything.
    struct Blind;

    impl ExtractionStrategy for Blind {
        fn name(&self) -> &str {
            "blind"
        }
        fn candidates(&self, _text: &str) -> Vec<String> {
            Vec::new()
        }
        fn validity(&self) -> &ValidityRules {
            static RULES: std::sync::LazyLock<ValidityRules> =
                std::sync::LazyLock::new(ValidityRules::default);
            &RULES
        }
    }

    fn source() -> Source {
        Source::new("https://example.com/rentals")
    }

    #[test]
    fn test_unbound_source_uses_generic() {
        let registry = ExtractorRegistry::new();
        let result = registry.extract("Unit 12 rent $1,000", &source());
        assert_eq!(result.strategy, "generic");
        assert!(!result.used_fallback);
        assert!(result.identifiers.contains("Unit 12"));
    }

    #[test]
    fn test_empty_strategy_on_listing_text_falls_back() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Arc::new(Blind));
        registry.bind(&source().url, "blind").unwrap();

        let result = registry.extract("Apartment Unit 7 rent $1,200", &source());
        assert!(result.used_fallback);
        assert_eq!(result.strategy, "generic");
        assert!(result.identifiers.contains("Unit 7"));
    }

    #[test]
    fn test_empty_strategy_on_unrelated_text_stays_empty() {
        let mut registry = ExtractorRegistry::new();
        registry.register(Arc::new(Blind));
        registry.bind(&source().url, "blind").unwrap();

        let result = registry.extract("Community news 2026", &source());
        assert!(!result.used_fallback);
        assert_eq!(result.strategy, "blind");
        assert!(result.identifiers.is_empty());
    }

    #[test]
    fn test_bind_unknown_strategy_fails() {
        let mut registry = ExtractorRegistry::new();
        assert!(registry.bind("https://example.com/", "nope").is_err());
    }

    #[test]
    fn test_from_config_binds_sources() {
        let mut config = Config::default();
        config.strategies = vec![StrategyConfig {
            name: "bldg".into(),
            patterns: vec![PatternConfig {
                regex: r"Bldg [A-Z] - Unit \d+".into(),
                template: "$0".into(),
            }],
            validity: None,
        }];
        config.sources = vec![source().with_strategy("bldg")];

        let registry = ExtractorRegistry::from_config(&config).unwrap();
        let result = registry.extract("Bldg A - Unit 1 and Unit 55", &source());
        assert_eq!(result.strategy, "bldg");
        assert_eq!(
            result.identifiers.into_iter().collect::<Vec<_>>(),
            vec!["Bldg A - Unit 1"]
        );
    }
}
