//! Acceptance predicate for candidate identifiers.

use std::collections::HashSet;

use crate::models::ValidityConfig;

/// Per-strategy rules a candidate must satisfy to become an identifier.
#[derive(Debug, Clone)]
pub struct ValidityRules {
    min_len: usize,
    max_len: usize,
    require_digit_or_keyword: bool,
    keywords: HashSet<String>,
    noise: Vec<String>,
}

impl ValidityRules {
    pub fn from_config(config: &ValidityConfig) -> Self {
        Self {
            min_len: config.min_len,
            max_len: config.max_len,
            require_digit_or_keyword: config.require_digit_or_keyword,
            keywords: config.keywords.iter().map(|k| k.to_lowercase()).collect(),
            noise: config.noise.iter().map(|n| n.to_lowercase()).collect(),
        }
    }

    /// Whether `candidate` is a plausible listing identifier.
    pub fn accepts(&self, candidate: &str) -> bool {
        let len = candidate.chars().count();
        if len < self.min_len || len > self.max_len {
            return false;
        }

        let lower = candidate.to_lowercase();
        if self.noise.iter().any(|phrase| lower.contains(phrase.as_str())) {
            return false;
        }

        if self.require_digit_or_keyword {
            let has_digit = candidate.chars().any(|c| c.is_ascii_digit());
            let has_keyword = lower
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| self.keywords.contains(word));
            if !has_digit && !has_keyword {
                return false;
            }
        }
        true
    }
}

impl Default for ValidityRules {
    fn default() -> Self {
        Self::from_config(&ValidityConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_unit_identifiers() {
        let rules = ValidityRules::default();
        assert!(rules.accepts("Unit 408"));
        assert!(rules.accepts("2BR-Harlem-$2104"));
        assert!(rules.accepts("Bldg A - Unit 1"));
        assert!(rules.accepts("Riverside Apartments"));
    }

    #[test]
    fn test_length_bounds() {
        let rules = ValidityRules::default();
        assert!(!rules.accepts("4B"));
        assert!(!rules.accepts(&"Unit 1 ".repeat(30)));
    }

    #[test]
    fn test_requires_digit_or_keyword() {
        let rules = ValidityRules::default();
        assert!(!rules.accepts("Learn More"));
        assert!(rules.accepts("Learn More 12"));
        // keywords match whole words only
        assert!(!rules.accepts("Stay informed"));
    }

    #[test]
    fn test_rejects_noise() {
        let rules = ValidityRules::default();
        assert!(!rules.accepts("26 Results Neighborhood-$2104"));
        assert!(!rules.accepts("Click here for Unit 5"));
        assert!(!rules.accepts("Sign in to apply 2026"));
        assert!(!rules.accepts("3 Person Household"));
    }

    #[test]
    fn test_custom_rules() {
        let rules = ValidityRules::from_config(&ValidityConfig {
            min_len: 2,
            max_len: 10,
            require_digit_or_keyword: false,
            keywords: vec![],
            noise: vec!["Sold".into()],
        });
        assert!(rules.accepts("4B"));
        assert!(rules.accepts("Penthouse"));
        assert!(!rules.accepts("sold out"));
    }
}
