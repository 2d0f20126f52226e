//! Config-defined regex extraction strategies.

use regex::Regex;

use super::{ExtractionStrategy, ValidityRules};
use crate::error::Result;
use crate::models::StrategyConfig;
use crate::utils::collapse_whitespace;

/// A compiled regex with its output template.
#[derive(Debug, Clone)]
struct Pattern {
    regex: Regex,
    template: String,
}

/// Site-specific strategy built from a `[[strategies]]` entry.
///
/// Each pattern's template is expanded with `regex` capture syntax
/// (`$1`, `${name}`, `$$` for a literal dollar sign).
#[derive(Debug, Clone)]
pub struct PatternStrategy {
    name: String,
    patterns: Vec<Pattern>,
    validity: ValidityRules,
}

impl PatternStrategy {
    pub fn from_config(config: &StrategyConfig) -> Result<Self> {
        let patterns = config
            .patterns
            .iter()
            .map(|p| {
                Ok(Pattern {
                    regex: Regex::new(&p.regex)?,
                    template: p.template.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let validity = config
            .validity
            .as_ref()
            .map(ValidityRules::from_config)
            .unwrap_or_default();

        Ok(Self {
            name: config.name.clone(),
            patterns,
            validity,
        })
    }
}

impl ExtractionStrategy for PatternStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn validity(&self) -> &ValidityRules {
        &self.validity
    }

    fn candidates(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        for pattern in &self.patterns {
            for caps in pattern.regex.captures_iter(text) {
                let mut expanded = String::new();
                caps.expand(&pattern.template, &mut expanded);
                out.push(collapse_whitespace(&expanded));
            }
        }
        out
    }
}
