//! Extraction sanity guard.
//!
//! Refuses identifier sets that would turn extractor instability into a
//! mass false-positive alert, or wipe a baseline with an empty result:
//!
//! - empty set while the page still talks about rentals
//! - more identifiers than the absolute ceiling (per-source override)
//! - growth past `baseline + max_growth` in a single run

use std::collections::BTreeSet;

use crate::error::{AppError, Result};
use crate::models::{Baseline, SanityConfig, Source};
use crate::services::looks_listing_like;

/// Guard applied to every identifier set before it is diffed.
#[derive(Debug, Clone, Default)]
pub struct SanityGuard {
    config: SanityConfig,
}

/// Result of a sanity check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanityResult {
    /// Safe to diff against the baseline
    Safe { count: usize, previous_count: usize },
    /// No baseline yet
    ColdStart { count: usize },
    /// Nothing extracted from listing-like text
    Empty,
    /// Above the absolute ceiling
    Oversized { count: usize, ceiling: usize },
    /// Grew too fast relative to the baseline
    Surge {
        count: usize,
        previous_count: usize,
        limit: usize,
    },
}

impl SanityResult {
    pub fn is_anomaly(&self) -> bool {
        matches!(
            self,
            SanityResult::Empty | SanityResult::Oversized { .. } | SanityResult::Surge { .. }
        )
    }
}

impl SanityGuard {
    pub fn new(config: SanityConfig) -> Self {
        Self { config }
    }

    /// Identifier ceiling for `source`.
    pub fn ceiling(&self, source: &Source) -> usize {
        source.max_identifiers.unwrap_or(self.config.max_identifiers)
    }

    /// Classify `identifiers` extracted from `text`.
    pub fn check(
        &self,
        source: &Source,
        identifiers: &BTreeSet<String>,
        text: &str,
        baseline: Option<&Baseline>,
    ) -> SanityResult {
        let count = identifiers.len();

        if count == 0 && looks_listing_like(text) {
            return SanityResult::Empty;
        }

        let ceiling = self.ceiling(source);
        if count > ceiling {
            return SanityResult::Oversized { count, ceiling };
        }

        let Some(baseline) = baseline else {
            return SanityResult::ColdStart { count };
        };

        let previous_count = baseline.identifiers.len();
        if previous_count >= self.config.min_baseline {
            let limit = previous_count.saturating_add(self.config.max_growth);
            if count > limit {
                return SanityResult::Surge {
                    count,
                    previous_count,
                    limit,
                };
            }
        }

        SanityResult::Safe {
            count,
            previous_count,
        }
    }

    /// Return Ok if the set can be trusted, an extraction anomaly otherwise.
    pub fn validate(
        &self,
        source: &Source,
        identifiers: &BTreeSet<String>,
        text: &str,
        baseline: Option<&Baseline>,
    ) -> Result<()> {
        match self.check(source, identifiers, text, baseline) {
            SanityResult::Safe {
                count,
                previous_count,
            } => {
                log::debug!(
                    "Sanity: SAFE for {} ({} identifiers, was {})",
                    source.url,
                    count,
                    previous_count
                );
                Ok(())
            }
            SanityResult::ColdStart { count } => {
                log::debug!("Sanity: COLD START for {} ({} identifiers)", source.url, count);
                Ok(())
            }
            SanityResult::Empty => Err(AppError::extraction(
                &source.url,
                "no identifiers extracted from listing-like content",
            )),
            SanityResult::Oversized { count, ceiling } => Err(AppError::extraction(
                &source.url,
                format!("{count} identifiers exceeds ceiling of {ceiling}"),
            )),
            SanityResult::Surge {
                count,
                previous_count,
                limit,
            } => Err(AppError::extraction(
                &source.url,
                format!("{previous_count} -> {count} identifiers exceeds growth limit of {limit}"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{DiffMode, Snapshot};

    const LISTING_TEXT: &str = "Available apartments\nrent from $1,500";

    fn ids(count: usize) -> BTreeSet<String> {
        (0..count).map(|i| format!("Unit {i}")).collect()
    }

    fn baseline(count: usize) -> Baseline {
        let snapshot = Snapshot::new(String::new(), ids(count));
        Baseline::from_snapshot(&snapshot, DiffMode::Identifiers, Utc::now())
    }

    fn source() -> Source {
        Source::new("https://example.com/listings")
    }

    #[test]
    fn test_safe_with_baseline() {
        let guard = SanityGuard::default();
        let result = guard.check(&source(), &ids(12), LISTING_TEXT, Some(&baseline(10)));
        assert_eq!(
            result,
            SanityResult::Safe {
                count: 12,
                previous_count: 10
            }
        );
    }

    #[test]
    fn test_cold_start() {
        let guard = SanityGuard::default();
        let result = guard.check(&source(), &ids(30), LISTING_TEXT, None);
        assert_eq!(result, SanityResult::ColdStart { count: 30 });
    }

    #[test]
    fn test_empty_on_listing_text_is_anomaly() {
        let guard = SanityGuard::default();
        let result = guard.check(&source(), &BTreeSet::new(), LISTING_TEXT, Some(&baseline(1)));
        assert_eq!(result, SanityResult::Empty);
        assert!(result.is_anomaly());
    }

    #[test]
    fn test_empty_on_unrelated_text_is_trusted() {
        let guard = SanityGuard::default();
        let result = guard.check(
            &source(),
            &BTreeSet::new(),
            "Community news and events",
            Some(&baseline(1)),
        );
        assert!(!result.is_anomaly());
    }

    #[test]
    fn test_oversized() {
        let guard = SanityGuard::default();
        let result = guard.check(&source(), &ids(151), LISTING_TEXT, None);
        assert_eq!(
            result,
            SanityResult::Oversized {
                count: 151,
                ceiling: 150
            }
        );
    }

    #[test]
    fn test_per_source_ceiling() {
        let guard = SanityGuard::default();
        let mut src = source();
        src.max_identifiers = Some(20);
        assert!(guard.check(&src, &ids(21), LISTING_TEXT, None).is_anomaly());
        assert!(!guard.check(&src, &ids(20), LISTING_TEXT, None).is_anomaly());
    }

    #[test]
    fn test_surge_over_baseline() {
        let guard = SanityGuard::default();
        let result = guard.check(&source(), &ids(60), LISTING_TEXT, Some(&baseline(10)));
        assert!(matches!(result, SanityResult::Surge { limit: 50, .. }));
    }

    #[test]
    fn test_small_baseline_skips_growth_check() {
        let guard = SanityGuard::default();
        let result = guard.check(&source(), &ids(60), LISTING_TEXT, Some(&baseline(2)));
        assert!(!result.is_anomaly());
    }

    #[test]
    fn test_validate_returns_extraction_error() {
        let guard = SanityGuard::default();
        let result = guard.validate(&source(), &BTreeSet::new(), LISTING_TEXT, None);
        assert!(matches!(result, Err(AppError::Extraction { .. })));
    }
}
