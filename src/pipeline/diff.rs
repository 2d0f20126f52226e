//! Change detection between a baseline and a fresh snapshot.
//!
//! Two modes:
//!
//! - identifier sets: plain set difference, no heuristics
//! - text: word-level alignment with bounded, context-carrying snippets
//!
//! Nothing here touches persisted state. The caller decides whether the new
//! snapshot becomes the baseline.

use std::collections::BTreeSet;
use std::time::Duration;

use similar::{Algorithm, DiffTag, TextDiff};

use crate::models::{ChangeEvent, DiffConfig};
use crate::utils::truncate_graphemes;

const TRUNCATION_MARKER: &str = "\n\n[...truncated]";

/// `added = new - old`, `removed = old - new`.
pub fn diff_identifiers(old: &BTreeSet<String>, new: &BTreeSet<String>) -> ChangeEvent {
    ChangeEvent {
        added: new.difference(old).cloned().collect(),
        removed: old.difference(new).cloned().collect(),
        summary: None,
    }
}

/// Text-mode diff summarizer.
#[derive(Debug, Clone, Default)]
pub struct TextDiffer {
    config: DiffConfig,
}

impl TextDiffer {
    pub fn new(config: DiffConfig) -> Self {
        Self { config }
    }

    /// Diff two normalized texts into a `ChangeEvent` carrying only a summary.
    pub fn diff(&self, old: &str, new: &str) -> ChangeEvent {
        ChangeEvent {
            summary: self.summarize(old, new),
            ..ChangeEvent::default()
        }
    }

    /// Bounded summary of what changed, or `None` when the change is too
    /// small to matter (whitespace, counters, reordering churn).
    pub fn summarize(&self, old: &str, new: &str) -> Option<String> {
        if old == new {
            return None;
        }

        let diff = TextDiff::configure()
            .algorithm(Algorithm::Myers)
            .timeout(Duration::from_millis(self.config.timeout_ms))
            .diff_words(old, new);

        let old_offsets = byte_offsets(diff.old_slices());
        let new_offsets = byte_offsets(diff.new_slices());

        let mut additions: Vec<String> = Vec::new();
        let mut removals: Vec<String> = Vec::new();
        let mut changed_chars = 0usize;

        for op in diff.ops() {
            let (tag, old_range, new_range) = op.as_tag_tuple();
            if tag == DiffTag::Equal {
                continue;
            }

            if matches!(tag, DiffTag::Insert | DiffTag::Replace) {
                let (start, end) = (new_offsets[new_range.start], new_offsets[new_range.end]);
                let segment = new[start..end].trim();
                let length = segment.chars().count();
                if length >= self.config.min_segment_chars {
                    changed_chars += length;
                    let from = back_chars(new, start, self.config.context_chars);
                    let to = forward_chars(new, end, self.config.context_chars);
                    additions.push(format!("+ {}", new[from..to].trim()));
                }
            }

            if matches!(tag, DiffTag::Delete | DiffTag::Replace) {
                let (start, end) = (old_offsets[old_range.start], old_offsets[old_range.end]);
                let segment = old[start..end].trim();
                let length = segment.chars().count();
                if length >= self.config.min_segment_chars {
                    changed_chars += length;
                    let (cut, _) = truncate_graphemes(segment, self.config.max_removal_chars);
                    removals.push(format!("- {cut}"));
                }
            }
        }

        if changed_chars < self.config.min_changed_chars {
            log::debug!("Ignoring text change of {changed_chars} chars");
            return None;
        }

        // additions first, removals fill the remaining slots
        let snippets: Vec<String> = additions
            .into_iter()
            .chain(removals)
            .take(self.config.max_snippets)
            .collect();
        if snippets.is_empty() {
            return None;
        }

        let summary = snippets.join("\n\n");
        match truncate_graphemes(&summary, self.config.max_summary_chars) {
            (cut, true) => Some(format!("{cut}{TRUNCATION_MARKER}")),
            (_, false) => Some(summary),
        }
    }
}

/// Byte offset of every token boundary; `offsets[i]` is where token `i` starts.
fn byte_offsets(tokens: &[&str]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(tokens.len() + 1);
    let mut position = 0;
    offsets.push(position);
    for token in tokens {
        position += token.len();
        offsets.push(position);
    }
    offsets
}

/// Byte index `n` characters before `idx`.
fn back_chars(s: &str, idx: usize, n: usize) -> usize {
    if n == 0 {
        return idx;
    }
    s[..idx]
        .char_indices()
        .rev()
        .take(n)
        .last()
        .map_or(idx, |(i, _)| i)
}

/// Byte index `n` characters after `idx`.
fn forward_chars(s: &str, idx: usize, n: usize) -> usize {
    s[idx..]
        .char_indices()
        .nth(n)
        .map_or(s.len(), |(i, _)| idx + i)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_identifier_set_algebra() {
        let old = set(&["Bldg A - Unit 1", "Bldg A - Unit 2", "Bldg B - Unit 9"]);
        let new = set(&["Bldg A - Unit 2", "Bldg B - Unit 9", "Bldg C - Unit 4"]);

        let event = diff_identifiers(&old, &new);
        assert_eq!(event.added, set(&["Bldg C - Unit 4"]));
        assert_eq!(event.removed, set(&["Bldg A - Unit 1"]));
        assert!(event.added.is_disjoint(&event.removed));
        assert!(event.summary.is_none());
    }

    #[test]
    fn test_identical_sets_are_empty() {
        let ids = set(&["Unit 1", "Unit 2"]);
        assert!(diff_identifiers(&ids, &ids).is_empty());
        assert!(diff_identifiers(&BTreeSet::new(), &BTreeSet::new()).is_empty());
    }

    #[test]
    fn test_disjoint_for_arbitrary_sets() {
        let pool = ["a1", "b2", "c3", "d4", "e5", "f6"];
        for mask_old in 0u32..64 {
            for mask_new in [0u32, 5, 21, 42, 63] {
                let pick = |mask: u32| -> BTreeSet<String> {
                    pool.iter()
                        .enumerate()
                        .filter(|(i, _)| mask & (1 << i) != 0)
                        .map(|(_, s)| s.to_string())
                        .collect()
                };
                let (old, new) = (pick(mask_old), pick(mask_new));
                let event = diff_identifiers(&old, &new);
                assert!(event.added.is_disjoint(&event.removed));
                assert!(event.added.is_subset(&new));
                assert!(event.removed.is_subset(&old));
            }
        }
    }

    #[test]
    fn test_text_identical_is_none() {
        let differ = TextDiffer::default();
        assert_eq!(differ.summarize("Unit 3 rent $1,500", "Unit 3 rent $1,500"), None);
    }

    #[test]
    fn test_text_addition_with_context() {
        let differ = TextDiffer::default();
        let old = "Affordable rentals\nUnit 3 rent $1,500";
        let new = "Affordable rentals\nUnit 3 rent $1,500\nUnit 7 rent $1,800 lottery opens";

        let summary = differ.summarize(old, new).unwrap();
        assert!(summary.starts_with("+ "));
        assert!(summary.contains("Unit 7 rent $1,800 lottery opens"));
        // context reaches back into unchanged text
        assert!(summary.contains("Unit 3 rent $1,500"));
    }

    #[test]
    fn test_text_small_churn_is_suppressed() {
        let differ = TextDiffer::default();
        let old = "Available units\nUpdated: 3 hours ago\nUnit 3 rent $1,500";
        let new = "Available units\nUpdated: 4 hours ago\nUnit 3 rent $1,500";
        assert_eq!(differ.summarize(old, new), None);
    }

    #[test]
    fn test_text_whitespace_only_is_suppressed() {
        let differ = TextDiffer::default();
        assert_eq!(differ.summarize("Unit 3 rent $1,500", "Unit 3  rent $1,500"), None);
    }

    #[test]
    fn test_text_removal_snippet() {
        let differ = TextDiffer::default();
        let old = "Unit 3 rent $1,500\nBuilding C waitlist open until March";
        let new = "Unit 3 rent $1,500";
        assert_eq!(
            differ.summarize(old, new).as_deref(),
            Some("- Building C waitlist open until March")
        );
    }

    #[test]
    fn test_text_removal_is_cut() {
        let differ = TextDiffer::new(DiffConfig {
            max_removal_chars: 10,
            ..DiffConfig::default()
        });
        let old = "Unit 3 rent $1,500\nBuilding C waitlist open until March";
        let new = "Unit 3 rent $1,500";
        assert_eq!(differ.summarize(old, new).as_deref(), Some("- Building C"));
    }

    #[test]
    fn test_text_summary_truncated() {
        let differ = TextDiffer::new(DiffConfig {
            max_summary_chars: 30,
            ..DiffConfig::default()
        });
        let old = "Listings";
        let new = "Listings\nUnit 7 rent $1,800 lottery opens in April for all applicants";
        let summary = differ.summarize(old, new).unwrap();
        assert!(summary.ends_with("\n\n[...truncated]"));
        assert_eq!(summary.chars().count(), 30 + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn test_text_diff_event_only_has_summary() {
        let differ = TextDiffer::default();
        let event = differ.diff("Listings", "Listings\nBuilding D lottery now accepting applications");
        assert!(event.added.is_empty());
        assert!(event.removed.is_empty());
        assert!(event.summary.is_some());
    }

    #[test]
    fn test_char_boundaries() {
        let s = "café – Unit 4";
        let idx = s.find("Unit").unwrap();
        let from = back_chars(s, idx, 3);
        assert_eq!(&s[from..idx], " – ");
        assert_eq!(forward_chars(s, idx, 100), s.len());
    }
}
