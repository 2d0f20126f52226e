//! Snapshot and baseline data structures.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::DiffMode;

/// SHA-256 hex digest of normalized text.
pub fn content_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Result of one fetch + normalize + extract cycle. Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Normalized page text
    pub text: String,
    /// Hash of `text`
    pub content_hash: String,
    /// Extracted listing identifiers (empty in text mode)
    pub identifiers: BTreeSet<String>,
}

impl Snapshot {
    pub fn new(text: String, identifiers: BTreeSet<String>) -> Self {
        Self {
            content_hash: content_hash(&text),
            text,
            identifiers,
        }
    }

    /// Snapshot of a text-mode source.
    pub fn text_only(text: String) -> Self {
        Self::new(text, BTreeSet::new())
    }
}

/// Last known good state of a source, stored in `baselines.json`.
///
/// The normalized text lives in a separate document so the baseline file
/// stays small enough to read at a glance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Baseline {
    pub mode: DiffMode,
    #[serde(default)]
    pub identifiers: BTreeSet<String>,
    pub content_hash: String,
    pub updated_at: DateTime<Utc>,
}

impl Baseline {
    pub fn from_snapshot(snapshot: &Snapshot, mode: DiffMode, now: DateTime<Utc>) -> Self {
        Self {
            mode,
            identifiers: snapshot.identifiers.clone(),
            content_hash: snapshot.content_hash.clone(),
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(content_hash("Unit 4B"), content_hash("Unit 4B"));
        assert_ne!(content_hash("Unit 4B"), content_hash("Unit 4C"));
        assert_eq!(content_hash("").len(), 64);
    }

    #[test]
    fn test_baseline_from_snapshot() {
        let ids: BTreeSet<String> = ["Unit 1".to_string()].into_iter().collect();
        let snapshot = Snapshot::new("Unit 1 $2,000".to_string(), ids.clone());
        let now = Utc::now();
        let baseline = Baseline::from_snapshot(&snapshot, DiffMode::Identifiers, now);
        assert_eq!(baseline.identifiers, ids);
        assert_eq!(baseline.content_hash, snapshot.content_hash);
        assert_eq!(baseline.updated_at, now);
    }

    #[test]
    fn test_baseline_json_without_identifiers() {
        let json = r#"{"mode":"text","content_hash":"abc","updated_at":"2026-01-05T10:00:00Z"}"#;
        let baseline: Baseline = serde_json::from_str(json).unwrap();
        assert_eq!(baseline.mode, DiffMode::Text);
        assert!(baseline.identifiers.is_empty());
    }
}
