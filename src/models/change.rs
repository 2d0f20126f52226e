//! Change events and outbound notifications.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Output of the diff engine. Consumed immediately by the alert policy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Identifiers present now but not in the baseline
    pub added: BTreeSet<String>,
    /// Identifiers in the baseline that are gone now
    pub removed: BTreeSet<String>,
    /// Bounded text-diff summary (text mode only)
    pub summary: Option<String>,
}

impl ChangeEvent {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.summary.is_none()
    }

    /// Total number of changed identifiers.
    pub fn change_count(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}

/// Why a notification is sent. Each reason has its own cooldown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertReason {
    ContentChange,
    Unreachable,
}

/// Push priority on the 1..=5 ntfy scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Min,
    Low,
    Default,
    High,
    Urgent,
}

impl Priority {
    /// Header value for the `Priority` field.
    pub fn as_header(&self) -> &'static str {
        match self {
            Priority::Min => "1",
            Priority::Low => "2",
            Priority::Default => "3",
            Priority::High => "4",
            Priority::Urgent => "5",
        }
    }
}

/// A fully formatted push notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub source_url: String,
    pub reason: AlertReason,
    /// ASCII-only title
    pub title: String,
    pub body: String,
    pub priority: Priority,
    pub tags: Vec<String>,
    /// Click-through URL
    pub click: Option<String>,
}
