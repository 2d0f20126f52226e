//! Per-source failure and cooldown records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AlertReason;

/// Consecutive fetch failures for one source, stored in `failures.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub count: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub last_failure_at: Option<DateTime<Utc>>,
}

/// Last delivered notification per reason, stored in `alert_cooldowns.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownRecord {
    #[serde(default)]
    pub content_change: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unreachable: Option<DateTime<Utc>>,
}

impl CooldownRecord {
    pub fn last(&self, reason: AlertReason) -> Option<DateTime<Utc>> {
        match reason {
            AlertReason::ContentChange => self.content_change,
            AlertReason::Unreachable => self.unreachable,
        }
    }

    pub fn record(&mut self, reason: AlertReason, at: DateTime<Utc>) {
        match reason {
            AlertReason::ContentChange => self.content_change = Some(at),
            AlertReason::Unreachable => self.unreachable = Some(at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_reasons_are_independent() {
        let mut record = CooldownRecord::default();
        let now = Utc::now();
        record.record(AlertReason::Unreachable, now);
        assert_eq!(record.last(AlertReason::Unreachable), Some(now));
        assert_eq!(record.last(AlertReason::ContentChange), None);
    }
}
