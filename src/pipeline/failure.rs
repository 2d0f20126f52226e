//! Consecutive fetch-failure tracking.

use chrono::{DateTime, Utc};

use super::alert::CooldownGate;
use crate::models::{AlertReason, CooldownRecord, FailureRecord};

/// Counts consecutive failures per source and decides when an outage alert
/// is due. The caller persists the record and stamps the cooldown once the
/// alert is actually delivered.
#[derive(Debug, Clone)]
pub struct FailureTracker {
    threshold: u32,
    gate: CooldownGate,
}

impl FailureTracker {
    pub fn new(threshold: u32, gate: CooldownGate) -> Self {
        Self {
            threshold: threshold.max(1),
            gate,
        }
    }

    /// Count one more failure. Returns whether an outage alert should be sent.
    pub fn record_failure(
        &self,
        record: &mut FailureRecord,
        cooldowns: &CooldownRecord,
        error: &str,
        now: DateTime<Utc>,
    ) -> bool {
        record.count = record.count.saturating_add(1);
        record.last_error = Some(error.to_string());
        record.last_failure_at = Some(now);

        if record.count < self.threshold {
            return false;
        }
        self.gate.allows(cooldowns, AlertReason::Unreachable, now)
    }

    /// Reset after a successful fetch. Returns whether the record changed.
    pub fn record_success(&self, record: &mut FailureRecord) -> bool {
        if record.count == 0 {
            return false;
        }
        if record.count >= self.threshold {
            log::info!("Recovered after {} consecutive failures", record.count);
        }
        record.count = 0;
        true
    }
}
