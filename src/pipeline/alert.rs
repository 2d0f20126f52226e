//! Alert policy: what to send, at which priority, and whether the cooldown
//! lets it through.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};

use crate::models::{
    AlertConfig, AlertReason, ChangeEvent, CooldownRecord, FailureRecord, Notification,
    NotifyConfig, Priority, Source,
};

/// Per-(source, reason) cooldown gate.
///
/// - First alert always allowed.
/// - Inside the window, alerts are suppressed.
/// - Records are only updated by the caller after a delivery succeeds.
#[derive(Debug, Clone)]
pub struct CooldownGate {
    content_change: TimeDelta,
    unreachable: TimeDelta,
}

impl CooldownGate {
    pub fn new(content_change: TimeDelta, unreachable: TimeDelta) -> Self {
        Self {
            content_change: content_change.max(TimeDelta::zero()),
            unreachable: unreachable.max(TimeDelta::zero()),
        }
    }

    pub fn from_config(config: &AlertConfig) -> Self {
        Self::new(config.content_cooldown(), config.outage_cooldown())
    }

    pub fn window(&self, reason: AlertReason) -> TimeDelta {
        match reason {
            AlertReason::ContentChange => self.content_change,
            AlertReason::Unreachable => self.unreachable,
        }
    }

    /// Whether an alert for `reason` may go out at `now`. Does not mutate.
    pub fn allows(&self, record: &CooldownRecord, reason: AlertReason, now: DateTime<Utc>) -> bool {
        match record.last(reason) {
            None => true,
            Some(ts) => now.signed_duration_since(ts) >= self.window(reason),
        }
    }
}

/// What the policy decided for one change event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertDecision {
    /// Nothing worth telling anyone
    Quiet,
    /// Worth sending, but inside the cooldown window
    Suppressed(Notification),
    Deliver(Notification),
}

/// Turns change events and outages into notifications.
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    alerts: AlertConfig,
    notify: NotifyConfig,
    gate: CooldownGate,
}

impl AlertPolicy {
    pub fn new(alerts: &AlertConfig, notify: &NotifyConfig) -> Self {
        Self {
            alerts: alerts.clone(),
            notify: notify.clone(),
            gate: CooldownGate::from_config(alerts),
        }
    }

    pub fn gate(&self) -> &CooldownGate {
        &self.gate
    }

    /// Decide on a change event from a successful fetch.
    pub fn evaluate(
        &self,
        source: &Source,
        event: &ChangeEvent,
        cooldowns: &CooldownRecord,
        now: DateTime<Utc>,
    ) -> AlertDecision {
        let Some(notification) = self.compose(source, event) else {
            return AlertDecision::Quiet;
        };
        if self.gate.allows(cooldowns, AlertReason::ContentChange, now) {
            AlertDecision::Deliver(notification)
        } else {
            AlertDecision::Suppressed(notification)
        }
    }

    /// Build the message for `event`, if it deserves one.
    pub fn compose(&self, source: &Source, event: &ChangeEvent) -> Option<Notification> {
        let host = source.host();

        if !event.added.is_empty() {
            let mut body = format!("{}\n\n", source.url);
            push_listed(&mut body, "New listings", &event.added, self.alerts.max_listed_added);
            if !event.removed.is_empty() {
                body.push_str("\n\n");
                push_listed(&mut body, "Removed", &event.removed, self.alerts.max_listed_removed);
            }
            return Some(self.notification(
                source,
                AlertReason::ContentChange,
                format!("New listings: {host}"),
                body,
                Priority::High,
                &self.notify.listing_tags,
            ));
        }

        if !event.removed.is_empty() {
            if event.removed.len() < self.alerts.min_removed {
                log::info!(
                    "Only {} removal(s) on {}; below alert threshold of {}",
                    event.removed.len(),
                    source.url,
                    self.alerts.min_removed
                );
                return None;
            }
            let mut body = format!("{}\n\n", source.url);
            push_listed(&mut body, "Removed", &event.removed, self.alerts.max_listed_removed);
            return Some(self.notification(
                source,
                AlertReason::ContentChange,
                format!("Listings removed: {host}"),
                body,
                Priority::Low,
                &self.notify.removal_tags,
            ));
        }

        let summary = event.summary.as_ref()?;
        Some(self.notification(
            source,
            AlertReason::ContentChange,
            format!("Page changed: {host}"),
            format!("{}\n\n{}", source.url, summary),
            Priority::Default,
            &self.notify.change_tags,
        ))
    }

    /// Build the outage message for a source that keeps failing.
    pub fn outage(&self, source: &Source, failure: &FailureRecord) -> Notification {
        let mut body = format!(
            "{}\n\nFailed {} consecutive run(s).",
            source.url, failure.count
        );
        if let Some(error) = &failure.last_error {
            body.push_str(&format!("\nLast error: {error}"));
        }
        self.notification(
            source,
            AlertReason::Unreachable,
            format!("Source unreachable: {}", source.host()),
            body,
            Priority::Default,
            &self.notify.outage_tags,
        )
    }

    fn notification(
        &self,
        source: &Source,
        reason: AlertReason,
        title: String,
        body: String,
        priority: Priority,
        tags: &[String],
    ) -> Notification {
        Notification {
            source_url: source.url.clone(),
            reason,
            title,
            body,
            priority,
            tags: tags.to_vec(),
            click: Some(source.url.clone()),
        }
    }
}

/// Append a heading and up to `limit` items in sorted order, with a
/// "+K more" line when cut.
fn push_listed(body: &mut String, heading: &str, items: &BTreeSet<String>, limit: usize) {
    let total = items.len();
    body.push_str(&format!("{heading} ({total}):"));
    for item in items.iter().take(limit) {
        body.push_str(&format!("\n• {item}"));
    }
    if total > limit {
        body.push_str(&format!("\n+{} more", total - limit));
    }
}
