// src/pipeline/monitor.rs

//! Run orchestration.
//!
//! One run walks the configured sources in order. Each source runs
//! fetch → normalize → extract → sanity → diff → alert → persist to
//! completion before the next one starts, and no source's failure stops the
//! others.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::alert::{AlertDecision, AlertPolicy};
use super::diff::{TextDiffer, diff_identifiers};
use super::failure::FailureTracker;
use super::sanity::SanityGuard;
use crate::error::{AppError, Result};
use crate::models::{
    AlertReason, Baseline, ChangeEvent, Config, DiffMode, Notification, Snapshot, Source,
};
use crate::services::{
    ExtractorRegistry, Fetcher, HttpFetcher, LogNotifier, Normalizer, Notifier, NtfyNotifier,
    fetch_with_retry,
};
use crate::storage::{Document, LocalStorage, MonitorState, StateStore};
use crate::utils::log::{header, summary};

/// What happened to one source in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    /// First successful fetch; baseline recorded, no alert
    Initialized,
    Unchanged,
    /// Changed, but nothing worth an alert
    Updated,
    Notified,
    /// Alert-worthy change inside the cooldown window
    Suppressed,
    /// Alert-worthy change whose delivery failed
    NotifyFailed,
    /// Extraction could not be trusted; baseline kept
    Anomaly,
    FetchFailed { failures: u32, outage_alerted: bool },
}

impl fmt::Display for SourceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceOutcome::Initialized => f.write_str("initialized"),
            SourceOutcome::Unchanged => f.write_str("unchanged"),
            SourceOutcome::Updated => f.write_str("updated"),
            SourceOutcome::Notified => f.write_str("notified"),
            SourceOutcome::Suppressed => f.write_str("suppressed"),
            SourceOutcome::NotifyFailed => f.write_str("notify failed"),
            SourceOutcome::Anomaly => f.write_str("anomaly"),
            SourceOutcome::FetchFailed {
                failures,
                outage_alerted,
            } => {
                write!(f, "fetch failed ({failures} in a row")?;
                if *outage_alerted {
                    f.write_str(", outage alert sent")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Outcomes of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<(String, SourceOutcome)>,
    /// Documents that could not be written this run
    pub persistence_failures: usize,
}

impl RunReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            outcomes: Vec::new(),
            persistence_failures: 0,
        }
    }

    pub fn outcome(&self, url: &str) -> Option<&SourceOutcome> {
        self.outcomes
            .iter()
            .find(|(u, _)| u == url)
            .map(|(_, outcome)| outcome)
    }

    fn count(&self, pred: impl Fn(&SourceOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| pred(o)).count()
    }

    pub fn notified(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                SourceOutcome::Notified
                    | SourceOutcome::FetchFailed {
                        outage_alerted: true,
                        ..
                    }
            )
        })
    }

    pub fn fetch_failures(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::FetchFailed { .. }))
    }

    pub fn anomalies(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Anomaly))
    }

    pub fn notify_failures(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::NotifyFailed))
    }

    /// Log the closing summary block.
    pub fn log_summary(&self) {
        let elapsed = Utc::now().signed_duration_since(self.started_at);
        summary(
            "Run complete",
            &[
                ("sources", self.outcomes.len().to_string()),
                ("initialized", self.count(|o| *o == SourceOutcome::Initialized).to_string()),
                ("unchanged", self.count(|o| *o == SourceOutcome::Unchanged).to_string()),
                ("updated", self.count(|o| *o == SourceOutcome::Updated).to_string()),
                ("notifications", self.notified().to_string()),
                ("suppressed", self.count(|o| *o == SourceOutcome::Suppressed).to_string()),
                ("notify failures", self.notify_failures().to_string()),
                ("anomalies", self.anomalies().to_string()),
                ("fetch failures", self.fetch_failures().to_string()),
                ("persistence failures", self.persistence_failures.to_string()),
                ("elapsed", format!("{}s", elapsed.num_seconds())),
            ],
        );
    }
}

/// Source-processing result before persistence.
struct Processed {
    outcome: SourceOutcome,
    dirty: Vec<Document>,
}

impl Processed {
    fn new(outcome: SourceOutcome) -> Self {
        Self {
            outcome,
            dirty: Vec::new(),
        }
    }

    fn touch(&mut self, document: Document) {
        if !self.dirty.contains(&document) {
            self.dirty.push(document);
        }
    }
}

/// The change monitor.
pub struct Monitor {
    config: Arc<Config>,
    fetcher: Arc<dyn Fetcher>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn StateStore>,
    registry: ExtractorRegistry,
    normalizer: Normalizer,
    differ: TextDiffer,
    guard: SanityGuard,
    policy: AlertPolicy,
    tracker: FailureTracker,
}

impl Monitor {
    pub fn new(
        config: Arc<Config>,
        fetcher: Arc<dyn Fetcher>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn StateStore>,
    ) -> Result<Self> {
        let registry = ExtractorRegistry::from_config(&config)?;
        let policy = AlertPolicy::new(&config.alerts, &config.notify);
        let tracker = FailureTracker::new(config.alerts.failure_threshold, policy.gate().clone());

        Ok(Self {
            registry,
            normalizer: Normalizer::new(config.normalize.clone()),
            differ: TextDiffer::new(config.diff.clone()),
            guard: SanityGuard::new(config.sanity.clone()),
            policy,
            tracker,
            config,
            fetcher,
            notifier,
            store,
        })
    }

    /// Monitor wired to HTTP fetching, local state and the configured
    /// notification endpoint (or a dry-run logger without one).
    pub fn from_config(config: Arc<Config>) -> Result<Self> {
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(&config.fetch)?);
        let notifier: Arc<dyn Notifier> = match &config.notify.endpoint {
            Some(endpoint) => Arc::new(NtfyNotifier::new(endpoint.clone(), &config.notify)?),
            None => {
                log::warn!("No notification endpoint configured; alerts are only logged");
                Arc::new(LogNotifier)
            }
        };
        let store: Arc<dyn StateStore> = Arc::new(LocalStorage::new(&config.storage.dir));
        Self::new(config, fetcher, notifier, store)
    }

    /// One pass over every configured source.
    pub async fn run_once(&self) -> Result<RunReport> {
        self.run_at(Utc::now()).await
    }

    /// One pass over every configured source, with `now` as the run clock.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunReport> {
        let config = Arc::clone(&self.config);
        self.run_sources(&config.sources, now).await
    }

    /// One pass over the given sources.
    pub async fn run_sources(&self, sources: &[Source], now: DateTime<Utc>) -> Result<RunReport> {
        header(&format!("Checking {} source(s)", sources.len()));

        let mut state = self.store.load_state().await?;
        let mut report = RunReport::new(now);
        let delay = Duration::from_millis(self.config.fetch.request_delay_ms);

        for (i, source) in sources.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            log::info!("Checking {}", source.url);
            let processed = self.process_source(source, &mut state, now).await;

            for document in &processed.dirty {
                if let Err(e) = self.store.save(&state, *document).await {
                    log::error!(
                        "Could not persist {} after processing {}: {}",
                        document,
                        source.url,
                        e
                    );
                    report.persistence_failures += 1;
                }
            }
            log::debug!("{} -> {}", source.url, processed.outcome);
            report.outcomes.push((source.url.clone(), processed.outcome));
        }

        report.log_summary();
        Ok(report)
    }

    async fn process_source(
        &self,
        source: &Source,
        state: &mut MonitorState,
        now: DateTime<Utc>,
    ) -> Processed {
        match fetch_with_retry(self.fetcher.as_ref(), source, &self.config.fetch).await {
            Ok(raw) => self.handle_page(source, &raw, state, now).await,
            Err(e) => self.handle_fetch_failure(source, &e, state, now).await,
        }
    }

    async fn handle_fetch_failure(
        &self,
        source: &Source,
        error: &AppError,
        state: &mut MonitorState,
        now: DateTime<Utc>,
    ) -> Processed {
        log::error!("[FAIL] {}: {}", source.url, error);

        let cooldowns = state.cooldowns.get(&source.url).cloned().unwrap_or_default();
        let record = state.failures.entry(source.url.clone()).or_default();
        let alert_due = self
            .tracker
            .record_failure(record, &cooldowns, &error.to_string(), now);
        let failures = record.count;
        let outage = alert_due.then(|| self.policy.outage(source, record));

        let mut processed = Processed::new(SourceOutcome::FetchFailed {
            failures,
            outage_alerted: false,
        });
        processed.touch(Document::Failures);

        if let Some(notification) = outage {
            log::warn!(
                "{} has failed {} consecutive runs; sending outage alert",
                source.url,
                failures
            );
            if self.deliver(&notification).await {
                state
                    .cooldowns
                    .entry(source.url.clone())
                    .or_default()
                    .record(AlertReason::Unreachable, now);
                processed.touch(Document::Cooldowns);
                processed.outcome = SourceOutcome::FetchFailed {
                    failures,
                    outage_alerted: true,
                };
            }
        }
        processed
    }

    async fn handle_page(
        &self,
        source: &Source,
        raw: &str,
        state: &mut MonitorState,
        now: DateTime<Utc>,
    ) -> Processed {
        let mut processed = Processed::new(SourceOutcome::Unchanged);
        if let Some(record) = state.failures.get_mut(&source.url) {
            if self.tracker.record_success(record) {
                processed.touch(Document::Failures);
            }
        }

        let text = self.normalizer.normalize(raw, source);
        log::debug!(
            "Normalized length for {}: {} (raw {})",
            source.url,
            text.len(),
            raw.len()
        );

        let outcome = match source.mode {
            DiffMode::Identifiers => {
                self.handle_identifiers(source, text, state, now, &mut processed)
                    .await
            }
            DiffMode::Text => self.handle_text(source, text, state, now, &mut processed).await,
        };
        processed.outcome = outcome;
        processed
    }

    async fn handle_identifiers(
        &self,
        source: &Source,
        text: String,
        state: &mut MonitorState,
        now: DateTime<Utc>,
        processed: &mut Processed,
    ) -> SourceOutcome {
        let extraction = self.registry.extract(&text, source);
        log::debug!(
            "{} identifiers on {} via '{}'{}",
            extraction.identifiers.len(),
            source.url,
            extraction.strategy,
            if extraction.used_fallback { " (fallback)" } else { "" }
        );

        let baseline = usable_baseline(state, source);
        if let Err(e) = self
            .guard
            .validate(source, &extraction.identifiers, &text, baseline)
        {
            log::warn!("[ANOMALY] {}; keeping previous baseline", e);
            return SourceOutcome::Anomaly;
        }

        let snapshot = Snapshot::new(text, extraction.identifiers);
        let Some(baseline) = baseline else {
            log::info!(
                "[INIT] Recording {} identifiers for {}",
                snapshot.identifiers.len(),
                source.url
            );
            commit(source, snapshot, state, now, processed);
            return SourceOutcome::Initialized;
        };

        let event = diff_identifiers(&baseline.identifiers, &snapshot.identifiers);
        if event.is_empty() {
            log::info!("[NOCHANGE] {} - same identifiers", source.url);
            if baseline.content_hash != snapshot.content_hash {
                commit(source, snapshot, state, now, processed);
            }
            return SourceOutcome::Unchanged;
        }

        log::info!(
            "[CHANGE] {}: {} identifier(s) changed (+{} / -{})",
            source.url,
            event.change_count(),
            event.added.len(),
            event.removed.len()
        );
        let outcome = self.alert(source, &event, state, now, processed).await;
        commit(source, snapshot, state, now, processed);
        outcome
    }

    async fn handle_text(
        &self,
        source: &Source,
        text: String,
        state: &mut MonitorState,
        now: DateTime<Utc>,
        processed: &mut Processed,
    ) -> SourceOutcome {
        let snapshot = Snapshot::text_only(text);

        let previous = usable_baseline(state, source)
            .zip(state.texts.get(&source.url))
            .map(|(baseline, text)| (baseline.content_hash.clone(), text.as_str()));
        let Some((previous_hash, previous_text)) = previous else {
            log::info!(
                "[INIT] Recording {} chars of text for {}",
                snapshot.text.len(),
                source.url
            );
            commit(source, snapshot, state, now, processed);
            return SourceOutcome::Initialized;
        };

        if previous_hash == snapshot.content_hash {
            log::info!("[NOCHANGE] {}", source.url);
            return SourceOutcome::Unchanged;
        }

        let event = self.differ.diff(previous_text, &snapshot.text);
        let outcome = if event.is_empty() {
            log::info!("[NOCHANGE] {} - only minor changes", source.url);
            SourceOutcome::Updated
        } else {
            log::info!("[CHANGE] {}: text changed", source.url);
            self.alert(source, &event, state, now, processed).await
        };
        commit(source, snapshot, state, now, processed);
        outcome
    }

    /// Apply the alert policy to a change and deliver if allowed.
    async fn alert(
        &self,
        source: &Source,
        event: &ChangeEvent,
        state: &mut MonitorState,
        now: DateTime<Utc>,
        processed: &mut Processed,
    ) -> SourceOutcome {
        let cooldowns = state.cooldowns.get(&source.url).cloned().unwrap_or_default();
        match self.policy.evaluate(source, event, &cooldowns, now) {
            AlertDecision::Quiet => SourceOutcome::Updated,
            AlertDecision::Suppressed(notification) => {
                log::info!(
                    "Alert '{}' suppressed by cooldown (last sent {})",
                    notification.title,
                    cooldowns
                        .last(AlertReason::ContentChange)
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_default()
                );
                SourceOutcome::Suppressed
            }
            AlertDecision::Deliver(notification) => {
                if self.deliver(&notification).await {
                    state
                        .cooldowns
                        .entry(source.url.clone())
                        .or_default()
                        .record(AlertReason::ContentChange, now);
                    processed.touch(Document::Cooldowns);
                    SourceOutcome::Notified
                } else {
                    SourceOutcome::NotifyFailed
                }
            }
        }
    }

    /// Best-effort delivery: failures are logged, never propagated.
    async fn deliver(&self, notification: &Notification) -> bool {
        match self.notifier.deliver(notification).await {
            Ok(()) => true,
            Err(e) => {
                log::error!(
                    "Notification '{}' for {} failed: {}",
                    notification.title,
                    notification.source_url,
                    e
                );
                false
            }
        }
    }
}

/// Baseline for `source`, ignoring one recorded under another diff mode.
fn usable_baseline<'a>(state: &'a MonitorState, source: &Source) -> Option<&'a Baseline> {
    state
        .baselines
        .get(&source.url)
        .filter(|baseline| baseline.mode == source.mode)
}

/// Make `snapshot` the new baseline for `source`.
fn commit(
    source: &Source,
    snapshot: Snapshot,
    state: &mut MonitorState,
    now: DateTime<Utc>,
    processed: &mut Processed,
) {
    state.baselines.insert(
        source.url.clone(),
        Baseline::from_snapshot(&snapshot, source.mode, now),
    );
    state.texts.insert(source.url.clone(), snapshot.text);
    processed.touch(Document::Baselines);
    processed.touch(Document::Texts);
}
