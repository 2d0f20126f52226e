//! Durable monitor state.
//!
//! Four independent JSON documents, each keyed by source URL:
//!
//! ```text
//! state/
//! ├── baselines.json         # identifiers, content hash, mode, timestamp
//! ├── page_texts.json        # normalized text (text-diff mode, debugging)
//! ├── failures.json          # consecutive failure counters
//! └── alert_cooldowns.json   # last delivered alert per reason
//! ```
//!
//! Every document is replaced atomically, so a reader sees either the old or
//! the new version, never a mix.

pub mod local;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Baseline, CooldownRecord, FailureRecord};

pub use local::LocalStorage;

/// One persisted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Document {
    Baselines,
    Texts,
    Failures,
    Cooldowns,
}

impl Document {
    pub fn file_name(&self) -> &'static str {
        match self {
            Document::Baselines => "baselines.json",
            Document::Texts => "page_texts.json",
            Document::Failures => "failures.json",
            Document::Cooldowns => "alert_cooldowns.json",
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// All state, loaded once at the start of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorState {
    pub baselines: BTreeMap<String, Baseline>,
    pub texts: BTreeMap<String, String>,
    pub failures: BTreeMap<String, FailureRecord>,
    pub cooldowns: BTreeMap<String, CooldownRecord>,
}

/// Storage backend for monitor state.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load every document. Missing or unreadable documents come back empty.
    async fn load_state(&self) -> Result<MonitorState>;

    /// Atomically replace one document with its current contents in `state`.
    async fn save(&self, state: &MonitorState, document: Document) -> Result<()>;
}
