// src/models/mod.rs

//! Domain models for the monitor.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod change;
mod config;
mod snapshot;
mod source;
mod state;

// Re-export all public types
pub use change::{AlertReason, ChangeEvent, Notification, Priority};
pub use config::{
    AlertConfig, Config, DiffConfig, FetchConfig, LoggingConfig, NormalizeConfig, NotifyConfig,
    GENERIC_STRATEGY, PatternConfig, SanityConfig, StorageConfig, StrategyConfig, ValidityConfig,
};
pub use snapshot::{Baseline, Snapshot, content_hash};
pub use source::{ContentWindow, DiffMode, FetchStrategy, Source};
pub use state::{CooldownRecord, FailureRecord};
