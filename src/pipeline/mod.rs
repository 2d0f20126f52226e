//! Change-detection pipeline.
//!
//! - `diff`: identifier-set and text diffs
//! - `sanity`: refuses implausible identifier sets
//! - `failure`: consecutive-failure tracking
//! - `alert`: alert policy and cooldown gate
//! - `monitor`: per-run orchestration

pub mod alert;
pub mod diff;
pub mod failure;
pub mod monitor;
pub mod sanity;

pub use alert::{AlertDecision, AlertPolicy, CooldownGate};
pub use diff::{TextDiffer, diff_identifiers};
pub use failure::FailureTracker;
pub use monitor::{Monitor, RunReport, SourceOutcome};
pub use sanity::{SanityGuard, SanityResult};
