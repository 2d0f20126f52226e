//! Service layer for the monitor.
//!
//! - Page fetching (`HttpFetcher`)
//! - Text canonicalization (`Normalizer`)
//! - Listing identifier extraction (`ExtractorRegistry`)
//! - Push delivery (`NtfyNotifier`, `LogNotifier`)

pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod notifier;

pub use extract::{Extraction, ExtractionStrategy, ExtractorRegistry};
pub use fetch::{Fetcher, HttpFetcher, fetch_with_retry};
pub use normalize::{Normalizer, looks_listing_like};
pub use notifier::{LogNotifier, Notifier, NtfyNotifier};
