// src/lib.rs

//! Listing change monitor library.
//!
//! Fetches housing listing pages, extracts stable listing identifiers,
//! diffs them against a persisted baseline and pushes alerts when listings
//! appear or disappear.

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
