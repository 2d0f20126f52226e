// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use crate::error::Result;
use crate::models::{FetchConfig, NotifyConfig};

/// Create the client used for page fetches.
pub fn create_async_client(config: &FetchConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(config.timeout())
        .build()?;
    Ok(client)
}

/// Create the client used for notification delivery.
pub fn create_notify_client(config: &NotifyConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}
