// src/services/notifier.rs

//! Push notification delivery.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Request};

use crate::error::{AppError, Result};
use crate::models::{Notification, NotifyConfig};
use crate::utils::ascii_header;
use crate::utils::http::create_notify_client;

/// Delivers formatted notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// ntfy-style topic publisher: body is the message, metadata goes in headers.
pub struct NtfyNotifier {
    endpoint: String,
    client: Client,
    max_retries: u32,
    retry_backoff: Duration,
}

impl NtfyNotifier {
    pub fn new(endpoint: impl Into<String>, config: &NotifyConfig) -> Result<Self> {
        Ok(Self {
            endpoint: endpoint.into(),
            client: create_notify_client(config)?,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(500),
        })
    }

    /// Build the publish request for `notification`.
    pub fn build_request(&self, notification: &Notification) -> Result<Request> {
        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Title", ascii_header(&notification.title))
            .header("Priority", notification.priority.as_header())
            .body(notification.body.clone());

        if !notification.tags.is_empty() {
            builder = builder.header("Tags", notification.tags.join(","));
        }
        if let Some(click) = &notification.click {
            builder = builder.header("Click", ascii_header(click));
        }
        Ok(builder.build()?)
    }

    async fn send_once(&self, notification: &Notification) -> Result<()> {
        let request = self.build_request(notification)?;
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| AppError::notify(e.status().map(|s| s.as_u16()), e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::notify(
                Some(status.as_u16()),
                format!("{status}: {}", text.trim()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for NtfyNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        let mut attempt: u32 = 0;
        loop {
            match self.send_once(notification).await {
                Ok(()) => {
                    log::info!("Notification sent for {}", notification.source_url);
                    return Ok(());
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.retry_backoff * (1u32 << (attempt - 1).min(16));
                    log::warn!(
                        "Notification attempt {} for {} failed: {}. Retrying in {:?}",
                        attempt,
                        notification.source_url,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Dry-run notifier used when no endpoint is configured.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn deliver(&self, notification: &Notification) -> Result<()> {
        log::info!(
            "[DRY RUN] {} (priority {}, tags {})\n{}",
            notification.title,
            notification.priority.as_header(),
            notification.tags.join(","),
            notification.body
        );
        Ok(())
    }
}
