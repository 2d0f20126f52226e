// src/services/fetch.rs

//! Page fetching.
//!
//! Turns a [`Source`] into HTML-stripped text, either with a plain GET or
//! through a headless-render service. Everything downstream only sees
//! "text or failure".

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use scraper::Html;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{FetchConfig, FetchStrategy, Source};
use crate::utils::http::create_async_client;

/// Elements whose text never reaches the normalizer.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg"];

/// Request body for a headless-render `/content` call.
fn render_payload(config: &FetchConfig, url: &str) -> serde_json::Value {
    json!({
        "url": url,
        "gotoOptions": {
            "waitUntil": "networkidle2",
            "timeout": config.timeout_secs.saturating_mul(1_000),
        },
        "waitForSelector": { "selector": "body", "timeout": 5_000 },
        "waitForTimeout": config.render_settle_ms,
    })
}

/// Source of page text.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `source` and return its visible text, one text node per line.
    async fn fetch(&self, source: &Source) -> Result<String>;
}

/// HTTP fetcher backed by `reqwest`.
pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            config: config.clone(),
        })
    }

    async fn get_html(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(url, format!("HTTP {status}")));
        }
        Ok(response.text().await?)
    }

    async fn render_html(&self, endpoint: &str, url: &str) -> Result<String> {
        let payload = render_payload(&self.config, url);

        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&payload)?)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(url, format!("render service returned {status}")));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, source: &Source) -> Result<String> {
        let html = match (source.fetch, self.config.render_endpoint.as_deref()) {
            (FetchStrategy::Rendered, Some(endpoint)) => {
                self.render_html(endpoint, &source.url).await?
            }
            (FetchStrategy::Rendered, None) => {
                log::warn!(
                    "No render endpoint configured; fetching {} without rendering",
                    source.url
                );
                self.get_html(&source.url).await?
            }
            (FetchStrategy::Plain, _) => self.get_html(&source.url).await?,
        };

        let text = html_to_text(&html);
        log::debug!("Raw text length for {}: {}", source.url, text.len());
        check_content(&text, &self.config).map_err(|reason| AppError::fetch(&source.url, reason))?;
        Ok(text)
    }
}

/// Visible text of an HTML document, one text node per line.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|e| SKIPPED_ELEMENTS.contains(&e.name()))
        });
        if hidden {
            continue;
        }
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed);
        }
    }

    lines.join("\n")
}

/// Reject block pages and near-empty responses.
pub fn check_content(text: &str, config: &FetchConfig) -> std::result::Result<(), String> {
    let length = text.trim().chars().count();
    if length < config.min_content_chars {
        return Err(format!("very short content ({length} chars)"));
    }

    let lower = text.to_lowercase();
    if let Some(marker) = config
        .blocked_markers
        .iter()
        .find(|m| lower.contains(&m.to_lowercase()))
    {
        return Err(format!("blocked content detected ('{marker}')"));
    }
    Ok(())
}

/// Fetch with bounded, exponentially backed-off retries.
///
/// Only transient errors are retried; the last error is returned once the
/// retry budget is spent.
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    source: &Source,
    config: &FetchConfig,
) -> Result<String> {
    let mut attempt: u32 = 0;
    loop {
        match fetcher.fetch(source).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_transient() && attempt < config.max_retries => {
                attempt += 1;
                let delay = config.backoff(attempt);
                log::warn!(
                    "Fetch attempt {} for {} failed: {}. Retrying in {:?}",
                    attempt,
                    source.url,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
