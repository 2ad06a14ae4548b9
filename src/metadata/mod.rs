//! Page metadata: fetch a remote page and summarize it for display next to a
//! stored link.

pub mod cache;
pub mod extract;
pub mod favicon;

#[cfg(test)]
mod tests;

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::backend::MetadataSource;
use crate::model::normalize_url_input;

pub use cache::MetadataCache;
pub use extract::extract_metadata;

pub const METADATA_USER_AGENT: &str = "Mozilla/5.0 (compatible; UrllistBot/1.0; +https://urlist.com)";

/// Statuses answered with a hostname-only summary instead of an error.
const HARD_FAILURE_STATUSES: [StatusCode; 3] = [
    StatusCode::BAD_REQUEST,
    StatusCode::FORBIDDEN,
    StatusCode::INTERNAL_SERVER_ERROR,
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UrlMetadata {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub favicon: Option<String>,
    #[serde(default)]
    pub site_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UrlMetadata {
    pub fn fallback(target: &Url, status: StatusCode) -> Self {
        let hostname = extract::hostname(target);
        Self {
            title: Some(hostname.clone()),
            description: None,
            image: None,
            favicon: None,
            site_name: Some(hostname),
            error: Some(format!("No metadata available (HTTP {})", status.as_u16())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataOutcome {
    Extracted(UrlMetadata),
    /// The page refused us with one of the hard-failure statuses.
    Fallback(UrlMetadata),
    Failed(String),
}

impl MetadataOutcome {
    /// Failures read as "nothing known about this page".
    pub fn into_metadata(self) -> UrlMetadata {
        match self {
            MetadataOutcome::Extracted(metadata) | MetadataOutcome::Fallback(metadata) => metadata,
            MetadataOutcome::Failed(_) => UrlMetadata::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_html_bytes: usize,
    pub retries: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(4),
            max_html_bytes: 1_500_000,
            retries: 1,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build metadata http client: {0}")]
    Client(#[from] reqwest::Error),
}

enum PageBody {
    Markup(String),
    /// Fetched fine but nothing worth parsing (non-HTML or oversized).
    Empty,
    HardFailure(StatusCode),
}

#[derive(Debug, Clone)]
pub struct MetadataFetcher {
    client: reqwest::Client,
    max_html_bytes: usize,
    retries: usize,
}

impl MetadataFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(8))
            .timeout(settings.timeout)
            .connect_timeout(settings.connect_timeout)
            .user_agent(METADATA_USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            max_html_bytes: settings.max_html_bytes,
            retries: settings.retries,
        })
    }

    /// Never fails: every error path resolves to an outcome.
    pub async fn fetch(&self, target: &Url) -> MetadataOutcome {
        match self.fetch_page_html(target).await {
            Ok(PageBody::Markup(html)) => MetadataOutcome::Extracted(extract_metadata(&html, target)),
            Ok(PageBody::Empty) => MetadataOutcome::Extracted(extract_metadata("", target)),
            Ok(PageBody::HardFailure(status)) => {
                debug!("metadata fallback for {} (status {})", target, status);
                MetadataOutcome::Fallback(UrlMetadata::fallback(target, status))
            }
            Err(message) => {
                warn!("metadata fetch failed for {}: {}", target, message);
                MetadataOutcome::Failed(message)
            }
        }
    }

    async fn fetch_page_html(&self, target: &Url) -> Result<PageBody, String> {
        let mut last_error: Option<String> = None;

        for attempt in 1..=(self.retries + 1) {
            let response_result = self
                .client
                .get(target.clone())
                .header(ACCEPT, "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
                .send()
                .await;

            let response = match response_result {
                Ok(response) => response,
                Err(err) => {
                    let message = format!("request failed (attempt {}): {}", attempt, err);
                    debug!("{} for {}", message, target);
                    last_error = Some(message);
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                if HARD_FAILURE_STATUSES.contains(&status) {
                    return Ok(PageBody::HardFailure(status));
                }
                return Err(format!("Failed to fetch URL: {}", status));
            }

            if let Some(content_length) = response.content_length() {
                if content_length as usize > self.max_html_bytes {
                    debug!(
                        "html skipped due to content-length {} > {} for {}",
                        content_length, self.max_html_bytes, target
                    );
                    return Ok(PageBody::Empty);
                }
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.to_ascii_lowercase());
            let is_html = content_type
                .as_deref()
                .map(|value| value.contains("text/html") || value.contains("application/xhtml"))
                .unwrap_or(true);
            if !is_html {
                debug!("non-html content type {:?} for {}", content_type, target);
                return Ok(PageBody::Empty);
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|err| format!("failed to read response body: {}", err))?;
            if bytes.len() > self.max_html_bytes {
                debug!(
                    "html exceeded max size after download {} > {} for {}",
                    bytes.len(),
                    self.max_html_bytes,
                    target
                );
                return Ok(PageBody::Empty);
            }

            return Ok(PageBody::Markup(String::from_utf8_lossy(&bytes).into_owned()));
        }

        Err(last_error.unwrap_or_else(|| "request failed".to_string()))
    }
}

impl MetadataSource for MetadataFetcher {
    async fn fetch_metadata(&self, address: &str) -> UrlMetadata {
        match normalize_url_input(address) {
            Ok(target) => self.fetch(&target).await.into_metadata(),
            Err(err) => {
                debug!("skipping metadata for {:?}: {}", address, err);
                UrlMetadata::default()
            }
        }
    }
}
