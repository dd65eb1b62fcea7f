//! HTTP client for CityIO endpoints.

use crate::error::GfaError;
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Options for the fetcher.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Whether to show a spinner while waiting.
    pub show_progress: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            token: None,
            show_progress: false,
        }
    }
}

/// A raw grid document and where it came from.
#[derive(Debug, Clone)]
pub struct FetchedGrid {
    pub source: String,
    pub document: Value,
    pub fetched_at: DateTime<Utc>,
}

/// Header and grid of a CityIO table.
#[derive(Debug, Clone)]
pub struct CityIoTable {
    pub header: Value,
    pub grid: FetchedGrid,
}

/// Reads grid snapshots over HTTP.
pub struct GridFetcher {
    options: FetchOptions,
    http_client: reqwest::Client,
}

impl GridFetcher {
    /// Create a fetcher with the given options.
    pub fn new(options: FetchOptions) -> Result<Self, GfaError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(ref token) = options.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| GfaError::Config("token contains invalid characters".to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .default_headers(headers)
            .build()
            .map_err(|e| GfaError::Network(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            options,
            http_client,
        })
    }

    /// GET a grid document from `endpoint`.
    pub async fn fetch_grid(&self, endpoint: &str) -> Result<FetchedGrid, GfaError> {
        let document = self.get_json(endpoint).await?;
        Ok(FetchedGrid {
            source: endpoint.to_string(),
            document,
            fetched_at: Utc::now(),
        })
    }

    /// GET `<base>/header` and `<base>/grid` of a CityIO table.
    pub async fn fetch_cityio(&self, base: &str) -> Result<CityIoTable, GfaError> {
        let base = base.trim_end_matches('/');
        let header = self.get_json(&format!("{}/header", base)).await?;
        let grid = self.fetch_grid(&format!("{}/grid", base)).await?;
        Ok(CityIoTable { header, grid })
    }

    /// POST `body` as JSON to `url`.
    pub async fn post_json<T: Serialize>(&self, url: &str, body: &T) -> Result<(), GfaError> {
        let spinner = self.spinner(format!("Posting to {}", url));
        let result = self.http_client.post(url).json(body).send().await;
        spinner.finish_and_clear();

        let response = result.map_err(|e| self.map_send_error(url, e))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GfaError::Network(format!(
                "POST {} returned {}: {}",
                url, status, body
            )));
        }

        info!("Posted summary to {} ({})", url, response.status());
        Ok(())
    }

    async fn get_json(&self, url: &str) -> Result<Value, GfaError> {
        debug!("GET {}", url);
        let spinner = self.spinner(format!("Fetching {}", url));
        let result = self.http_client.get(url).send().await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                spinner.finish_and_clear();
                return Err(self.map_send_error(url, e));
            }
        };

        if !response.status().is_success() {
            spinner.finish_and_clear();
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GfaError::Network(format!(
                "GET {} returned {}: {}",
                url, status, body
            )));
        }

        let bytes = response.bytes().await;
        spinner.finish_and_clear();
        let bytes = bytes.map_err(|e| {
            GfaError::Network(format!("failed to read response from {}: {}", url, e))
        })?;

        serde_json::from_slice(&bytes)
            .map_err(|e| GfaError::Parse(format!("response from {} is not JSON: {}", url, e)))
    }

    fn map_send_error(&self, url: &str, e: reqwest::Error) -> GfaError {
        if e.is_timeout() {
            GfaError::Network(format!(
                "request to {} timed out after {}s",
                url, self.options.timeout_seconds
            ))
        } else if e.is_connect() {
            GfaError::Network(format!("cannot connect to {}", url))
        } else {
            GfaError::Network(format!("request to {} failed: {}", url, e))
        }
    }

    fn spinner(&self, message: String) -> ProgressBar {
        if !self.options.show_progress {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }
}
