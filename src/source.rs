//! Sources of raw proxy entries.
//!
//! A raw entry has the form `host:port:username:password`; parsing into a
//! pool key happens during admission, not here.

use crate::error::{PoolError, Result};

use async_trait::async_trait;
use futures::future;
use log::{info, warn};
use parking_lot::RwLock;
use reqwest::Client;
use serde::Deserialize;

/// Fetches batches of raw proxy entries.
#[async_trait]
pub trait ProxySource: Send + Sync {
    /// Fetch up to `count` raw entries.
    async fn fetch_batch(&self, count: usize) -> Result<Vec<String>>;
}

const WEBSHARE_URL: &str = "https://proxy.webshare.io";

/// Proxy list from the Webshare.io API.
pub struct WebshareSource {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct WebshareList {
    results: Vec<WebshareProxy>,
}

#[derive(Debug, Deserialize)]
struct WebshareProxy {
    username: String,
    password: String,
    proxy_address: Option<String>,
    port: u16,
    #[serde(default = "default_valid")]
    valid: bool,
}

fn default_valid() -> bool {
    true
}

impl WebshareList {
    fn into_raw_entries(self) -> Vec<String> {
        self.results
            .into_iter()
            .filter(|p| p.valid)
            .filter_map(|p| {
                let host = p.proxy_address?;
                Some(format!("{}:{}:{}:{}", host, p.port, p.username, p.password))
            })
            .collect()
    }
}

impl WebshareSource {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: WEBSHARE_URL.to_string(),
        }
    }

    /// Point the source at a different API host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ProxySource for WebshareSource {
    async fn fetch_batch(&self, count: usize) -> Result<Vec<String>> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| PoolError::SourceUnavailable("API key is not set".to_string()))?;

        let url = format!("{}/api/v2/proxy/list/", self.base_url);
        let page_size = count.to_string();
        let response = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, format!("Token {}", api_key))
            .query(&[("mode", "direct"), ("page", "1"), ("page_size", page_size.as_str())])
            .send()
            .await
            .map_err(|e| PoolError::SourceUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PoolError::SourceUnavailable(format!(
                "failed to fetch proxies: {}",
                status
            )));
        }

        let list: WebshareList = response
            .json()
            .await
            .map_err(|e| PoolError::SourceUnavailable(format!("unexpected response: {}", e)))?;

        let mut entries = list.into_raw_entries();
        entries.truncate(count);
        info!("Fetched {} proxies from Webshare.io", entries.len());
        Ok(entries)
    }
}

/// Plain-text proxy lists from URLs or local files.
pub struct ListSource {
    sources: Vec<String>,
    client: Client,
}

impl ListSource {
    pub fn new(sources: Vec<impl Into<String>>) -> Self {
        Self {
            sources: sources.into_iter().map(Into::into).collect(),
            client: Client::new(),
        }
    }

    async fn fetch_one(&self, source: &str) -> Result<Vec<String>> {
        let content = if source.starts_with("http") {
            let response = self
                .client
                .get(source)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| PoolError::SourceUnavailable(e.to_string()))?;
            response
                .text()
                .await
                .map_err(|e| PoolError::SourceUnavailable(e.to_string()))?
        } else {
            tokio::fs::read_to_string(source)
                .await
                .map_err(|e| PoolError::SourceUnavailable(format!("{}: {}", source, e)))?
        };
        Ok(parse_proxy_list(&content))
    }
}

#[async_trait]
impl ProxySource for ListSource {
    async fn fetch_batch(&self, count: usize) -> Result<Vec<String>> {
        let results =
            future::join_all(self.sources.iter().map(|source| self.fetch_one(source))).await;

        let mut entries = Vec::new();
        let mut failed = 0;
        for (source, result) in self.sources.iter().zip(results) {
            match result {
                Ok(list) => {
                    info!("Fetched {} proxies from {}", list.len(), source);
                    entries.extend(list);
                }
                Err(e) => {
                    warn!("Failed to fetch proxies from {}: {}", source, e);
                    failed += 1;
                }
            }
        }

        if failed > 0 && failed == self.sources.len() {
            return Err(PoolError::SourceUnavailable(
                "all proxy list sources failed".to_string(),
            ));
        }
        entries.truncate(count);
        Ok(entries)
    }
}

/// Parse one raw entry per line, skipping blanks and `#` comments.
pub(crate) fn parse_proxy_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Fixed in-memory list of raw entries.
#[derive(Default)]
pub struct StaticSource {
    entries: RwLock<Vec<String>>,
}

impl StaticSource {
    pub fn new(entries: Vec<impl Into<String>>) -> Self {
        Self {
            entries: RwLock::new(entries.into_iter().map(Into::into).collect()),
        }
    }

    /// Replace the entries served by later fetches.
    pub fn set_entries(&self, entries: Vec<impl Into<String>>) {
        *self.entries.write() = entries.into_iter().map(Into::into).collect();
    }
}

#[async_trait]
impl ProxySource for StaticSource {
    async fn fetch_batch(&self, count: usize) -> Result<Vec<String>> {
        Ok(self.entries.read().iter().take(count).cloned().collect())
    }
}
