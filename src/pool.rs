//! Core proxy pool implementation.

use crate::config::ManagerConfig;
use crate::error::{PoolError, Result};
use crate::proxy::{FormattedProxy, ProxyEndpoint};
use crate::source::{ProxySource, WebshareSource};
use crate::stats::PoolStats;
use crate::store::{FailureOutcome, ProxyStore};
use crate::strategy::{create_selector, SelectionStrategy};

use log::{debug, info, warn};
use std::sync::Arc;

/// Manages a pool of proxies held in a store.
///
/// The manager owns no pool state itself: every operation reads or updates
/// the store, so several managers may share one store.
pub struct PoolManager {
    store: Arc<dyn ProxyStore>,
    source: Arc<dyn ProxySource>,
    selector: Box<dyn SelectionStrategy>,
    /// Configuration for the pool.
    pub config: ManagerConfig,
}

impl PoolManager {
    /// Create a manager over `store`, fetching new proxies from `source`.
    pub fn new(
        config: ManagerConfig,
        store: Arc<dyn ProxyStore>,
        source: Arc<dyn ProxySource>,
    ) -> Self {
        Self {
            selector: create_selector(config.strategy),
            store,
            source,
            config,
        }
    }

    /// Create a manager that fetches from Webshare.io using `config.api_key`.
    pub fn with_webshare(config: ManagerConfig, store: Arc<dyn ProxyStore>) -> Self {
        let source = Arc::new(WebshareSource::new(config.api_key.clone()));
        Self::new(config, store, source)
    }

    /// Connect to the configured Redis store and fetch from Webshare.io.
    #[cfg(feature = "redis")]
    pub async fn connect(config: ManagerConfig) -> Result<Self> {
        let store = crate::store::RedisStore::connect(&config.store).await?;
        Ok(Self::with_webshare(config, Arc::new(store)))
    }

    /// Load proxies if the pool is empty. Returns the number admitted.
    pub async fn initialize(&self) -> Result<usize> {
        let len = self.store.len().await?;
        if len > 0 {
            debug!("Proxy pool already holds {} proxies; skipping fetch", len);
            return Ok(0);
        }
        self.load().await
    }

    /// Clear the pool and load a fresh batch. Returns the number admitted.
    ///
    /// The pool stays empty if the fetch fails.
    pub async fn update(&self) -> Result<usize> {
        self.store.clear().await?;
        info!("Proxy pool cleared; fetching a fresh batch");
        self.load().await
    }

    async fn load(&self) -> Result<usize> {
        let mut batch = self.source.fetch_batch(self.config.amount).await?;
        batch.truncate(self.config.amount);
        if batch.is_empty() {
            warn!("Proxy source returned no entries");
            return Ok(0);
        }

        let mut admitted = 0;
        let mut duplicates = 0;
        let mut malformed = 0;
        for raw in &batch {
            let endpoint = match ProxyEndpoint::parse_raw(raw) {
                Ok(endpoint) => endpoint,
                Err(e) => {
                    warn!("Skipping proxy entry: {}", e);
                    malformed += 1;
                    continue;
                }
            };
            if self.store.insert(&endpoint.key()).await? {
                admitted += 1;
            } else {
                duplicates += 1;
            }
        }

        if admitted == 0 && malformed == batch.len() && self.store.is_empty().await? {
            return Err(PoolError::SourceUnavailable(format!(
                "all {} fetched entries were malformed",
                malformed
            )));
        }

        info!(
            "Loaded {} proxies ({} duplicates, {} malformed)",
            admitted, duplicates, malformed
        );
        Ok(admitted)
    }

    /// Select a proxy according to the configured strategy.
    pub async fn select_proxy(&self) -> Result<ProxyEndpoint> {
        let records = self.store.get_all().await?;
        if records.is_empty() {
            return Err(PoolError::PoolEmpty);
        }

        let cursor = if self.selector.uses_cursor() {
            self.store.advance_cursor().await?
        } else {
            0
        };

        let record = self
            .selector
            .select(&records, cursor)
            .ok_or(PoolError::PoolEmpty)?;
        debug!(
            "Selected proxy {} via {} strategy",
            record.key,
            self.selector.name()
        );
        record.endpoint()
    }

    /// Select a proxy and format it as scheme-keyed URLs.
    pub async fn get_formatted_proxy(&self) -> Result<FormattedProxy> {
        Ok(self.select_proxy().await?.formatted())
    }

    /// Report a successful request through a proxy.
    ///
    /// Unknown keys are ignored; the proxy may already have been evicted.
    pub async fn report_success(&self, key: &str) -> Result<()> {
        if !self.store.record_success(key).await? {
            debug!("Success reported for unknown proxy {}", key);
        }
        Ok(())
    }

    /// Report a failed request through a proxy, evicting it once its
    /// consecutive failures reach the threshold.
    ///
    /// Returns `None` if the key is not in the pool.
    pub async fn report_failure(&self, key: &str) -> Result<Option<FailureOutcome>> {
        let outcome = self
            .store
            .record_failure(key, self.config.fail_threshold)
            .await?;
        match outcome {
            Some(FailureOutcome { evicted: true, failure_count }) => {
                warn!(
                    "Proxy {} evicted after {} consecutive failures",
                    key, failure_count
                );
            }
            Some(_) => {}
            None => debug!("Failure reported for unknown proxy {}", key),
        }
        Ok(outcome)
    }

    /// Remove a proxy from the pool regardless of its counters.
    ///
    /// Returns `false` if the key was not in the pool.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let removed = self.store.remove(key).await?;
        if removed {
            info!("Proxy {} removed from pool", key);
        }
        Ok(removed)
    }

    /// Get statistics about the proxy pool.
    pub async fn get_stats(&self) -> Result<PoolStats> {
        let records = self.store.get_all().await?;
        Ok(PoolStats::from_records(&records, self.config.fail_threshold))
    }

    /// Number of proxies in the pool.
    pub async fn len(&self) -> Result<usize> {
        self.store.len().await
    }

    pub fn store(&self) -> &Arc<dyn ProxyStore> {
        &self.store
    }
}
