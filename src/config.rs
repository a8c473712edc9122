//! Configuration for the proxy pool.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Strategy for selecting a proxy from the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Select the proxy with the highest success rate.
    #[default]
    Smart,
    /// Select a uniformly random proxy.
    Random,
    /// Select proxies in round-robin order.
    Sequential,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Smart => "smart",
            Self::Random => "random",
            Self::Sequential => "sequential",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "smart" => Ok(Self::Smart),
            "random" => Ok(Self::Random),
            "sequential" | "round_robin" | "round-robin" => Ok(Self::Sequential),
            other => Err(format!("unknown selection strategy: {}", other)),
        }
    }
}

/// Connection parameters for the backing key-value store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub db: i64,
    /// Upper bound for a single store operation.
    pub timeout: Duration,
    /// Prefix for every key the store writes.
    pub namespace: String,
}

impl StoreConfig {
    /// Connection URL understood by the redis client.
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.db)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            db: 0,
            timeout: Duration::from_secs(5),
            namespace: "proxy".to_string(),
        }
    }
}

/// Configuration for the pool manager.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// API key for the proxy listing service.
    pub api_key: Option<String>,
    /// Maximum number of proxies requested per fetch.
    pub amount: usize,
    /// Consecutive failures after which a proxy is evicted.
    pub fail_threshold: u32,
    /// Strategy for selecting proxies.
    pub strategy: Strategy,
    /// Backing store connection parameters.
    pub store: StoreConfig,
    /// Extra attempts the middleware makes with a different proxy.
    pub retry_count: usize,
}

impl ManagerConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ManagerConfigBuilder {
        ManagerConfigBuilder::new()
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfigBuilder::new().build()
    }
}

/// Builder for `ManagerConfig`.
pub struct ManagerConfigBuilder {
    api_key: Option<String>,
    amount: Option<usize>,
    fail_threshold: Option<u32>,
    strategy: Option<Strategy>,
    store: Option<StoreConfig>,
    retry_count: Option<usize>,
}

impl ManagerConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            api_key: None,
            amount: None,
            fail_threshold: None,
            strategy: None,
            store: None,
            retry_count: None,
        }
    }

    /// Set the API key used by the proxy source.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the number of proxies to request per fetch.
    pub fn amount(mut self, amount: usize) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Set the consecutive-failure threshold for eviction.
    pub fn fail_threshold(mut self, threshold: u32) -> Self {
        self.fail_threshold = Some(threshold);
        self
    }

    /// Set the strategy for selecting proxies.
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Set the backing store connection parameters.
    pub fn store(mut self, store: StoreConfig) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the number of extra attempts the middleware makes.
    pub fn retry_count(mut self, count: usize) -> Self {
        self.retry_count = Some(count);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ManagerConfig {
        ManagerConfig {
            api_key: self.api_key,
            amount: self.amount.unwrap_or(100).max(1),
            fail_threshold: self.fail_threshold.unwrap_or(3).max(1),
            strategy: self.strategy.unwrap_or_default(),
            store: self.store.unwrap_or_default(),
            retry_count: self.retry_count.unwrap_or(0),
        }
    }
}

impl Default for ManagerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
