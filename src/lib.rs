//! # proxyman
//!
//! A rotating pool of HTTP proxies backed by a key-value store.
//!
//! Proxies are fetched from a listing service, selected per request by a
//! pluggable strategy (smart, random or sequential), and evicted once they
//! fail too many times in a row. A reqwest middleware is provided that
//! drives the whole cycle for each request.

pub mod config;
pub mod error;
pub mod middleware;
pub mod pool;
pub mod proxy;
pub mod source;
pub mod stats;
pub mod store;
pub mod strategy;

pub use config::{ManagerConfig, ManagerConfigBuilder, StoreConfig, Strategy};
pub use error::{PoolError, Result};
pub use middleware::ProxyPoolMiddleware;
pub use pool::PoolManager;
pub use proxy::{FormattedProxy, ProxyEndpoint, ProxyRecord};
pub use source::{ListSource, ProxySource, StaticSource, WebshareSource};
pub use stats::{PoolStats, ProxyDetail};
pub use store::{FailureOutcome, MemoryStore, ProxyStore};
#[cfg(feature = "redis")]
pub use store::RedisStore;
pub use strategy::SelectionStrategy;
