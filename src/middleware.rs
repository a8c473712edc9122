//! Middleware implementation for reqwest.

use crate::error::PoolError;
use crate::pool::PoolManager;

use anyhow::anyhow;
use async_trait::async_trait;
use log::{info, warn};
use reqwest_middleware::{Error, Middleware, Next, Result};
use std::sync::Arc;
use std::time::Duration;

/// Middleware that routes each request through a proxy from the pool and
/// reports the outcome back to it.
#[derive(Clone)]
pub struct ProxyPoolMiddleware {
    manager: Arc<PoolManager>,
    timeout: Duration,
}

impl ProxyPoolMiddleware {
    /// Wrap an initialized pool manager.
    pub fn new(manager: Arc<PoolManager>) -> Self {
        Self {
            manager,
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the per-request timeout of the proxied client.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn report_failure(&self, key: &str) -> Result<()> {
        self.manager
            .report_failure(key)
            .await
            .map(|_| ())
            .map_err(|e| Error::Middleware(anyhow!(e)))
    }
}

#[async_trait]
impl Middleware for ProxyPoolMiddleware {
    async fn handle(
        &self,
        req: reqwest::Request,
        _extensions: &mut http::Extensions,
        _next: Next<'_>,
    ) -> Result<reqwest::Response> {
        let max_retries = self.manager.config.retry_count;
        let mut retry_count = 0;

        loop {
            let proxy = match self.manager.select_proxy().await {
                Ok(proxy) => proxy,
                Err(PoolError::PoolEmpty) => {
                    warn!("No proxy available for {}", req.url());
                    return Err(Error::Middleware(anyhow!(PoolError::PoolEmpty)));
                }
                Err(e) => return Err(Error::Middleware(anyhow!(e))),
            };
            let key = proxy.key();

            let proxied_request = req.try_clone().ok_or_else(|| {
                Error::Middleware(anyhow!(
                    "Request object is not cloneable. Are you passing a streaming body?"
                        .to_string()
                ))
            })?;

            info!("Using proxy: {} (attempt {})", proxy, retry_count + 1);

            let client = match proxy.to_reqwest_proxy().and_then(|p| {
                reqwest::Client::builder()
                    .proxy(p)
                    .timeout(self.timeout)
                    .build()
            }) {
                Ok(client) => client,
                Err(e) => {
                    warn!("Failed to build client with proxy {}: {}", proxy, e);
                    self.report_failure(&key).await?;
                    retry_count += 1;
                    if retry_count > max_retries {
                        return Err(Error::Reqwest(e));
                    }
                    continue;
                }
            };

            match client.execute(proxied_request).await {
                Ok(response) => {
                    self.manager
                        .report_success(&key)
                        .await
                        .map_err(|e| Error::Middleware(anyhow!(e)))?;
                    return Ok(response);
                }
                Err(err) => {
                    warn!(
                        "Request failed with proxy {} (attempt {}): {}",
                        proxy,
                        retry_count + 1,
                        err
                    );
                    self.report_failure(&key).await?;

                    retry_count += 1;
                    if retry_count > max_retries {
                        return Err(Error::Reqwest(err));
                    }
                }
            }
        }
    }
}
