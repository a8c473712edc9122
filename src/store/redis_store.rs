//! Redis-backed store.
//!
//! Layout, for the default namespace `proxy`: list `proxy_list` holds keys
//! in insertion order, hash `proxy:<key>` holds the `success`, `failure` and
//! `total` counters, and string `proxy_cursor` holds the rotation cursor.
//! Compound updates run as Lua scripts so each one executes atomically on
//! the server.

use super::{FailureOutcome, ProxyStore};
use crate::config::StoreConfig;
use crate::error::{PoolError, Result};
use crate::proxy::ProxyRecord;

use async_trait::async_trait;
use log::{info, warn};
use redis::aio::MultiplexedConnection;
use redis::{RedisResult, Script};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

const INSERT_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
redis.call('HSET', KEYS[1], 'success', 0, 'failure', 0, 'total', 0)
redis.call('RPUSH', KEYS[2], ARGV[1])
return 1
";

const SUCCESS_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return 0
end
redis.call('HINCRBY', KEYS[1], 'success', 1)
redis.call('HSET', KEYS[1], 'failure', 0)
redis.call('HINCRBY', KEYS[1], 'total', 1)
return 1
";

const FAILURE_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return {-1, 0}
end
local failures = redis.call('HINCRBY', KEYS[1], 'failure', 1)
redis.call('HINCRBY', KEYS[1], 'total', 1)
if failures >= tonumber(ARGV[1]) then
    redis.call('DEL', KEYS[1])
    redis.call('LREM', KEYS[2], 0, ARGV[2])
    return {failures, 1}
end
return {failures, 0}
";

const REMOVE_SCRIPT: &str = r"
local removed = redis.call('DEL', KEYS[1])
redis.call('LREM', KEYS[2], 0, ARGV[1])
return removed
";

const CLEAR_SCRIPT: &str = r"
local members = redis.call('LRANGE', KEYS[1], 0, -1)
for _, member in ipairs(members) do
    redis.call('DEL', ARGV[1] .. member)
end
redis.call('DEL', KEYS[1], KEYS[2])
return #members
";

/// Key names derived from the store namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Keys {
    list: String,
    cursor: String,
    record_prefix: String,
}

impl Keys {
    fn new(namespace: &str) -> Self {
        Self {
            list: format!("{}_list", namespace),
            cursor: format!("{}_cursor", namespace),
            record_prefix: format!("{}:", namespace),
        }
    }

    fn record(&self, key: &str) -> String {
        format!("{}{}", self.record_prefix, key)
    }
}

/// Build a record from its counter hash; an empty hash means the key is gone.
fn record_from_hash(key: &str, fields: &HashMap<String, u64>) -> Option<ProxyRecord> {
    if fields.is_empty() {
        return None;
    }
    let field = |name: &str| fields.get(name).copied().unwrap_or(0);
    Some(ProxyRecord {
        key: key.to_string(),
        success_count: field("success"),
        failure_count: field("failure"),
        total_requests: field("total"),
    })
}

fn failure_outcome(reply: &[i64]) -> Result<Option<FailureOutcome>> {
    match reply {
        [count, _] if *count < 0 => Ok(None),
        [count, evicted] => Ok(Some(FailureOutcome {
            failure_count: *count as u64,
            evicted: *evicted == 1,
        })),
        _ => Err(PoolError::StoreUnavailable(format!(
            "unexpected failure script reply: {:?}",
            reply
        ))),
    }
}

/// Store backed by a remote Redis server.
pub struct RedisStore {
    conn: MultiplexedConnection,
    timeout: Duration,
    keys: Keys,
    insert_script: Script,
    success_script: Script,
    failure_script: Script,
    remove_script: Script,
    clear_script: Script,
}

impl RedisStore {
    /// Connect to the server described by `config` and verify it answers.
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let client = redis::Client::open(config.url())?;
        let conn =
            tokio::time::timeout(config.timeout, client.get_multiplexed_async_connection())
                .await??;

        let store = Self {
            conn,
            timeout: config.timeout,
            keys: Keys::new(&config.namespace),
            insert_script: Script::new(INSERT_SCRIPT),
            success_script: Script::new(SUCCESS_SCRIPT),
            failure_script: Script::new(FAILURE_SCRIPT),
            remove_script: Script::new(REMOVE_SCRIPT),
            clear_script: Script::new(CLEAR_SCRIPT),
        };

        let mut conn = store.conn.clone();
        let pong: String = store.run(redis::cmd("PING").query_async(&mut conn)).await?;
        if pong != "PONG" {
            return Err(PoolError::StoreUnavailable(format!(
                "unexpected PING reply: {}",
                pong
            )));
        }

        let len = store.len().await?;
        if len == 0 {
            info!("Connected to {}; proxy pool is empty", config.url());
        } else {
            info!("Connected to {}; proxy pool holds {} proxies", config.url(), len);
        }
        Ok(store)
    }

    /// Bound a redis call by the configured timeout.
    async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        Ok(tokio::time::timeout(self.timeout, fut).await??)
    }
}

#[async_trait]
impl ProxyStore for RedisStore {
    async fn get_all(&self) -> Result<Vec<ProxyRecord>> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = self
            .run(redis::cmd("LRANGE").arg(&self.keys.list).arg(0).arg(-1).query_async(&mut conn))
            .await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for key in &keys {
            pipe.cmd("HGETALL").arg(self.keys.record(key));
        }
        let hashes: Vec<HashMap<String, u64>> = self.run(pipe.query_async(&mut conn)).await?;

        // Keys evicted between the two round trips come back as empty hashes.
        Ok(keys
            .iter()
            .zip(hashes.iter())
            .filter_map(|(key, fields)| record_from_hash(key, fields))
            .collect())
    }

    async fn get(&self, key: &str) -> Result<Option<ProxyRecord>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, u64> = self
            .run(redis::cmd("HGETALL").arg(self.keys.record(key)).query_async(&mut conn))
            .await?;
        Ok(record_from_hash(key, &fields))
    }

    async fn len(&self) -> Result<usize> {
        let mut conn = self.conn.clone();
        self.run(redis::cmd("LLEN").arg(&self.keys.list).query_async(&mut conn))
            .await
    }

    async fn insert(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let mut invocation = self.insert_script.prepare_invoke();
        invocation.key(self.keys.record(key)).key(&self.keys.list).arg(key);
        let admitted: i64 = self.run(invocation.invoke_async(&mut conn)).await?;
        Ok(admitted == 1)
    }

    async fn record_success(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let mut invocation = self.success_script.prepare_invoke();
        invocation.key(self.keys.record(key));
        let updated: i64 = self.run(invocation.invoke_async(&mut conn)).await?;
        Ok(updated == 1)
    }

    async fn record_failure(&self, key: &str, threshold: u32) -> Result<Option<FailureOutcome>> {
        let mut conn = self.conn.clone();
        let mut invocation = self.failure_script.prepare_invoke();
        invocation
            .key(self.keys.record(key))
            .key(&self.keys.list)
            .arg(threshold)
            .arg(key);
        let reply: Vec<i64> = self.run(invocation.invoke_async(&mut conn)).await?;
        failure_outcome(&reply)
    }

    async fn remove(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let mut invocation = self.remove_script.prepare_invoke();
        invocation.key(self.keys.record(key)).key(&self.keys.list).arg(key);
        let removed: i64 = self.run(invocation.invoke_async(&mut conn)).await?;
        Ok(removed > 0)
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let mut invocation = self.clear_script.prepare_invoke();
        invocation.key(&self.keys.list).key(&self.keys.cursor).arg(&self.keys.record_prefix);
        let cleared: i64 = self.run(invocation.invoke_async(&mut conn)).await?;
        if cleared > 0 {
            warn!("Cleared {} proxies from store", cleared);
        }
        Ok(())
    }

    async fn cursor(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let cursor: Option<u64> = self
            .run(redis::cmd("GET").arg(&self.keys.cursor).query_async(&mut conn))
            .await?;
        Ok(cursor.unwrap_or(0))
    }

    async fn advance_cursor(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let next: i64 = self
            .run(redis::cmd("INCR").arg(&self.keys.cursor).query_async(&mut conn))
            .await?;
        Ok((next - 1).max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_namespace_keys() {
        let keys = Keys::new("proxy");
        assert_eq!(keys.list, "proxy_list");
        assert_eq!(keys.cursor, "proxy_cursor");
        assert_eq!(keys.record("u:p@1.2.3.4:80"), "proxy:u:p@1.2.3.4:80");
    }

    #[test]
    fn test_custom_namespace_keys() {
        let keys = Keys::new("staging");
        assert_eq!(keys.list, "staging_list");
        assert_eq!(keys.record("a:1"), "staging:a:1");
    }

    #[test]
    fn test_record_from_hash() {
        let fields = HashMap::from([
            ("success".to_string(), 4),
            ("failure".to_string(), 1),
            ("total".to_string(), 7),
        ]);
        let record = record_from_hash("a:1", &fields).unwrap();
        assert_eq!(record.success_count, 4);
        assert_eq!(record.failure_count, 1);
        assert_eq!(record.total_requests, 7);

        assert!(record_from_hash("a:1", &HashMap::new()).is_none());
    }

    #[test]
    fn test_failure_outcome_decoding() {
        assert_eq!(failure_outcome(&[-1, 0]).unwrap(), None);
        assert_eq!(
            failure_outcome(&[3, 1]).unwrap(),
            Some(FailureOutcome { failure_count: 3, evicted: true })
        );
        assert_eq!(
            failure_outcome(&[1, 0]).unwrap(),
            Some(FailureOutcome { failure_count: 1, evicted: false })
        );
        assert!(matches!(failure_outcome(&[]), Err(PoolError::StoreUnavailable(_))));
    }
}
