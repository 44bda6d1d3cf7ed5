//! Redis-backed cache store.
//!
//! Uses a multiplexed [`ConnectionManager`], which reconnects on its own and
//! is cheap to clone, so every command works on its own handle and no lock
//! is held across awaits.

use async_trait::async_trait;
use flowsync_core::StoreError;
use redis::aio::ConnectionManager;

use super::key::{CacheKey, KeyPrefix};
use super::traits::{CacheStore, StoreResult};

/// Default number of keys requested per `SCAN` round trip.
pub const DEFAULT_SCAN_COUNT: usize = 100;

/// Redis connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    /// Full connection URL; takes precedence over host/port/password.
    pub url: Option<String>,
    /// Hint passed to `SCAN COUNT` when listing keys.
    pub scan_count: usize,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            url: None,
            scan_count: DEFAULT_SCAN_COUNT,
        }
    }
}

impl RedisConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// The URL handed to the Redis client.
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        match &self.password {
            Some(password) => format!(
                "redis://:{}@{}:{}",
                urlencoding::encode(password),
                self.host,
                self.port
            ),
            None => format!("redis://{}:{}", self.host, self.port),
        }
    }

    /// Connection URL with the password masked, for logs.
    pub fn redacted_url(&self) -> String {
        match (&self.url, &self.password) {
            (Some(_), _) => "redis://<configured url>".to_string(),
            (None, Some(_)) => format!("redis://:***@{}:{}", self.host, self.port),
            (None, None) => format!("redis://{}:{}", self.host, self.port),
        }
    }
}

/// [`CacheStore`] over a Redis server.
#[derive(Clone)]
pub struct RedisCacheStore {
    manager: ConnectionManager,
    scan_count: usize,
}

impl RedisCacheStore {
    /// Open a client and establish the managed connection.
    pub async fn connect(config: &RedisConfig) -> StoreResult<Self> {
        tracing::info!(url = %config.redacted_url(), "Connecting to Redis");

        let client = redis::Client::open(config.connection_url()).map_err(|e| {
            StoreError::Connection {
                reason: format!("invalid Redis configuration: {}", e),
            }
        })?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| StoreError::Connection {
                reason: e.to_string(),
            })?;

        tracing::info!("Connected to Redis");
        Ok(Self {
            manager,
            scan_count: config.scan_count.max(1),
        })
    }
}

fn command_error(command: &'static str, key: &str, err: redis::RedisError) -> StoreError {
    if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
        StoreError::Connection {
            reason: format!("{} {}: {}", command, key, err),
        }
    } else {
        StoreError::Command {
            command,
            key: key.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Escape glob metacharacters so a prefix is matched literally by `SCAN MATCH`.
fn glob_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &CacheKey) -> StoreResult<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(key.as_str())
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("GET", key.as_str(), e))?;
        Ok(value)
    }

    async fn set(&self, key: &CacheKey, value: String) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        let reply: String = redis::cmd("SET")
            .arg(key.as_str())
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("SET", key.as_str(), e))?;

        if reply != "OK" {
            return Err(StoreError::UnexpectedReply {
                command: "SET",
                key: key.to_string(),
                reply,
            });
        }
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> StoreResult<u64> {
        let mut conn = self.manager.clone();
        let removed: u64 = redis::cmd("DEL")
            .arg(key.as_str())
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("DEL", key.as_str(), e))?;
        Ok(removed)
    }

    async fn delete_many(&self, keys: &[CacheKey]) -> StoreResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let raw: Vec<&str> = keys.iter().map(CacheKey::as_str).collect();
        let mut conn = self.manager.clone();
        let removed: u64 = redis::cmd("DEL")
            .arg(&raw)
            .query_async(&mut conn)
            .await
            .map_err(|e| command_error("DEL", &format!("{} keys", raw.len()), e))?;
        Ok(removed)
    }

    async fn list_keys(&self, prefix: &KeyPrefix) -> StoreResult<Vec<CacheKey>> {
        let pattern = format!("{}*", glob_escape(prefix.as_str()));
        let mut conn = self.manager.clone();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(self.scan_count)
                .query_async(&mut conn)
                .await
                .map_err(|e| command_error("SCAN", prefix.as_str(), e))?;

            keys.extend(batch.into_iter().map(CacheKey::from_stored));
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once across iterations.
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redis_config_default() {
        let config = RedisConfig::default();
        assert_eq!(config.connection_url(), "redis://127.0.0.1:6379");
        assert_eq!(config.scan_count, DEFAULT_SCAN_COUNT);
    }

    #[test]
    fn test_redis_config_password_is_encoded() {
        let config = RedisConfig::new("cache", 6380).with_password("p@ss:word");
        assert_eq!(config.connection_url(), "redis://:p%40ss%3Aword@cache:6380");
        assert_eq!(config.redacted_url(), "redis://:***@cache:6380");
    }

    #[test]
    fn test_redis_config_url_wins() {
        let config = RedisConfig::new("ignored", 1)
            .with_password("ignored")
            .with_url("redis://other:6379/2");
        assert_eq!(config.connection_url(), "redis://other:6379/2");
        assert!(!config.redacted_url().contains("other"));
    }

    #[test]
    fn test_glob_escape() {
        assert_eq!(glob_escape("1:"), "1:");
        assert_eq!(glob_escape("a*b?[c]\\:"), "a\\*b\\?\\[c\\]\\\\:");
    }
}
