/// Redis client wrapper
///
/// Redis is optional for PhonoPlan: it backs the shared rate-limit counters
/// when `REDIS_URL` is set. The wrapper handles:
/// - Connection management via `redis::aio::ConnectionManager` (reconnects automatically)
/// - Health checks (PING with a timeout)
/// - Configuration from environment variables
///
/// # Example
///
/// ```no_run
/// use phonoplan_shared::redis::client::{RedisClient, RedisConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// if let Some(config) = RedisConfig::from_env() {
///     let client = RedisClient::new(config).await?;
///     println!("Redis healthy: {}", client.ping().await?);
/// }
/// # Ok(())
/// # }
/// ```

use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Redis client errors
#[derive(Error, Debug)]
pub enum RedisClientError {
    #[error("Redis connection error: {0}")]
    ConnectionError(String),

    #[error("Redis command error: {0}")]
    CommandError(String),

    #[error("Redis configuration error: {0}")]
    ConfigError(String),

    #[error("Redis health check failed: {0}")]
    HealthCheckFailed(String),
}

impl From<RedisError> for RedisClientError {
    fn from(err: RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::IoError => {
                RedisClientError::ConnectionError(format!("IO error: {}", err))
            }
            redis::ErrorKind::ResponseError => {
                RedisClientError::CommandError(format!("Response error: {}", err))
            }
            _ => RedisClientError::CommandError(err.to_string()),
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Format: redis://[username:password@]host:port[/db]
    pub url: String,

    pub connection_timeout_secs: u64,

    /// Upper bound for a single command (rate-limit script, PING)
    pub command_timeout_secs: u64,
}

impl RedisConfig {
    /// Configuration for `url` with default timeouts (5 s connect, 2 s command)
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection_timeout_secs: 5,
            command_timeout_secs: 2,
        }
    }

    /// Reads the Redis variables
    ///
    /// # Environment Variables
    ///
    /// - `REDIS_URL`: connection URL; `None` is returned when unset or empty
    /// - `REDIS_CONNECTION_TIMEOUT_SECS`: default 5
    /// - `REDIS_COMMAND_TIMEOUT_SECS`: default 2
    pub fn from_env() -> Option<Self> {
        let url = env::var("REDIS_URL").ok().filter(|u| !u.trim().is_empty())?;
        let mut config = Self::from_url(url);

        if let Some(secs) = env::var("REDIS_CONNECTION_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()) {
            config.connection_timeout_secs = secs;
        }
        if let Some(secs) = env::var("REDIS_COMMAND_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()) {
            config.command_timeout_secs = secs;
        }

        Some(config)
    }
}

/// Cloneable Redis handle
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
    config: Arc<RedisConfig>,
}

impl RedisClient {
    /// Connects to Redis
    ///
    /// # Errors
    ///
    /// - `ConfigError` if the URL is invalid
    /// - `ConnectionError` if the connection fails or times out
    pub async fn new(config: RedisConfig) -> Result<Self, RedisClientError> {
        let client = Client::open(config.url.as_str()).map_err(|e| {
            RedisClientError::ConfigError(format!("Invalid Redis URL: {}", e))
        })?;

        let manager = tokio::time::timeout(
            Duration::from_secs(config.connection_timeout_secs),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| RedisClientError::ConnectionError("Connection timed out".to_string()))?
        .map_err(|e| {
            RedisClientError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        tracing::info!(
            "Redis client connected successfully to {}",
            sanitize_url(&config.url)
        );

        Ok(Self {
            manager,
            config: Arc::new(config),
        })
    }

    /// Sends PING; `true` on PONG
    pub async fn ping(&self) -> Result<bool, RedisClientError> {
        let mut conn = self.manager.clone();

        let result: Result<String, RedisError> = tokio::time::timeout(
            Duration::from_secs(self.config.command_timeout_secs),
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| {
            RedisClientError::HealthCheckFailed("PING command timed out".to_string())
        })?;

        match result {
            Ok(pong) if pong == "PONG" => Ok(true),
            Ok(other) => {
                tracing::warn!("Redis health check: unexpected response: {}", other);
                Ok(false)
            }
            Err(e) => Err(RedisClientError::HealthCheckFailed(e.to_string())),
        }
    }

    /// Connection handle; reconnection is handled by the manager
    pub fn get_connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// URL with credentials masked, for logs
    pub fn display_url(&self) -> String {
        sanitize_url(&self.config.url)
    }
}

/// Replaces `username:password` with `***:***`
pub fn sanitize_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end + 3];
            let host = &url[at_pos + 1..];
            return format!("{}***:***@{}", scheme, host);
        }
    }
    url.to_string()
}
