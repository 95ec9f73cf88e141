/// Fixed-window request rate limiting
///
/// Requests are counted per `{policy.identifier}:{client_id}` key in fixed
/// windows. The first request of a window starts it (`count = 1`, expiry
/// `now + window`); later requests in the same window increment the count
/// until it reaches `max_requests`, after which requests are rejected until
/// the window expires. An expired window is replaced cleanly, never carried
/// over.
///
/// # Backends
///
/// - **Redis** (optional): one Lua script does GET / SET PX / PTTL / INCR, so
///   check-and-increment is atomic across API processes. Keys are
///   `ratelimit:{identifier}:{client_id}`.
/// - **Memory**: a map owned by the [`RateLimiter`]. Used when Redis is not
///   configured, and for any request where the Redis call fails (the failure
///   is logged at `warn` and never blocks the request).
///
/// # Policies
///
/// | policy | identifier | max | window |
/// |---|---|---|---|
/// | [`RateLimitPolicy::LOGIN`] | `auth/login` | 10 | 10 min |
/// | [`RateLimitPolicy::REGISTER`] | `auth/register` | 5 | 30 min |
/// | [`RateLimitPolicy::PLAN_GENERATION`] | `plans/generate` | 8 | 15 min |
///
/// # Example
///
/// ```
/// use phonoplan_shared::rate_limit::{RateLimiter, RateLimitPolicy, RateLimitOutcome};
///
/// # async fn example() {
/// let limiter = RateLimiter::memory_only();
/// let outcome = limiter.check("203.0.113.7", &RateLimitPolicy::LOGIN).await;
/// assert!(matches!(outcome, RateLimitOutcome::Allowed { remaining: 9, .. }));
/// # }
/// ```

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::redis::{RedisClient, RedisClientError};

/// Requests allowed per window when a policy does not say
pub const DEFAULT_MAX_REQUESTS: u32 = 5;

/// Window length when a policy does not say
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

const FIXED_WINDOW_SCRIPT: &str = r#"
local key = KEYS[1]
local window = tonumber(ARGV[1])
local max_requests = tonumber(ARGV[2])
local current = redis.call("GET", key)

if not current then
  redis.call("SET", key, 1, "PX", window)
  return {1, window, 0}
end

current = tonumber(current)
local ttl = redis.call("PTTL", key)

if current >= max_requests then
  return {current, ttl, 1}
end

current = redis.call("INCR", key)
ttl = redis.call("PTTL", key)
return {current, ttl, 0}
"#;

/// A named limit: at most `max_requests` per `window` per client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Resource name, first half of the counter key
    pub identifier: &'static str,
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    /// Login attempts: 10 per 10 minutes
    pub const LOGIN: RateLimitPolicy = RateLimitPolicy {
        identifier: "auth/login",
        max_requests: 10,
        window: Duration::from_secs(10 * 60),
    };

    /// Account registration: 5 per 30 minutes
    pub const REGISTER: RateLimitPolicy = RateLimitPolicy {
        identifier: "auth/register",
        max_requests: 5,
        window: Duration::from_secs(30 * 60),
    };

    /// AI plan generation: 8 per 15 minutes
    pub const PLAN_GENERATION: RateLimitPolicy = RateLimitPolicy {
        identifier: "plans/generate",
        max_requests: 8,
        window: Duration::from_secs(15 * 60),
    };

    /// A policy with the default limit and window
    pub const fn new(identifier: &'static str) -> Self {
        Self {
            identifier,
            max_requests: DEFAULT_MAX_REQUESTS,
            window: DEFAULT_WINDOW,
        }
    }

    pub const fn with_max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests;
        self
    }

    pub const fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Counter key for a client
    pub fn key_for(&self, client_id: &str) -> String {
        format!("{}:{}", self.identifier, client_id)
    }

    fn window_ms(&self) -> u64 {
        self.window.as_millis() as u64
    }
}

/// Result of counting one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitOutcome {
    /// Request may proceed
    Allowed {
        limit: u32,
        remaining: u32,
        /// Window end, unix seconds
        reset_at: u64,
    },

    /// Request must be refused with 429
    Rejected {
        /// Whole seconds until the window ends, at least 1
        retry_after_secs: u64,
        limit: u32,
        /// Window end, unix seconds
        reset_at: u64,
    },
}

impl RateLimitOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitOutcome::Allowed { .. })
    }

    fn from_counts(count: u64, ttl_ms: u64, limited: bool, policy: &RateLimitPolicy, now_ms: u64) -> Self {
        let reset_at = (now_ms + ttl_ms).div_ceil(1000);

        if limited {
            RateLimitOutcome::Rejected {
                retry_after_secs: ttl_ms.div_ceil(1000).max(1),
                limit: policy.max_requests,
                reset_at,
            }
        } else {
            RateLimitOutcome::Allowed {
                limit: policy.max_requests,
                remaining: (policy.max_requests as u64).saturating_sub(count) as u32,
                reset_at,
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u64,
    expires_at_ms: u64,
}

/// Tracked keys above which expired windows are dropped before a new insert
pub const MEMORY_PRUNE_THRESHOLD: usize = 10_000;

/// In-process fixed-window counters
#[derive(Debug, Default)]
pub struct MemoryRateLimitStore {
    entries: Mutex<HashMap<String, WindowEntry>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one request for `key` at `now_ms` (unix milliseconds)
    pub fn hit(&self, key: &str, policy: &RateLimitPolicy, now_ms: u64) -> RateLimitOutcome {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        match entries.get_mut(key) {
            Some(entry) if entry.expires_at_ms > now_ms => {
                let ttl_ms = entry.expires_at_ms - now_ms;

                if entry.count >= policy.max_requests as u64 {
                    return RateLimitOutcome::from_counts(entry.count, ttl_ms, true, policy, now_ms);
                }

                entry.count += 1;
                RateLimitOutcome::from_counts(entry.count, ttl_ms, false, policy, now_ms)
            }
            _ => {
                if entries.len() >= MEMORY_PRUNE_THRESHOLD {
                    entries.retain(|_, entry| entry.expires_at_ms > now_ms);
                }

                let entry = WindowEntry {
                    count: 1,
                    expires_at_ms: now_ms + policy.window_ms(),
                };
                entries.insert(key.to_string(), entry);
                RateLimitOutcome::from_counts(1, policy.window_ms(), false, policy, now_ms)
            }
        }
    }

    /// Number of tracked keys (expired windows linger until the next prune)
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets every window
    pub fn reset(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

/// Rate limiter with an optional Redis backend and an in-memory fallback
pub struct RateLimiter {
    memory: MemoryRateLimitStore,
    redis: Option<RedisClient>,
    script: redis::Script,
}

impl RateLimiter {
    pub fn new(redis: Option<RedisClient>) -> Self {
        Self {
            memory: MemoryRateLimitStore::new(),
            redis,
            script: redis::Script::new(FIXED_WINDOW_SCRIPT),
        }
    }

    /// A limiter that only counts in memory
    pub fn memory_only() -> Self {
        Self::new(None)
    }

    pub fn has_shared_backend(&self) -> bool {
        self.redis.is_some()
    }

    /// Counts one request from `client_id` against `policy`
    pub async fn check(&self, client_id: &str, policy: &RateLimitPolicy) -> RateLimitOutcome {
        let key = policy.key_for(client_id);

        if let Some(redis) = &self.redis {
            match self.check_redis(redis, &key, policy).await {
                Ok(outcome) => return outcome,
                Err(e) => {
                    tracing::warn!(error = %e, key = %key, "Redis rate limit failed, using in-memory fallback");
                }
            }
        }

        self.memory.hit(&key, policy, now_ms())
    }

    async fn check_redis(
        &self,
        redis: &RedisClient,
        key: &str,
        policy: &RateLimitPolicy,
    ) -> Result<RateLimitOutcome, RedisClientError> {
        let mut conn = redis.get_connection();
        let timeout = Duration::from_secs(redis.config().command_timeout_secs);

        let mut invocation = self.script.key(format!("ratelimit:{}", key));
        invocation.arg(policy.window_ms()).arg(policy.max_requests);

        let (count, ttl_ms, limited) =
            tokio::time::timeout(timeout, invocation.invoke_async::<_, (i64, i64, i64)>(&mut conn))
            .await
            .map_err(|_| RedisClientError::CommandError("rate limit script timed out".to_string()))??;

        let effective_ttl_ms = if ttl_ms > 0 { ttl_ms as u64 } else { policy.window_ms() };

        Ok(RateLimitOutcome::from_counts(
            count.max(0) as u64,
            effective_ttl_ms,
            limited == 1,
            policy,
            now_ms(),
        ))
    }

    /// Clears the in-memory windows
    pub fn reset(&self) {
        self.memory.reset();
    }

    pub fn memory_store(&self) -> &MemoryRateLimitStore {
        &self.memory
    }
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
