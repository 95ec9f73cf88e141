/// Redis integration
///
/// Only the connection wrapper lives here. The rate limiter in
/// [`crate::rate_limit`] runs its fixed-window script through it.

pub mod client;

pub use client::{RedisClient, RedisClientError, RedisConfig};
