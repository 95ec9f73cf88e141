//! # PhonoPlan Shared Library
//!
//! Types, persistence, and policy logic shared by the PhonoPlan API server.
//!
//! ## Module Organization
//!
//! - `auth`: Password hashing, session tokens, session context, role gate
//! - `config`: Deployment environment shared by the policy components
//! - `db`: Connection pool and migrations
//! - `models`: Database models (organizations, users, students, consents, recordings, plans)
//! - `media`: Allow-listed audio MIME types
//! - `plans`: Activity plan schema and AI plan generation
//! - `rate_limit`: Fixed-window request rate limiter
//! - `redis`: Redis client used by the shared rate-limit backend
//! - `storage`: Signed URL broker (S3 and local development providers)
//! - `validation`: Flattening of `validator` errors into field errors

pub mod auth;
pub mod config;
pub mod db;
pub mod media;
pub mod models;
pub mod plans;
pub mod rate_limit;
pub mod redis;
pub mod storage;
pub mod validation;

/// Current version of the PhonoPlan shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
