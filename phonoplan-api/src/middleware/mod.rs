/// Middleware modules for the API server
///
/// - `security`: security response headers
/// - `rate_limit`: per-route request limits
///
/// Session handling lives in `phonoplan_shared::auth::middleware`.

pub mod rate_limit;
pub mod security;
