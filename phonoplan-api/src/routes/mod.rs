/// API route handlers
///
/// Handlers are grouped by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login and current session
/// - `students`: Student records
/// - `consent`: Per-student audio consent
/// - `recordings`: Recording metadata
/// - `storage`: Signed upload and download URLs
/// - `plans`: AI-generated activity plans
/// - `local_storage`: Development object store behind locally signed URLs

pub mod auth;
pub mod consent;
pub mod health;
pub mod local_storage;
pub mod plans;
pub mod recordings;
pub mod storage;
pub mod students;
