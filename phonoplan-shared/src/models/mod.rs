/// Database models for PhonoPlan
///
/// Each model exposes its CRUD operations as associated async functions over a
/// `PgPool` (or any `PgExecutor` where the operation takes part in a
/// transaction).
///
/// # Models
///
/// - `account`: Registration (organization + user + ADMIN membership)
/// - `organization`: Tenants
/// - `user`: User accounts
/// - `membership`: User-organization links with a role
/// - `student`: Pseudonymized students
/// - `consent`: Audio/research consent records
/// - `recording`: Audio recording metadata
/// - `plan`: Saved AI-generated activity plans
///
/// Every student, recording and plan query takes the caller's organization id;
/// records of other organizations are never returned.

pub mod account;
pub mod consent;
pub mod membership;
pub mod organization;
pub mod plan;
pub mod recording;
pub mod student;
pub mod user;
