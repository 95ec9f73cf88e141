/// Student model and database operations
///
/// Students are pseudonymized: they are identified by a short random code
/// (unique within the organization) and an optional display name. Every
/// operation here takes the caller's `org_id` and filters by it, so a student
/// from another organization is indistinguishable from a missing one.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE students (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     code TEXT NOT NULL,
///     display_name TEXT NOT NULL DEFAULT '',
///     notes TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (org_id, code)
/// );
/// ```
///
/// # Codes
///
/// Codes are 6 to 8 characters drawn from `ABCDEFGHJKLMNPQRSTUVWXYZ23456789`
/// (no `I`, `O`, `0` or `1`). Generation retries on collision and gives up
/// after [`MAX_CODE_ATTEMPTS`].
///
/// # Example
///
/// ```no_run
/// use phonoplan_shared::models::student::{Student, CreateStudent};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, org_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let code = Student::generate_unique_code(&pool, org_id).await?;
/// let student = Student::create(&pool, CreateStudent {
///     org_id,
///     code,
///     display_name: "Aluno A".to_string(),
///     notes: None,
/// }).await?;
///
/// let found = Student::find_in_org(&pool, org_id, student.id).await?;
/// assert!(found.is_some());
/// # Ok(())
/// # }
/// ```

use std::future::Future;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Alphabet for student codes
pub const CODE_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Shortest generated code
pub const MIN_CODE_LENGTH: usize = 6;

/// Longest generated code
pub const MAX_CODE_LENGTH: usize = 8;

/// Collision retries before giving up
pub const MAX_CODE_ATTEMPTS: usize = 10;

/// Maximum display name length (characters)
pub const MAX_DISPLAY_NAME_LENGTH: u64 = 120;

/// Maximum notes length (characters)
pub const MAX_NOTES_LENGTH: u64 = 2000;

/// Error type for student code generation
#[derive(Debug, thiserror::Error)]
pub enum CodeGenerationError {
    /// Every attempt collided with an existing code
    #[error("Could not generate a unique student code after {0} attempts")]
    Exhausted(usize),

    /// Database error while checking for collisions
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Student record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: Uuid,
    pub org_id: Uuid,
    pub code: String,
    pub display_name: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a student
#[derive(Debug, Clone)]
pub struct CreateStudent {
    pub org_id: Uuid,
    pub code: String,
    pub display_name: String,
    pub notes: Option<String>,
}

/// Partial update; `None` fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateStudent {
    pub display_name: Option<String>,
    pub notes: Option<String>,
}

/// Samples one candidate code
pub fn generate_student_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let length = rng.gen_range(MIN_CODE_LENGTH..=MAX_CODE_LENGTH);

    (0..length)
        .map(|_| CODE_CHARS[rng.gen_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Checks that a code only uses the student code alphabet and length
pub fn is_valid_student_code(code: &str) -> bool {
    (MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&code.len())
        && code.bytes().all(|b| CODE_CHARS.contains(&b))
}

/// Draws codes until `is_taken` reports a free one
///
/// `is_taken` is awaited once per candidate; after [`MAX_CODE_ATTEMPTS`]
/// collisions the search fails with [`CodeGenerationError::Exhausted`].
pub async fn find_unique_code<F, Fut>(mut is_taken: F) -> Result<String, CodeGenerationError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<bool, sqlx::Error>>,
{
    for _ in 0..MAX_CODE_ATTEMPTS {
        let candidate = generate_student_code(&mut rand::thread_rng());

        if !is_taken(candidate.clone()).await? {
            return Ok(candidate);
        }
    }

    Err(CodeGenerationError::Exhausted(MAX_CODE_ATTEMPTS))
}

impl Student {
    /// Generates a code not yet used within the organization
    pub async fn generate_unique_code(
        pool: &PgPool,
        org_id: Uuid,
    ) -> Result<String, CodeGenerationError> {
        find_unique_code(|code| async move { Student::code_exists(pool, org_id, &code).await })
            .await
    }

    /// Checks whether a code is already used within the organization
    pub async fn code_exists(pool: &PgPool, org_id: Uuid, code: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM students WHERE org_id = $1 AND code = $2)",
        )
        .bind(org_id)
        .bind(code)
        .fetch_one(pool)
        .await
    }

    /// Creates a student
    ///
    /// # Errors
    ///
    /// Returns a unique violation if the code was taken concurrently
    pub async fn create(pool: &PgPool, data: CreateStudent) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Student>(
            r#"
            INSERT INTO students (org_id, code, display_name, notes)
            VALUES ($1, $2, $3, $4)
            RETURNING id, org_id, code, display_name, notes, created_at, updated_at
            "#,
        )
        .bind(data.org_id)
        .bind(&data.code)
        .bind(&data.display_name)
        .bind(&data.notes)
        .fetch_one(pool)
        .await
    }

    /// Finds a student by ID within an organization
    pub async fn find_in_org(
        pool: &PgPool,
        org_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Student>(
            r#"
            SELECT id, org_id, code, display_name, notes, created_at, updated_at
            FROM students
            WHERE id = $1 AND org_id = $2
            "#,
        )
        .bind(id)
        .bind(org_id)
        .fetch_optional(pool)
        .await
    }

    /// Lists an organization's students, newest first
    ///
    /// With `search`, keeps students whose code or display name contains the
    /// term, case-insensitively. The term is matched literally (no wildcards).
    pub async fn list_by_org(
        pool: &PgPool,
        org_id: Uuid,
        search: Option<&str>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());

        sqlx::query_as::<_, Student>(
            r#"
            SELECT id, org_id, code, display_name, notes, created_at, updated_at
            FROM students
            WHERE org_id = $1
              AND (
                $2::text IS NULL
                OR STRPOS(LOWER(code), LOWER($2)) > 0
                OR STRPOS(LOWER(display_name), LOWER($2)) > 0
              )
            ORDER BY created_at DESC
            "#,
        )
        .bind(org_id)
        .bind(search)
        .fetch_all(pool)
        .await
    }

    /// Applies a partial update to a student of the organization
    ///
    /// Returns `None` when no such student exists in the organization.
    pub async fn update_in_org(
        pool: &PgPool,
        org_id: Uuid,
        id: Uuid,
        data: UpdateStudent,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Student>(
            r#"
            UPDATE students
            SET display_name = COALESCE($3, display_name),
                notes = COALESCE($4, notes),
                updated_at = NOW()
            WHERE id = $1 AND org_id = $2
            RETURNING id, org_id, code, display_name, notes, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(org_id)
        .bind(data.display_name)
        .bind(data.notes)
        .fetch_optional(pool)
        .await
    }

    /// Deletes a student of the organization (cascades to consents and recordings)
    ///
    /// Returns `true` if a row was deleted.
    pub async fn delete_in_org(pool: &PgPool, org_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1 AND org_id = $2")
            .bind(id)
            .bind(org_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
