/// Membership model and database operations
///
/// A membership joins a user to an organization with a role. A user can hold
/// memberships in several organizations; sessions act in the *first* one
/// (oldest `created_at`).
///
/// # Schema
///
/// ```sql
/// CREATE TYPE membership_role AS ENUM ('ADMIN', 'TEACHER');
///
/// CREATE TABLE memberships (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role membership_role NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (org_id, user_id)
/// );
/// ```
///
/// # Roles
///
/// - **ADMIN**: Manages students, consents and plan generation
/// - **TEACHER**: Reads students and plans, records audio
///
/// # Example
///
/// ```no_run
/// use phonoplan_shared::models::membership::{Membership, CreateMembership, Role};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, org_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
/// Membership::create(&pool, CreateMembership { org_id, user_id, role: Role::Teacher }).await?;
///
/// let first = Membership::first_for_user(&pool, user_id).await?;
/// assert!(first.is_some());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use std::fmt;
use uuid::Uuid;

/// Roles a user can hold within an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "membership_role", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Teacher,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Teacher => "TEACHER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Membership model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    pub id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a membership
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMembership {
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
}

impl Membership {
    /// Creates a membership
    ///
    /// Accepts any executor so registration can run it inside its transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the (org, user) pair already exists or a foreign key
    /// is missing
    pub async fn create<'e, E>(executor: E, data: CreateMembership) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (org_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING id, org_id, user_id, role, created_at
            "#,
        )
        .bind(data.org_id)
        .bind(data.user_id)
        .bind(data.role)
        .fetch_one(executor)
        .await
    }

    /// Finds the user's first membership, ordered by creation time
    ///
    /// This is the organization a session acts in.
    pub async fn first_for_user(
        pool: &PgPool,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Membership>(
            r#"
            SELECT id, org_id, user_id, role, created_at
            FROM memberships
            WHERE user_id = $1
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Gets the user's role in an organization
    pub async fn get_role(
        pool: &PgPool,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Role>, sqlx::Error> {
        sqlx::query_scalar::<_, Role>(
            r#"
            SELECT role FROM memberships
            WHERE org_id = $1 AND user_id = $2
            "#,
        )
        .bind(org_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// Lists every membership of a user, oldest first
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Membership>(
            r#"
            SELECT id, org_id, user_id, role, created_at
            FROM memberships
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }
}
