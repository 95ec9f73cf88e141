/// Consent model and database operations
///
/// A consent records whether audio capture is allowed for a student and
/// whether recordings may be shared for research. Only the most recent row
/// (by `signed_at`) is authoritative.
///
/// Consents have no `org_id` of their own: callers must check that the student
/// belongs to their organization before reading or writing its consents.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE consents (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     student_id UUID NOT NULL REFERENCES students(id) ON DELETE CASCADE,
///     audio_allowed BOOLEAN NOT NULL DEFAULT FALSE,
///     share_for_research BOOLEAN NOT NULL DEFAULT FALSE,
///     signed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     signed_by_user_id UUID NOT NULL REFERENCES users(id)
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use phonoplan_shared::models::consent::{Consent, ConsentValues};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, student_id: Uuid, admin_id: Uuid) -> Result<(), sqlx::Error> {
/// let values = ConsentValues { audio_allowed: true, share_for_research: false };
/// Consent::upsert(&pool, student_id, values, admin_id).await?;
///
/// let latest = Consent::latest_for_student(&pool, student_id).await?;
/// assert_eq!(latest.map(|c| c.audio_allowed), Some(true));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Consent record
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Consent {
    pub id: Uuid,
    pub student_id: Uuid,
    pub audio_allowed: bool,
    pub share_for_research: bool,
    pub signed_at: DateTime<Utc>,
    pub signed_by_user_id: Uuid,
}

/// The two consent flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentValues {
    pub audio_allowed: bool,
    pub share_for_research: bool,
}

impl Consent {
    /// Returns the authoritative (latest-signed) consent for a student
    pub async fn latest_for_student<'e, E>(
        executor: E,
        student_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Consent>(
            r#"
            SELECT id, student_id, audio_allowed, share_for_research, signed_at, signed_by_user_id
            FROM consents
            WHERE student_id = $1
            ORDER BY signed_at DESC
            LIMIT 1
            "#,
        )
        .bind(student_id)
        .fetch_optional(executor)
        .await
    }

    /// Inserts a new consent row signed now
    pub async fn create<'e, E>(
        executor: E,
        student_id: Uuid,
        values: ConsentValues,
        signed_by: Uuid,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Consent>(
            r#"
            INSERT INTO consents (student_id, audio_allowed, share_for_research, signed_by_user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, student_id, audio_allowed, share_for_research, signed_at, signed_by_user_id
            "#,
        )
        .bind(student_id)
        .bind(values.audio_allowed)
        .bind(values.share_for_research)
        .bind(signed_by)
        .fetch_one(executor)
        .await
    }

    /// Replaces the student's consent values
    ///
    /// Every existing row is overwritten with the new values, signer and
    /// timestamp; if there are none, a first row is inserted. Runs in one
    /// transaction and returns the latest row afterwards.
    pub async fn upsert(
        pool: &PgPool,
        student_id: Uuid,
        values: ConsentValues,
        signed_by: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE consents
            SET audio_allowed = $2,
                share_for_research = $3,
                signed_by_user_id = $4,
                signed_at = NOW()
            WHERE student_id = $1
            "#,
        )
        .bind(student_id)
        .bind(values.audio_allowed)
        .bind(values.share_for_research)
        .bind(signed_by)
        .execute(&mut *tx)
        .await?;

        let consent = if updated.rows_affected() == 0 {
            Consent::create(&mut *tx, student_id, values, signed_by).await?
        } else {
            Consent::latest_for_student(&mut *tx, student_id)
                .await?
                .ok_or(sqlx::Error::RowNotFound)?
        };

        tx.commit().await?;

        Ok(consent)
    }

    /// Whether the latest consent allows audio capture
    pub async fn audio_allowed(pool: &PgPool, student_id: Uuid) -> Result<bool, sqlx::Error> {
        Ok(Consent::latest_for_student(pool, student_id)
            .await?
            .map(|c| c.audio_allowed)
            .unwrap_or(false))
    }

    /// The flags of this consent
    pub fn values(&self) -> ConsentValues {
        ConsentValues {
            audio_allowed: self.audio_allowed,
            share_for_research: self.share_for_research,
        }
    }
}
