/// Recording model and database operations
///
/// A recording points at an audio object in storage. The row itself only holds
/// metadata; the bytes live under `storage_key`, which always starts with
/// `org/{org_id}/students/{student_id}/recordings/` and ends with the extension
/// of `mime_type`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE recordings (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     student_id UUID NOT NULL REFERENCES students(id) ON DELETE CASCADE,
///     created_by_user_id UUID NOT NULL REFERENCES users(id),
///     storage_key TEXT NOT NULL UNIQUE,
///     mime_type TEXT NOT NULL,
///     duration_ms INTEGER CHECK (duration_ms IS NULL OR duration_ms > 0),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::media::AudioMimeType;

/// Recording metadata
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    pub id: Uuid,
    pub org_id: Uuid,
    pub student_id: Uuid,
    pub created_by_user_id: Uuid,
    pub storage_key: String,
    pub mime_type: String,
    pub duration_ms: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a recording
#[derive(Debug, Clone)]
pub struct CreateRecording {
    pub org_id: Uuid,
    pub student_id: Uuid,
    pub created_by_user_id: Uuid,
    pub storage_key: String,
    pub mime_type: AudioMimeType,
    pub duration_ms: Option<i32>,
}

/// Filters for listing recordings; `None` means unfiltered
#[derive(Debug, Clone, Default)]
pub struct RecordingFilter {
    pub student_id: Option<Uuid>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

/// Student summary embedded in recording listings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingStudent {
    pub id: Uuid,
    pub code: String,
    pub display_name: String,
}

/// Creator summary embedded in recording and plan listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatorSummary {
    pub id: Uuid,
    pub email: String,
}

/// Recording joined with its student and creator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingListItem {
    #[serde(flatten)]
    pub recording: Recording,
    pub student: RecordingStudent,
    pub created_by: CreatorSummary,
}

#[derive(sqlx::FromRow)]
struct RecordingListRow {
    id: Uuid,
    org_id: Uuid,
    student_id: Uuid,
    created_by_user_id: Uuid,
    storage_key: String,
    mime_type: String,
    duration_ms: Option<i32>,
    created_at: DateTime<Utc>,
    student_code: String,
    student_display_name: String,
    creator_email: String,
}

impl From<RecordingListRow> for RecordingListItem {
    fn from(row: RecordingListRow) -> Self {
        RecordingListItem {
            student: RecordingStudent {
                id: row.student_id,
                code: row.student_code,
                display_name: row.student_display_name,
            },
            created_by: CreatorSummary {
                id: row.created_by_user_id,
                email: row.creator_email,
            },
            recording: Recording {
                id: row.id,
                org_id: row.org_id,
                student_id: row.student_id,
                created_by_user_id: row.created_by_user_id,
                storage_key: row.storage_key,
                mime_type: row.mime_type,
                duration_ms: row.duration_ms,
                created_at: row.created_at,
            },
        }
    }
}

impl Recording {
    /// Creates a recording
    pub async fn create(pool: &PgPool, data: CreateRecording) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Recording>(
            r#"
            INSERT INTO recordings (org_id, student_id, created_by_user_id, storage_key, mime_type, duration_ms)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, org_id, student_id, created_by_user_id, storage_key, mime_type, duration_ms, created_at
            "#,
        )
        .bind(data.org_id)
        .bind(data.student_id)
        .bind(data.created_by_user_id)
        .bind(&data.storage_key)
        .bind(data.mime_type.as_str())
        .bind(data.duration_ms)
        .fetch_one(pool)
        .await
    }

    /// Finds a recording of the organization by its storage key
    pub async fn find_by_key_in_org(
        pool: &PgPool,
        org_id: Uuid,
        storage_key: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Recording>(
            r#"
            SELECT id, org_id, student_id, created_by_user_id, storage_key, mime_type, duration_ms, created_at
            FROM recordings
            WHERE org_id = $1 AND storage_key = $2
            "#,
        )
        .bind(org_id)
        .bind(storage_key)
        .fetch_optional(pool)
        .await
    }

    /// Lists the organization's recordings, newest first, with student and creator
    ///
    /// `created_from` and `created_to` are inclusive bounds on `created_at`.
    pub async fn list_by_org(
        pool: &PgPool,
        org_id: Uuid,
        filter: &RecordingFilter,
    ) -> Result<Vec<RecordingListItem>, sqlx::Error> {
        let rows = sqlx::query_as::<_, RecordingListRow>(
            r#"
            SELECT r.id, r.org_id, r.student_id, r.created_by_user_id, r.storage_key,
                   r.mime_type, r.duration_ms, r.created_at,
                   s.code AS student_code,
                   s.display_name AS student_display_name,
                   u.email AS creator_email
            FROM recordings r
            JOIN students s ON s.id = r.student_id
            JOIN users u ON u.id = r.created_by_user_id
            WHERE r.org_id = $1
              AND ($2::uuid IS NULL OR r.student_id = $2)
              AND ($3::timestamptz IS NULL OR r.created_at >= $3)
              AND ($4::timestamptz IS NULL OR r.created_at <= $4)
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(org_id)
        .bind(filter.student_id)
        .bind(filter.created_from)
        .bind(filter.created_to)
        .fetch_all(pool)
        .await?;

        Ok(rows.into_iter().map(RecordingListItem::from).collect())
    }
}
