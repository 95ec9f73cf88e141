/// Plan model and database operations
///
/// A plan is an AI-generated activity plan saved for an organization. The
/// generation input (objectives and accessibility needs) is kept in
/// `needs_json`; the validated activity plan returned by the provider is kept
/// verbatim in `plan_json`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE plans (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES organizations(id) ON DELETE CASCADE,
///     created_by_user_id UUID NOT NULL REFERENCES users(id),
///     target_ipa TEXT NOT NULL,
///     age_or_grade TEXT NOT NULL,
///     needs_json JSONB NOT NULL,
///     plan_json JSONB NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use super::recording::CreatorSummary;

/// Saved activity plan
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: Uuid,
    pub org_id: Uuid,
    pub created_by_user_id: Uuid,
    pub target_ipa: String,
    pub age_or_grade: String,
    pub needs_json: JsonValue,
    pub plan_json: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Input for saving a plan
#[derive(Debug, Clone)]
pub struct CreatePlan {
    pub org_id: Uuid,
    pub created_by_user_id: Uuid,
    pub target_ipa: String,
    pub age_or_grade: String,
    pub needs_json: JsonValue,
    pub plan_json: JsonValue,
}

/// Plan with its creator, as listed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanListItem {
    #[serde(flatten)]
    pub plan: Plan,
    pub created_by: CreatorSummary,
}

#[derive(sqlx::FromRow)]
struct PlanListRow {
    #[sqlx(flatten)]
    plan: Plan,
    creator_email: String,
}

impl Plan {
    /// Saves a plan
    pub async fn create(pool: &PgPool, data: CreatePlan) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Plan>(
            r#"
            INSERT INTO plans (org_id, created_by_user_id, target_ipa, age_or_grade, needs_json, plan_json)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, org_id, created_by_user_id, target_ipa, age_or_grade, needs_json, plan_json, created_at
            "#,
        )
        .bind(data.org_id)
        .bind(data.created_by_user_id)
        .bind(&data.target_ipa)
        .bind(&data.age_or_grade)
        .bind(&data.needs_json)
        .bind(&data.plan_json)
        .fetch_one(pool)
        .await
    }

    /// Lists the organization's plans, newest first, with their creator
    pub async fn list_by_org(pool: &PgPool, org_id: Uuid) -> Result<Vec<PlanListItem>, sqlx::Error> {
        let rows = sqlx::query_as::<_, PlanListRow>(
            r#"
            SELECT p.id, p.org_id, p.created_by_user_id, p.target_ipa, p.age_or_grade,
                   p.needs_json, p.plan_json, p.created_at,
                   u.email AS creator_email
            FROM plans p
            JOIN users u ON u.id = p.created_by_user_id
            WHERE p.org_id = $1
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(org_id)
        .fetch_all(pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PlanListItem {
                created_by: CreatorSummary {
                    id: row.plan.created_by_user_id,
                    email: row.creator_email,
                },
                plan: row.plan,
            })
            .collect())
    }
}
