/// Consent endpoints
///
/// - `GET /api/students/:id/consent` - Latest consent, or `null`
/// - `POST /api/students/:id/consent` - Record a new consent (ADMIN)
/// - `PATCH /api/students/:id/consent` - Replace the consent values (ADMIN)
///
/// The latest consent (by `signedAt`) is authoritative. Audio upload URLs are
/// only issued while it allows audio.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::students::{parse_student_id, STUDENT_NOT_FOUND},
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use phonoplan_shared::{
    auth::{
        authorization::{require_member, require_role, MemberScope, ADMIN_ONLY},
        middleware::Session,
    },
    models::{
        consent::{Consent, ConsentValues},
        student::Student,
    },
};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ConsentResponse {
    pub consent: Option<Consent>,
}

async fn ensure_student(state: &AppState, scope: &MemberScope, raw_id: &str) -> ApiResult<Uuid> {
    let id = parse_student_id(raw_id)?;

    Student::find_in_org(&state.db, scope.org_id, id)
        .await?
        .map(|student| student.id)
        .ok_or_else(|| ApiError::NotFound(STUDENT_NOT_FOUND.to_string()))
}

pub async fn get_consent(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<String>,
) -> ApiResult<Json<ConsentResponse>> {
    let scope = require_member(session.as_ref())?;
    let student_id = ensure_student(&state, &scope, &id).await?;

    let consent = Consent::latest_for_student(&state.db, student_id).await?;

    Ok(Json(ConsentResponse { consent }))
}

/// Record a new consent signed by the caller
///
/// ```text
/// POST /api/students/:id/consent
/// { "audioAllowed": true, "shareForResearch": false }
/// ```
pub async fn create_consent(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<String>,
    body: Result<Json<ConsentValues>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<ConsentResponse>)> {
    let scope = require_role(session.as_ref(), ADMIN_ONLY)?;
    let Json(values) = body?;
    let student_id = ensure_student(&state, &scope, &id).await?;

    let consent = Consent::create(&state.db, student_id, values, scope.user_id)
        .await
        .map_err(|e| ApiError::internal("Não foi possível registrar o consentimento.", e))?;

    tracing::info!(
        org_id = %scope.org_id,
        student_id = %student_id,
        audio_allowed = values.audio_allowed,
        "Consent recorded"
    );

    Ok((
        StatusCode::CREATED,
        Json(ConsentResponse {
            consent: Some(consent),
        }),
    ))
}

/// Replace the consent values of every stored consent, or record the first one
pub async fn update_consent(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<String>,
    body: Result<Json<ConsentValues>, JsonRejection>,
) -> ApiResult<Json<ConsentResponse>> {
    let scope = require_role(session.as_ref(), ADMIN_ONLY)?;
    let Json(values) = body?;
    let student_id = ensure_student(&state, &scope, &id).await?;

    let consent = Consent::upsert(&state.db, student_id, values, scope.user_id)
        .await
        .map_err(|e| ApiError::internal("Não foi possível atualizar o consentimento.", e))?;

    tracing::info!(
        org_id = %scope.org_id,
        student_id = %student_id,
        audio_allowed = values.audio_allowed,
        "Consent updated"
    );

    Ok(Json(ConsentResponse {
        consent: Some(consent),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_consent_serializes_as_null() {
        let json = serde_json::to_value(ConsentResponse { consent: None }).unwrap();
        assert!(json["consent"].is_null());
    }
}
