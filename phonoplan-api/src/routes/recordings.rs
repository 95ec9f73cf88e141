/// Recording endpoints (ADMIN, TEACHER)
///
/// - `GET /api/recordings?studentId=&startDate=&endDate=` - List with student and creator
/// - `POST /api/recordings` - Register an uploaded recording
///
/// A recording only references audio already uploaded through a signed URL;
/// its key must sit under the student's prefix and carry the extension of its
/// MIME type.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::students::STUDENT_NOT_FOUND,
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use phonoplan_shared::{
    auth::{
        authorization::{require_role, ANY_ROLE},
        middleware::Session,
    },
    media::AudioMimeType,
    models::{
        recording::{CreateRecording, Recording, RecordingFilter, RecordingListItem},
        student::Student,
    },
    storage::key::key_matches_recording,
    validation::FieldOrder,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const UNSUPPORTED_MIME_MESSAGE: &str = "Tipo de arquivo não suportado.";

/// Query parameters for listing recordings
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRecordingsQuery {
    pub student_id: Option<Uuid>,

    /// `YYYY-MM-DD`, inclusive from 00:00:00.000 UTC
    pub start_date: Option<String>,

    /// `YYYY-MM-DD`, inclusive until 23:59:59.999 UTC
    pub end_date: Option<String>,
}

/// Create request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecordingRequest {
    #[validate(length(min = 1, message = "Informe a chave do arquivo."))]
    pub storage_key: String,

    /// Checked against the allow-list by the handler (415)
    pub mime_type: String,

    pub student_id: Uuid,

    #[validate(range(min = 1, message = "A duração deve ser positiva."))]
    pub duration_ms: Option<i32>,
}

impl FieldOrder for CreateRecordingRequest {
    const FIELD_ORDER: &'static [&'static str] = &["storageKey", "mimeType", "studentId", "durationMs"];
}

#[derive(Debug, Serialize)]
pub struct RecordingResponse {
    pub recording: Recording,
}

#[derive(Debug, Serialize)]
pub struct RecordingListResponse {
    pub recordings: Vec<RecordingListItem>,
}

/// Turns the date filters into inclusive instants
///
/// # Errors
///
/// - `400 "Datas inválidas."`: a date is not `YYYY-MM-DD`
/// - `400 "Intervalo de datas inválido."`: start falls after end
pub fn date_range(
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> ApiResult<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    let day_start = NaiveTime::MIN;
    let day_end = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);

    let parse = |raw: &str, time: NaiveTime| {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(|date| date.and_time(time).and_utc())
            .map_err(|_| ApiError::BadRequest("Datas inválidas.".to_string()))
    };

    let from = start_date.map(|raw| parse(raw, day_start)).transpose()?;
    let to = end_date.map(|raw| parse(raw, day_end)).transpose()?;

    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(ApiError::BadRequest("Intervalo de datas inválido.".to_string()));
        }
    }

    Ok((from, to))
}

/// List the organization's recordings, newest first
pub async fn list_recordings(
    State(state): State<AppState>,
    Session(session): Session,
    query: Result<Query<ListRecordingsQuery>, QueryRejection>,
) -> ApiResult<Json<RecordingListResponse>> {
    let scope = require_role(session.as_ref(), ANY_ROLE)?;
    let Query(query) = query?;

    let (created_from, created_to) =
        date_range(query.start_date.as_deref(), query.end_date.as_deref())?;

    let filter = RecordingFilter {
        student_id: query.student_id,
        created_from,
        created_to,
    };
    let recordings = Recording::list_by_org(&state.db, scope.org_id, &filter).await?;

    Ok(Json(RecordingListResponse { recordings }))
}

/// Register a recording
///
/// # Errors
///
/// - `400 Bad Request`: invalid body
/// - `404 Not Found`: student not in the caller's organization
/// - `415 Unsupported Media Type`: MIME type outside the allow-list, or a key
///   that does not match the student prefix and extension
pub async fn create_recording(
    State(state): State<AppState>,
    Session(session): Session,
    body: Result<Json<CreateRecordingRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RecordingResponse>)> {
    let scope = require_role(session.as_ref(), ANY_ROLE)?;
    let Json(req) = body?;
    ApiError::validate(&req)?;

    let mime_type: AudioMimeType = req
        .mime_type
        .parse()
        .map_err(|_| ApiError::UnsupportedMediaType(UNSUPPORTED_MIME_MESSAGE.to_string()))?;

    if !key_matches_recording(&req.storage_key, scope.org_id, req.student_id, mime_type) {
        tracing::warn!(org_id = %scope.org_id, key = %req.storage_key, "Recording key rejected");
        return Err(ApiError::UnsupportedMediaType(
            "Chave ou extensão incompatível com o tipo de arquivo.".to_string(),
        ));
    }

    if Student::find_in_org(&state.db, scope.org_id, req.student_id)
        .await?
        .is_none()
    {
        return Err(ApiError::NotFound(STUDENT_NOT_FOUND.to_string()));
    }

    let recording = Recording::create(
        &state.db,
        CreateRecording {
            org_id: scope.org_id,
            student_id: req.student_id,
            created_by_user_id: scope.user_id,
            storage_key: req.storage_key,
            mime_type,
            duration_ms: req.duration_ms,
        },
    )
    .await
    .map_err(|e| ApiError::internal("Não foi possível salvar a gravação.", e))?;

    tracing::info!(
        org_id = %scope.org_id,
        recording_id = %recording.id,
        key = %recording.storage_key,
        "Recording saved"
    );

    Ok((StatusCode::CREATED, Json(RecordingResponse { recording })))
}
