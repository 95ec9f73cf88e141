/// Signed storage URL endpoints
///
/// - `POST /api/storage/sign-upload` - Key and upload URL for a new recording
/// - `POST /api/storage/sign-download` - Download URL for an existing recording
///
/// Audio never passes through these handlers; the browser talks to storage
/// with the returned URLs. Keys are checked against the session's
/// organization before any provider call.

use std::collections::HashMap;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{recordings::UNSUPPORTED_MIME_MESSAGE, students::STUDENT_NOT_FOUND},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use phonoplan_shared::{
    auth::{authorization::require_member, middleware::Session},
    media::{AudioMimeType, MAX_AUDIO_FILE_BYTES},
    models::{consent::Consent, recording::Recording, student::Student},
    storage::key::{key_belongs_to_org, new_recording_storage_key},
    validation::FieldOrder,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Upload request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUploadRequest {
    pub mime_type: String,
    pub student_id: Uuid,
    pub size_bytes: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUploadResponse {
    pub key: String,
    pub upload_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

/// Download request
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct SignDownloadRequest {
    #[validate(length(min = 1, message = "Informe a chave do arquivo."))]
    pub key: String,
}

impl FieldOrder for SignDownloadRequest {
    const FIELD_ORDER: &'static [&'static str] = &["key"];
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignDownloadResponse {
    pub download_url: String,
}

/// Declared upload size must be within `1..=MAX_AUDIO_FILE_BYTES`
pub fn check_upload_size(size_bytes: i64) -> ApiResult<()> {
    if size_bytes < 1 {
        return Err(ApiError::BadRequest(
            "O tamanho do arquivo deve ser positivo.".to_string(),
        ));
    }

    if size_bytes as u64 > MAX_AUDIO_FILE_BYTES {
        return Err(ApiError::BadRequest(
            "Arquivo de áudio excede o limite permitido.".to_string(),
        ));
    }

    Ok(())
}

/// Issue an upload URL for a student's recording
///
/// ```text
/// POST /api/storage/sign-upload
/// { "mimeType": "audio/webm", "studentId": "...", "sizeBytes": 48213 }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: invalid body or size outside the limit
/// - `403 Forbidden`: the student's latest consent does not allow audio
/// - `404 Not Found`: student not in the caller's organization
/// - `415 Unsupported Media Type`: MIME type outside the allow-list
pub async fn sign_upload(
    State(state): State<AppState>,
    Session(session): Session,
    body: Result<Json<SignUploadRequest>, JsonRejection>,
) -> ApiResult<Json<SignUploadResponse>> {
    let scope = require_member(session.as_ref())?;
    let Json(req) = body?;

    let mime_type: AudioMimeType = req
        .mime_type
        .parse()
        .map_err(|_| ApiError::UnsupportedMediaType(UNSUPPORTED_MIME_MESSAGE.to_string()))?;
    check_upload_size(req.size_bytes)?;

    let student = Student::find_in_org(&state.db, scope.org_id, req.student_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(STUDENT_NOT_FOUND.to_string()))?;

    if !Consent::audio_allowed(&state.db, student.id).await? {
        tracing::info!(org_id = %scope.org_id, student_id = %student.id, "Upload refused without audio consent");
        return Err(ApiError::Forbidden(
            "Consentimento de áudio não encontrado ou negado.".to_string(),
        ));
    }

    let key = new_recording_storage_key(scope.org_id, student.id, mime_type);
    let upload = state
        .storage
        .signed_upload_url(&key, mime_type)
        .await
        .map_err(|e| ApiError::internal("Não foi possível gerar a URL de upload.", e))?;

    tracing::debug!(org_id = %scope.org_id, key = %key, provider = state.storage.name(), "Upload URL issued");

    Ok(Json(SignUploadResponse {
        key,
        upload_url: upload.url,
        headers: upload.headers,
    }))
}

/// Issue a download URL for a recording of the caller's organization
///
/// # Errors
///
/// - `400 Bad Request`: missing key
/// - `403 Forbidden`: key outside the caller's organization
/// - `404 Not Found`: no recording with that key in the organization
pub async fn sign_download(
    State(state): State<AppState>,
    Session(session): Session,
    body: Result<Json<SignDownloadRequest>, JsonRejection>,
) -> ApiResult<Json<SignDownloadResponse>> {
    let scope = require_member(session.as_ref())?;
    let Json(req) = body?;
    ApiError::validate(&req)?;

    if !key_belongs_to_org(&req.key, scope.org_id) {
        tracing::warn!(org_id = %scope.org_id, user_id = %scope.user_id, key = %req.key, "Cross-organization download refused");
        return Err(ApiError::Forbidden("Chave não pertence à organização.".to_string()));
    }

    if Recording::find_by_key_in_org(&state.db, scope.org_id, &req.key)
        .await?
        .is_none()
    {
        return Err(ApiError::NotFound(
            "Gravação não encontrada para esta organização.".to_string(),
        ));
    }

    let download = state
        .storage
        .signed_download_url(&req.key)
        .await
        .map_err(|e| ApiError::internal("Não foi possível gerar a URL de download.", e))?;

    Ok(Json(SignDownloadResponse {
        download_url: download.url,
    }))
}
