/// Student endpoints
///
/// - `GET /api/students?search=` - List (ADMIN, TEACHER)
/// - `POST /api/students` - Create with a generated code (ADMIN)
/// - `GET /api/students/:id` - Read
/// - `PATCH /api/students/:id` - Partial update
/// - `DELETE /api/students/:id` - Delete, with consents and recordings
///
/// Single-student routes only need a session in the organization. A student of
/// another organization answers 404, like a missing one.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, INVALID_PARAMS_MESSAGE},
};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use phonoplan_shared::{
    auth::{
        authorization::{require_member, require_role, ADMIN_ONLY, ANY_ROLE},
        middleware::Session,
    },
    models::student::{CreateStudent, Student, UpdateStudent},
    validation::FieldOrder,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const STUDENT_NOT_FOUND: &str = "Estudante não encontrado.";

const CREATE_FAILED: &str = "Não foi possível criar o estudante agora.";

/// Query parameters for listing students
#[derive(Debug, Default, Deserialize, Validate)]
pub struct ListStudentsQuery {
    #[validate(length(max = 120, message = "Busca muito longa."))]
    pub search: Option<String>,
}

const STUDENT_FIELD_ORDER: &[&str] = &["displayName", "notes"];

/// Create request; both fields optional
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateStudentRequest {
    #[validate(length(max = 120, message = "Nome muito longo."))]
    pub display_name: Option<String>,

    #[validate(length(max = 2000, message = "Observações muito longas."))]
    pub notes: Option<String>,
}

/// Patch request; absent or null fields stay unchanged
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateStudentRequest {
    #[validate(length(max = 120, message = "Nome muito longo."))]
    pub display_name: Option<String>,

    #[validate(length(max = 2000, message = "Observações muito longas."))]
    pub notes: Option<String>,
}

impl FieldOrder for CreateStudentRequest {
    const FIELD_ORDER: &'static [&'static str] = STUDENT_FIELD_ORDER;
}

impl FieldOrder for UpdateStudentRequest {
    const FIELD_ORDER: &'static [&'static str] = STUDENT_FIELD_ORDER;
}

#[derive(Debug, Serialize)]
pub struct StudentResponse {
    pub student: Student,
}

#[derive(Debug, Serialize)]
pub struct StudentListResponse {
    pub students: Vec<Student>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub ok: bool,
}

/// Parses a path id; a malformed id cannot name a student
pub fn parse_student_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(STUDENT_NOT_FOUND.to_string()))
}

/// List the organization's students, newest first
///
/// `search` matches code or display name, case-insensitively.
pub async fn list_students(
    State(state): State<AppState>,
    Session(session): Session,
    query: Result<Query<ListStudentsQuery>, QueryRejection>,
) -> ApiResult<Json<StudentListResponse>> {
    let scope = require_role(session.as_ref(), ANY_ROLE)?;
    let Query(query) = query?;
    query
        .validate()
        .map_err(|_| ApiError::BadRequest(INVALID_PARAMS_MESSAGE.to_string()))?;

    let students = Student::list_by_org(&state.db, scope.org_id, query.search.as_deref()).await?;

    Ok(Json(StudentListResponse { students }))
}

/// Create a student
///
/// # Errors
///
/// - `400 Bad Request`: invalid body
/// - `403 Forbidden`: caller is not an ADMIN
/// - `500 Internal Server Error`: no free code after the retry limit, or database failure
pub async fn create_student(
    State(state): State<AppState>,
    Session(session): Session,
    body: Result<Json<CreateStudentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<StudentResponse>)> {
    let scope = require_role(session.as_ref(), ADMIN_ONLY)?;
    let Json(req) = body?;
    ApiError::validate(&req)?;

    let code = Student::generate_unique_code(&state.db, scope.org_id)
        .await
        .map_err(|e| ApiError::internal(CREATE_FAILED, e))?;

    let student = Student::create(
        &state.db,
        CreateStudent {
            org_id: scope.org_id,
            code,
            display_name: req.display_name.unwrap_or_default(),
            notes: req.notes,
        },
    )
    .await
    .map_err(|e| ApiError::internal(CREATE_FAILED, e))?;

    tracing::info!(org_id = %scope.org_id, student_id = %student.id, code = %student.code, "Student created");

    Ok((StatusCode::CREATED, Json(StudentResponse { student })))
}

pub async fn get_student(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<String>,
) -> ApiResult<Json<StudentResponse>> {
    let scope = require_member(session.as_ref())?;
    let id = parse_student_id(&id)?;

    let student = Student::find_in_org(&state.db, scope.org_id, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(STUDENT_NOT_FOUND.to_string()))?;

    Ok(Json(StudentResponse { student }))
}

/// Update a student's display name and/or notes
pub async fn update_student(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<String>,
    body: Result<Json<UpdateStudentRequest>, JsonRejection>,
) -> ApiResult<Json<StudentResponse>> {
    let scope = require_member(session.as_ref())?;
    let id = parse_student_id(&id)?;
    let Json(req) = body?;
    ApiError::validate(&req)?;

    let student = Student::update_in_org(
        &state.db,
        scope.org_id,
        id,
        UpdateStudent {
            display_name: req.display_name,
            notes: req.notes,
        },
    )
    .await
    .map_err(|e| ApiError::internal("Não foi possível atualizar o estudante.", e))?
    .ok_or_else(|| ApiError::NotFound(STUDENT_NOT_FOUND.to_string()))?;

    Ok(Json(StudentResponse { student }))
}

pub async fn delete_student(
    State(state): State<AppState>,
    Session(session): Session,
    Path(id): Path<String>,
) -> ApiResult<Json<DeletedResponse>> {
    let scope = require_member(session.as_ref())?;
    let id = parse_student_id(&id)?;

    if !Student::delete_in_org(&state.db, scope.org_id, id).await? {
        return Err(ApiError::NotFound(STUDENT_NOT_FOUND.to_string()));
    }

    tracing::info!(org_id = %scope.org_id, student_id = %id, user_id = %scope.user_id, "Student deleted");

    Ok(Json(DeletedResponse { ok: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use phonoplan_shared::validation::validate_in_order;

    #[test]
    fn test_malformed_id_is_not_found() {
        assert!(matches!(parse_student_id("abc"), Err(ApiError::NotFound(_))));
        assert!(parse_student_id(&Uuid::new_v4().to_string()).is_ok());
    }

    #[test]
    fn test_create_request_fields_are_optional() {
        let req: CreateStudentRequest = serde_json::from_str("{}").unwrap();
        assert!(req.display_name.is_none());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_update_request_null_means_unchanged() {
        let req: UpdateStudentRequest =
            serde_json::from_str(r#"{"displayName": "Aluno B", "notes": null}"#).unwrap();

        assert_eq!(req.display_name.as_deref(), Some("Aluno B"));
        assert!(req.notes.is_none());
    }

    #[test]
    fn test_length_limits() {
        let req = CreateStudentRequest {
            display_name: Some("x".repeat(121)),
            notes: Some("y".repeat(2001)),
        };
        let errors = validate_in_order(&req).unwrap_err();

        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "displayName");
        assert_eq!(errors[1].field, "notes");
    }

    #[test]
    fn test_search_limit() {
        let query = ListStudentsQuery {
            search: Some("a".repeat(121)),
        };
        assert!(query.validate().is_err());
        assert!(ListStudentsQuery::default().validate().is_ok());
    }
}
