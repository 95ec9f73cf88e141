/// Authentication endpoints
///
/// - `POST /api/auth/register` - Create an organization and its admin user
/// - `POST /api/auth/login` - Exchange credentials for a session token
/// - `GET /api/auth/session` - Current session
///
/// Register and login are rate limited per client (see `app::build_router`).

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use chrono::{DateTime, Duration, Utc};
use phonoplan_shared::{
    auth::{
        jwt::{create_token, Claims},
        middleware::{AuthContext, Session},
        password,
    },
    models::{
        account::{register_account, NewAccount, RegistrationError},
        membership::{Membership, Role},
        user::User,
    },
    validation::FieldOrder,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Shown for unknown emails and wrong passwords alike
pub const INVALID_CREDENTIALS: &str = "Credenciais inválidas.";

/// Register request
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(email(message = "E-mail inválido."))]
    pub email: String,

    #[validate(custom(function = "validate_password"))]
    pub password: String,

    #[validate(custom(function = "validate_org_name"))]
    pub org_name: String,
}

impl FieldOrder for RegisterRequest {
    const FIELD_ORDER: &'static [&'static str] = &["email", "password", "orgName"];
}

fn char_count_between(
    value: &str,
    min: usize,
    max: usize,
    too_short: &'static str,
    too_long: &'static str,
) -> Result<(), ValidationError> {
    let count = value.chars().count();
    let message = if count < min {
        too_short
    } else if count > max {
        too_long
    } else {
        return Ok(());
    };

    let mut error = ValidationError::new("length");
    error.message = Some(Cow::Borrowed(message));
    Err(error)
}

fn validate_password(value: &str) -> Result<(), ValidationError> {
    char_count_between(
        value,
        password::MIN_PASSWORD_LENGTH as usize,
        password::MAX_PASSWORD_LENGTH as usize,
        "A senha deve ter pelo menos 8 caracteres.",
        "A senha deve ter no máximo 64 caracteres.",
    )
}

fn validate_org_name(org_name: &str) -> Result<(), ValidationError> {
    char_count_between(
        org_name,
        2,
        120,
        "Informe o nome da organização.",
        "Nome da organização muito longo.",
    )
}

/// Plain confirmation message
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Login request
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(email(message = "E-mail inválido."))]
    pub email: String,

    #[validate(length(min = 1, message = "Informe a senha."))]
    pub password: String,
}

impl FieldOrder for LoginRequest {
    const FIELD_ORDER: &'static [&'static str] = &["email", "password"];
}

/// The signed-in user as seen by the client
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
    pub org_id: Option<Uuid>,
    pub role: Option<Role>,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,

    /// Always `Bearer`
    pub token_type: String,

    pub expires_at: DateTime<Utc>,

    pub user: SessionUser,
}

/// Register a new organization with its first (ADMIN) user
///
/// ```text
/// POST /api/auth/register
/// { "email": "diretora@escola.br", "password": "...", "orgName": "Escola Aurora" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: invalid body, or email already registered
/// - `429 Too Many Requests`: registration policy exceeded
/// - `500 Internal Server Error`: hashing or database failure
pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let Json(req) = body?;
    ApiError::validate(&req)?;

    let password_hash = password::hash_password(&req.password)?;

    let account = register_account(
        &state.db,
        NewAccount {
            email: req.email,
            password_hash,
            org_name: req.org_name,
        },
    )
    .await
    .map_err(|e| match e {
        RegistrationError::EmailTaken => ApiError::BadRequest("E-mail já registrado.".to_string()),
        RegistrationError::Database(e) => ApiError::internal("Não foi possível criar a conta agora.", e),
    })?;

    tracing::info!(user_id = %account.user.id, org_id = %account.organization.id, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Conta criada com sucesso.".to_string(),
        }),
    ))
}

/// Login endpoint
///
/// Verifies the password, resolves the user's first membership and issues a
/// session token carrying it.
///
/// # Errors
///
/// - `400 Bad Request`: invalid body
/// - `401 Unauthorized`: unknown email or wrong password
/// - `429 Too Many Requests`: login policy exceeded
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(req) = body?;
    ApiError::validate(&req)?;

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::info!(user_id = %user.id, "Login rejected: wrong password");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS.to_string()));
    }

    let membership = Membership::first_for_user(&state.db, user.id)
        .await?
        .map(|m| (m.org_id, m.role));

    let claims = Claims::with_expiration(
        user.id,
        &user.email,
        membership,
        Duration::hours(state.config.auth.session_ttl_hours),
    );
    let token = create_token(&claims, state.auth_secret())?;

    tracing::info!(user_id = %user.id, org_id = ?claims.org_id, "User logged in");

    Ok(Json(LoginResponse {
        token,
        token_type: "Bearer".to_string(),
        expires_at: claims.expires_at(),
        user: SessionUser {
            id: user.id,
            email: user.email,
            org_id: claims.org_id,
            role: claims.role,
        },
    }))
}

/// Current session
///
/// # Errors
///
/// - `401 Unauthorized`: no session token was sent
pub async fn session(Session(session): Session) -> ApiResult<Json<AuthContext>> {
    session
        .map(Json)
        .ok_or_else(|| ApiError::Unauthorized("Não autorizado.".to_string()))
}
