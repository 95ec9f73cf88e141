/// Error handling for the API server
///
/// Handlers return `ApiResult<T>`; every failure becomes an [`ApiError`],
/// which renders as
///
/// ```json
/// { "error": "<message shown to the user>", "code": "<machine code>", "details": [...] }
/// ```
///
/// `details` is only present for validation failures and lists every
/// failing field. Unexpected errors are logged here and answered with a
/// generic message.
///
/// # Example
///
/// ```
/// use phonoplan_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::{json, Value};
///
/// async fn handler(found: bool) -> ApiResult<Json<Value>> {
///     if !found {
///         return Err(ApiError::NotFound("Estudante não encontrado.".to_string()));
///     }
///     Ok(Json(json!({ "ok": true })))
/// }
/// ```

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use phonoplan_shared::auth::authorization::AuthzError;
use phonoplan_shared::auth::jwt::JwtError;
use phonoplan_shared::auth::password::PasswordError;
use phonoplan_shared::validation::{first_message, validate_in_order, FieldError, FieldOrder, DEFAULT_MESSAGE};
use serde::Serialize;
use std::fmt;
use validator::Validate;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Generic message for unexpected failures
pub const INTERNAL_ERROR_MESSAGE: &str = "Erro interno do servidor.";

/// Message for 429 responses
pub const RATE_LIMIT_MESSAGE: &str = "Limite de requisições excedido. Tente novamente em instantes.";

/// Message for bodies that are not the expected JSON
pub const INVALID_BODY_MESSAGE: &str = "Dados inválidos.";

/// Message for unparseable query strings
pub const INVALID_PARAMS_MESSAGE: &str = "Parâmetros inválidos.";

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Schema validation failed (400); `message` is the first failure
    Validation {
        message: String,
        details: Vec<FieldError>,
    },

    /// No usable session (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404), also used for records of other organizations
    NotFound(String),

    /// Unsupported media type (415)
    UnsupportedMediaType(String),

    /// Too many requests (429)
    RateLimitExceeded {
        retry_after: u64,
        limit: u32,
        /// Window end, unix seconds
        reset_at: u64,
    },

    /// Internal server error (500); the message is shown to the user
    InternalError(String),

    /// The AI provider failed or answered badly (502)
    BadGateway {
        message: String,
        details: Option<Vec<FieldError>>,
    },
}

/// Error response format
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable message
    pub error: String,

    /// Error code (e.g. "bad_request", "unauthorized")
    pub code: &'static str,

    /// Field errors, for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

impl ApiError {
    /// Logs `error` and returns a 500 carrying `message`
    pub fn internal(message: &str, error: impl fmt::Display) -> Self {
        tracing::error!(error = %error, "{}", message);
        ApiError::InternalError(message.to_string())
    }

    /// Validates a request body; the 400 reports its first failing field
    pub fn validate<T: Validate + FieldOrder>(req: &T) -> ApiResult<()> {
        validate_in_order(req).map_err(Self::from_field_errors)
    }

    /// 400 from already flattened field errors
    pub fn from_field_errors(details: Vec<FieldError>) -> Self {
        let message = first_message(&details).unwrap_or(DEFAULT_MESSAGE).to_string();
        ApiError::Validation { message, details }
    }

    /// 400 with a fixed message and the field errors as details
    pub fn validation_with_message(message: &str, details: Vec<FieldError>) -> Self {
        ApiError::Validation {
            message: message.to_string(),
            details,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadGateway { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Validation { .. } => "validation_error",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::UnsupportedMediaType(_) => "unsupported_media_type",
            ApiError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            ApiError::InternalError(_) => "internal_error",
            ApiError::BadGateway { .. } => "bad_gateway",
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Validation { details, .. } => {
                write!(f, "Validation failed: {} errors", details.len())
            }
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::UnsupportedMediaType(msg) => write!(f, "Unsupported media type: {}", msg),
            ApiError::RateLimitExceeded { retry_after, .. } => {
                write!(f, "Rate limit exceeded, retry after {}s", retry_after)
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::BadGateway { message, .. } => write!(f, "Bad gateway: {}", message),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Rate limiting adds Retry-After and X-RateLimit-* headers
        if let ApiError::RateLimitExceeded {
            retry_after,
            limit,
            reset_at,
        } = self
        {
            let body = Json(ErrorResponse {
                error: RATE_LIMIT_MESSAGE.to_string(),
                code,
                details: None,
            });

            let mut response = (status, body).into_response();
            let headers = response.headers_mut();
            headers.insert("Retry-After", HeaderValue::from(retry_after));
            headers.insert("X-RateLimit-Limit", HeaderValue::from(limit));
            headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
            headers.insert("X-RateLimit-Reset", HeaderValue::from(reset_at));
            return response;
        }

        let (message, details) = match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::UnsupportedMediaType(msg)
            | ApiError::InternalError(msg) => (msg, None),
            ApiError::Validation { message, details } => (message, Some(details)),
            ApiError::BadGateway { message, details } => (message, details),
            ApiError::RateLimitExceeded { .. } => (RATE_LIMIT_MESSAGE.to_string(), None),
        };

        let body = Json(ErrorResponse {
            error: message,
            code,
            details,
        });

        (status, body).into_response()
    }
}

/// Unexpected database failures
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::internal(INTERNAL_ERROR_MESSAGE, format!("Database error: {}", err))
    }
}

/// Role gate failures
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated => ApiError::Unauthorized(err.to_string()),
            AuthzError::Forbidden => ApiError::Forbidden(err.to_string()),
        }
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::internal(INTERNAL_ERROR_MESSAGE, format!("Password operation failed: {}", err))
    }
}

/// Token signing failures (validation failures are handled by the session middleware)
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        ApiError::internal(INTERNAL_ERROR_MESSAGE, format!("Session token error: {}", err))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        ApiError::BadRequest(INVALID_BODY_MESSAGE.to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected query string");
        ApiError::BadRequest(INVALID_PARAMS_MESSAGE.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Datas inválidas.".to_string());
        assert_eq!(err.to_string(), "Bad request: Datas inválidas.");

        let err = ApiError::NotFound("Estudante não encontrado.".to_string());
        assert_eq!(err.to_string(), "Not found: Estudante não encontrado.");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::UnsupportedMediaType(String::new()).status_code(),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(
            ApiError::BadGateway {
                message: String::new(),
                details: None
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(ApiError::from(AuthzError::Unauthenticated).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(AuthzError::Forbidden).status_code(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_validation_reports_first_field() {
        #[derive(Validate)]
        struct Input {
            #[validate(length(min = 8, message = "A senha deve ter pelo menos 8 caracteres."))]
            password: String,
            #[validate(email(message = "E-mail inválido."))]
            email: String,
        }

        impl FieldOrder for Input {
            const FIELD_ORDER: &'static [&'static str] = &["password", "email"];
        }

        let input = Input {
            password: "123".to_string(),
            email: "nope".to_string(),
        };

        let response = ApiError::validate(&input).unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["error"], "A senha deve ter pelo menos 8 caracteres.");
        assert_eq!(json["code"], "validation_error");
        assert_eq!(json["details"].as_array().unwrap().len(), 2);
        assert_eq!(json["details"][1]["field"], "email");
    }

    #[tokio::test]
    async fn test_rate_limit_response_headers() {
        let response = ApiError::RateLimitExceeded {
            retry_after: 42,
            limit: 10,
            reset_at: 1_700_000_000,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let headers = response.headers();
        assert_eq!(headers["Retry-After"], "42");
        assert_eq!(headers["X-RateLimit-Limit"], "10");
        assert_eq!(headers["X-RateLimit-Remaining"], "0");
        assert_eq!(headers["X-RateLimit-Reset"], "1700000000");

        let json = body_json(response).await;
        assert_eq!(json["error"], RATE_LIMIT_MESSAGE);
    }

    #[tokio::test]
    async fn test_internal_error_hides_cause() {
        let response = ApiError::from(sqlx::Error::PoolTimedOut).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], INTERNAL_ERROR_MESSAGE);
        assert!(json.get("details").is_none());
    }
}
