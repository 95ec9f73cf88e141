/// Session middleware for Axum
///
/// Reads an optional `Authorization: Bearer <token>` header, validates the
/// session token and stores an [`AuthContext`] in the request extensions.
///
/// Requests without the header pass through untouched: whether a route needs a
/// session is decided by the role gate in [`super::authorization`], so public
/// routes (health, register, login, local storage) share the same stack.
/// A header that is present but malformed, forged, or expired is answered with
/// 401 before the handler runs.
///
/// Handlers read the session with the [`Session`] extractor.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Router};
/// use phonoplan_shared::auth::middleware::{session_middleware, Session, SessionVerifier};
/// use sqlx::PgPool;
///
/// async fn whoami(Session(session): Session) -> String {
///     session.map(|s| s.email).unwrap_or_default()
/// }
///
/// fn router(pool: PgPool) -> Router {
///     let verifier = SessionVerifier::new(pool, "your-secret-key-at-least-32-bytes-long");
///     Router::new()
///         .route("/whoami", get(whoami))
///         .layer(middleware::from_fn_with_state(verifier, session_middleware))
/// }
/// ```

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::jwt::{validate_token, Claims, JwtError};
use crate::models::membership::{Membership, Role};

/// Where a session stands with respect to organizations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Tenancy {
    /// The user belongs to no organization yet
    Unassigned,

    /// The user acts in `org_id` with `role`
    #[serde(rename_all = "camelCase")]
    Member { org_id: Uuid, role: Role },
}

/// Authenticated session, added to request extensions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: String,
    pub tenancy: Tenancy,
}

impl AuthContext {
    /// Builds the context carried by validated claims
    pub fn from_claims(claims: &Claims) -> Self {
        let tenancy = match claims.membership() {
            Some((org_id, role)) => Tenancy::Member { org_id, role },
            None => Tenancy::Unassigned,
        };

        Self {
            user_id: claims.sub,
            email: claims.email.clone(),
            tenancy,
        }
    }

    pub fn org_id(&self) -> Option<Uuid> {
        match self.tenancy {
            Tenancy::Member { org_id, .. } => Some(org_id),
            Tenancy::Unassigned => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self.tenancy {
            Tenancy::Member { role, .. } => Some(role),
            Tenancy::Unassigned => None,
        }
    }
}

/// Error type for the session middleware
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Authorization header is not `Bearer <token>`
    #[error("Expected Bearer token")]
    InvalidFormat,

    /// Token validation failed
    #[error("Invalid session token: {0}")]
    InvalidToken(#[from] JwtError),

    /// Membership lookup failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::InvalidFormat | AuthError::InvalidToken(_) => {
                tracing::debug!(error = %self, "Rejected session token");
                (
                    StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({
                        "error": "Não autorizado.",
                        "code": "unauthorized",
                    })),
                )
                    .into_response()
            }
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Failed to resolve session membership");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({
                        "error": "Erro interno do servidor.",
                        "code": "internal_error",
                    })),
                )
                    .into_response()
            }
        }
    }
}

/// Extracts the bearer token, if an Authorization header is present
///
/// Returns `None` without a header and `Some(Err(_))` when the header is not a
/// bearer credential.
pub fn bearer_token(headers: &HeaderMap) -> Option<Result<&str, AuthError>> {
    let value = headers.get(header::AUTHORIZATION)?;

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AuthError::InvalidFormat);

    Some(token)
}

/// Validates session tokens and resolves missing memberships
#[derive(Clone)]
pub struct SessionVerifier {
    pool: PgPool,
    secret: Arc<str>,
}

impl SessionVerifier {
    pub fn new(pool: PgPool, secret: &str) -> Self {
        Self {
            pool,
            secret: Arc::from(secret),
        }
    }

    /// Turns a token into a session
    ///
    /// Tokens issued before the user joined an organization carry no
    /// membership; the user's first membership is looked up instead.
    pub async fn verify(&self, token: &str) -> Result<AuthContext, AuthError> {
        let claims = validate_token(token, &self.secret)?;
        let mut context = AuthContext::from_claims(&claims);

        if context.tenancy == Tenancy::Unassigned {
            if let Some(membership) = Membership::first_for_user(&self.pool, claims.sub).await? {
                context.tenancy = Tenancy::Member {
                    org_id: membership.org_id,
                    role: membership.role,
                };
            }
        }

        Ok(context)
    }
}

/// Session middleware
///
/// # Errors
///
/// - 401 if the Authorization header is malformed or the token is invalid/expired
/// - 500 if the membership lookup fails
pub async fn session_middleware(
    State(verifier): State<SessionVerifier>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if let Some(token) = bearer_token(req.headers()) {
        let context = verifier.verify(token?).await?;
        tracing::debug!(user_id = %context.user_id, org_id = ?context.org_id(), "Session resolved");
        req.extensions_mut().insert(context);
    }

    Ok(next.run(req).await)
}

/// The request's session, if any
///
/// Never rejects; authorization happens in the handler.
#[derive(Debug, Clone)]
pub struct Session(pub Option<AuthContext>);

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Session(parts.extensions.get::<AuthContext>().cloned()))
    }
}
