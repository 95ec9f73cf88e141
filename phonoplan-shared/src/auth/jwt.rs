/// Session token issuance and validation
///
/// Session tokens are HS256-signed JWTs. Besides the standard claims they carry
/// the user's email and, when the user belongs to an organization, the
/// organization id and role resolved at login time.
///
/// A user without any membership still gets a token: its `org_id`/`role`
/// claims are empty and the session layer re-resolves them on every request,
/// so users added to an organization after logging in pick up access.
///
/// # Security
///
/// - **Algorithm**: HS256 (HMAC with SHA-256)
/// - **Expiration**: Configurable, 24 hours by default
/// - **Validation**: Signature, expiration, not-before and issuer checks
/// - **Secret**: At least 32 bytes, shared with the local storage URL signer
///
/// # Example
///
/// ```
/// use phonoplan_shared::auth::jwt::{create_token, validate_token, Claims};
/// use phonoplan_shared::models::membership::Role;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let user_id = Uuid::new_v4();
/// let claims = Claims::new(user_id, "prof@escola.br", Some((Uuid::new_v4(), Role::Teacher)));
/// let token = create_token(&claims, "your-secret-key-at-least-32-bytes-long")?;
///
/// let validated = validate_token(&token, "your-secret-key-at-least-32-bytes-long")?;
/// assert_eq!(validated.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::membership::Role;

/// Issuer claim written into (and required from) every session token
pub const TOKEN_ISSUER: &str = "phonoplan";

/// Default session lifetime
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Token was issued by someone else
    #[error("Invalid token issuer")]
    InvalidIssuer,
}

/// Session token claims
///
/// # Standard Claims
///
/// - `sub`: User ID
/// - `iss`: Always `"phonoplan"`
/// - `iat` / `nbf` / `exp`: Unix timestamps
///
/// # Custom Claims
///
/// - `email`: User's email
/// - `org_id` / `role`: Organization membership resolved at login, if any
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - User ID
    pub sub: Uuid,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// User email
    pub email: String,

    /// Organization the session acts in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<Uuid>,

    /// Role within `org_id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl Claims {
    /// Creates claims expiring after the default session lifetime
    pub fn new(user_id: Uuid, email: &str, membership: Option<(Uuid, Role)>) -> Self {
        Self::with_expiration(
            user_id,
            email,
            membership,
            Duration::hours(DEFAULT_SESSION_TTL_HOURS),
        )
    }

    /// Creates claims with a custom lifetime
    ///
    /// # Example
    ///
    /// ```
    /// use phonoplan_shared::auth::jwt::Claims;
    /// use chrono::Duration;
    /// use uuid::Uuid;
    ///
    /// let claims = Claims::with_expiration(Uuid::new_v4(), "a@b.com", None, Duration::hours(1));
    /// assert!(claims.org_id.is_none());
    /// ```
    pub fn with_expiration(
        user_id: Uuid,
        email: &str,
        membership: Option<(Uuid, Role)>,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();
        let expiration = now + expires_in;
        let (org_id, role) = match membership {
            Some((org_id, role)) => (Some(org_id), Some(role)),
            None => (None, None),
        };

        Self {
            sub: user_id,
            iss: TOKEN_ISSUER.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            nbf: now.timestamp(),
            email: email.to_string(),
            org_id,
            role,
        }
    }

    /// Organization and role, only when both claims are present
    pub fn membership(&self) -> Option<(Uuid, Role)> {
        match (self.org_id, self.role) {
            (Some(org_id), Some(role)) => Some((org_id, role)),
            _ => None,
        }
    }

    /// Checks if token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Expiration as a timestamp
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

/// Signs claims into a token string
///
/// # Errors
///
/// Returns `JwtError::CreateError` if encoding fails
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates a token and extracts its claims
///
/// Verifies signature, expiration, not-before and issuer.
///
/// # Errors
///
/// - `JwtError::Expired` when `exp` has passed
/// - `JwtError::InvalidIssuer` when `iss` is not `"phonoplan"`
/// - `JwtError::ValidationError` for anything else (bad signature, malformed token)
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[TOKEN_ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}
