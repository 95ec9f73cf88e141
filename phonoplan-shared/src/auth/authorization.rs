/// Role gate
///
/// Pure checks that turn an optional session into an organization scope.
///
/// # Permission Model
///
/// 1. **Session**: a valid session token must be present
/// 2. **Tenancy**: the session must belong to an organization
/// 3. **Role**: the session's role must be one of the roles a route allows
///
/// Failing (1) or (2) is `Unauthenticated` (401); failing (3) is `Forbidden` (403).
///
/// # Example
///
/// ```
/// use phonoplan_shared::auth::authorization::{require_role, AuthzError};
/// use phonoplan_shared::auth::middleware::{AuthContext, Tenancy};
/// use phonoplan_shared::models::membership::Role;
/// use uuid::Uuid;
///
/// let session = AuthContext {
///     user_id: Uuid::new_v4(),
///     email: "prof@escola.br".to_string(),
///     tenancy: Tenancy::Member { org_id: Uuid::new_v4(), role: Role::Teacher },
/// };
///
/// assert!(require_role(Some(&session), &[Role::Admin, Role::Teacher]).is_ok());
/// assert!(matches!(require_role(Some(&session), &[Role::Admin]), Err(AuthzError::Forbidden)));
/// assert!(matches!(require_role(None, &[Role::Admin]), Err(AuthzError::Unauthenticated)));
/// ```

use uuid::Uuid;

use super::middleware::{AuthContext, Tenancy};
use crate::models::membership::Role;

/// Every role
pub const ANY_ROLE: &[Role] = &[Role::Admin, Role::Teacher];

/// Administrators only
pub const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Error type for authorization checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthzError {
    /// No session, or the session belongs to no organization
    #[error("Não autorizado.")]
    Unauthenticated,

    /// The session's role is not allowed here
    #[error("Acesso negado para este perfil.")]
    Forbidden,
}

/// Organization scope of an authorized request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberScope {
    pub user_id: Uuid,
    pub org_id: Uuid,
    pub role: Role,
}

impl MemberScope {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Requires a session whose role is in `allowed`
pub fn require_role(
    session: Option<&AuthContext>,
    allowed: &[Role],
) -> Result<MemberScope, AuthzError> {
    let scope = require_member(session)?;

    if !allowed.contains(&scope.role) {
        return Err(AuthzError::Forbidden);
    }

    Ok(scope)
}

/// Requires a session that belongs to an organization, any role
pub fn require_member(session: Option<&AuthContext>) -> Result<MemberScope, AuthzError> {
    let session = session.ok_or(AuthzError::Unauthenticated)?;

    match session.tenancy {
        Tenancy::Member { org_id, role } => Ok(MemberScope {
            user_id: session.user_id,
            org_id,
            role,
        }),
        Tenancy::Unassigned => Err(AuthzError::Unauthenticated),
    }
}
