/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and verification
/// - [`jwt`]: Session token issuance and validation
/// - [`middleware`]: Axum session layer and `Session` extractor
/// - [`authorization`]: Role gate (`require_role`, `require_member`)
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id, 19 MiB memory, 2 iterations
/// - **Session Tokens**: HS256 JWTs carrying user, organization and role
/// - **Constant-time Comparison**: Password and signature checks
///
/// # Example
///
/// ```no_run
/// use phonoplan_shared::auth::password::{hash_password, verify_password};
/// use phonoplan_shared::auth::jwt::{create_token, Claims};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("senha-segura")?;
/// assert!(verify_password("senha-segura", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), "prof@escola.br", None);
/// let token = create_token(&claims, "your-secret-key-at-least-32-bytes-long")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
