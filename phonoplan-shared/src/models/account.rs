/// Account registration
///
/// A registration creates an organization, its first user, and an ADMIN
/// membership linking them, all in one transaction.
///
/// # Example
///
/// ```no_run
/// use phonoplan_shared::models::account::{register_account, NewAccount};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let account = register_account(&pool, NewAccount {
///     email: "diretora@escola.br".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     org_name: "Escola Municipal Aurora".to_string(),
/// }).await?;
///
/// println!("Organization {}", account.organization.id);
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;

use super::membership::{CreateMembership, Membership, Role};
use super::organization::Organization;
use super::user::{normalize_email, CreateUser, User};

const UNIQUE_VIOLATION: &str = "23505";

/// Error type for registration
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// A user with this email already exists
    #[error("Email already registered")]
    EmailTaken,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Registration input; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub org_name: String,
}

/// Rows created by a registration
#[derive(Debug, Clone)]
pub struct RegisteredAccount {
    pub organization: Organization,
    pub user: User,
    pub membership: Membership,
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

/// Creates organization, user and ADMIN membership atomically
///
/// # Errors
///
/// - `RegistrationError::EmailTaken` if the (normalized) email exists,
///   including when a concurrent registration wins the race
/// - `RegistrationError::Database` otherwise
pub async fn register_account(
    pool: &PgPool,
    account: NewAccount,
) -> Result<RegisteredAccount, RegistrationError> {
    let email = normalize_email(&account.email);
    let mut tx = pool.begin().await?;

    if User::email_exists(&mut *tx, &email).await? {
        return Err(RegistrationError::EmailTaken);
    }

    let organization = Organization::create(&mut *tx, account.org_name.trim()).await?;

    let user = User::create(
        &mut *tx,
        CreateUser {
            email,
            password_hash: account.password_hash,
        },
    )
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            RegistrationError::EmailTaken
        } else {
            RegistrationError::Database(e)
        }
    })?;

    let membership = Membership::create(
        &mut *tx,
        CreateMembership {
            org_id: organization.id,
            user_id: user.id,
            role: Role::Admin,
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(org_id = %organization.id, user_id = %user.id, "Account registered");

    Ok(RegisteredAccount {
        organization,
        user,
        membership,
    })
}
