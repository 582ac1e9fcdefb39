//! User service
//!
//! Account business logic:
//! - Signup with username/email uniqueness and basic input rules
//! - Login/logout backed by server-side sessions
//! - Resolving a session token to a user (with groups)
//! - Joining the authors group

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Session, User, AUTHORS_GROUP};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::Duration;
use std::sync::Arc;

/// Default session lifetime in days
pub const DEFAULT_SESSION_TTL_DAYS: i64 = 7;

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 50;
const PASSWORD_MIN_LEN: usize = 8;

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Invalid credentials
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Username or email already taken
    #[error("User already exists: {0}")]
    UserExists(String),

    #[error("User not found")]
    NotFound,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for accounts and sessions
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_ttl: Duration,
}

impl UserService {
    /// Create a user service with the default session lifetime
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self::with_session_ttl_days(user_repo, session_repo, DEFAULT_SESSION_TTL_DAYS)
    }

    /// Create a user service with a custom session lifetime
    pub fn with_session_ttl_days(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        ttl_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_ttl: Duration::days(ttl_days),
        }
    }

    /// Session lifetime handed out by [`login`](Self::login)
    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    /// Register a new user. New users belong to no group.
    ///
    /// # Errors
    ///
    /// - `ValidationError` if a field breaks the input rules
    /// - `UserExists` if the username or email is taken
    pub async fn register(&self, input: CreateUserInput) -> Result<User, UserServiceError> {
        let input = CreateUserInput {
            username: input.username.trim().to_string(),
            email: input.email.trim().to_string(),
            password: input.password,
        };
        validate_signup(&input)?;

        if self
            .user_repo
            .exists_by_username(&input.username)
            .await
            .context("Failed to check username")?
        {
            return Err(UserServiceError::UserExists(format!(
                "Username '{}' is already taken",
                input.username
            )));
        }
        if self
            .user_repo
            .exists_by_email(&input.email)
            .await
            .context("Failed to check email")?
        {
            return Err(UserServiceError::UserExists(format!(
                "Email '{}' is already registered",
                input.email
            )));
        }

        let password_hash = hash_password(&input.password)?;
        let user = self
            .user_repo
            .create(&input, &password_hash)
            .await
            .context("Failed to create user")?;

        tracing::info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Check credentials and open a new session
    ///
    /// # Errors
    ///
    /// - `AuthenticationError` for an unknown user or a wrong password
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, UserServiceError> {
        let invalid =
            || UserServiceError::AuthenticationError("Invalid username or password".to_string());

        let user = self
            .user_repo
            .get_by_username(username.trim())
            .await
            .context("Failed to get user by username")?
            .ok_or_else(invalid)?;

        if !verify_password(password, &user.password_hash)? {
            tracing::debug!(user_id = user.id, "Rejected login with wrong password");
            return Err(invalid());
        }

        let session = Session::start(user.id, self.session_ttl);
        self.session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        tracing::info!(user_id = user.id, "User logged in");
        Ok(session)
    }

    /// Invalidate a session token
    pub async fn logout(&self, token: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user; expired or unknown tokens yield `None`
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
        let Some(session) = self
            .session_repo
            .get_active(token)
            .await
            .context("Failed to get session")?
        else {
            return Ok(None);
        };

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;
        Ok(user)
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?)
    }

    /// Add the user to the authors group.
    ///
    /// Idempotent: returns `false` if the user already was a member.
    pub async fn become_author(&self, user_id: i64) -> Result<bool, UserServiceError> {
        let added = self
            .user_repo
            .add_to_group(user_id, AUTHORS_GROUP)
            .await
            .context("Failed to join authors group")?;

        if added {
            tracing::info!(user_id, "User joined the authors group");
        }
        Ok(added)
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?)
    }
}

fn validate_signup(input: &CreateUserInput) -> Result<(), UserServiceError> {
    let username_len = input.username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&username_len) {
        return Err(UserServiceError::ValidationError(format!(
            "Username must be {} to {} characters",
            USERNAME_MIN_LEN, USERNAME_MAX_LEN
        )));
    }
    if input.username.chars().any(char::is_whitespace) {
        return Err(UserServiceError::ValidationError(
            "Username cannot contain spaces".to_string(),
        ));
    }
    // An all-digit username would be read as an author id in forms and filters.
    if input.username.bytes().all(|b| b.is_ascii_digit()) {
        return Err(UserServiceError::ValidationError(
            "Username cannot be only digits".to_string(),
        ));
    }
    if !input.email.contains('@') {
        return Err(UserServiceError::ValidationError(
            "Invalid email format".to_string(),
        ));
    }
    if input.password.chars().count() < PASSWORD_MIN_LEN {
        return Err(UserServiceError::ValidationError(format!(
            "Password must be at least {} characters",
            PASSWORD_MIN_LEN
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_service() -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
        )
    }

    fn signup(username: &str, email: &str, password: &str) -> CreateUserInput {
        CreateUserInput {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_creates_user_without_groups() {
        let service = setup_test_service().await;

        let user = service
            .register(signup("alice", "alice@example.com", "password123"))
            .await
            .unwrap();

        assert_eq!(user.username, "alice");
        assert!(user.groups.is_empty());
        assert!(user.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let service = setup_test_service().await;
        service
            .register(signup("alice", "alice@example.com", "password123"))
            .await
            .unwrap();

        let same_name = service
            .register(signup("alice", "other@example.com", "password123"))
            .await;
        assert!(matches!(same_name, Err(UserServiceError::UserExists(_))));

        let same_email = service
            .register(signup("bob", "alice@example.com", "password123"))
            .await;
        assert!(matches!(same_email, Err(UserServiceError::UserExists(_))));
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let service = setup_test_service().await;

        for input in [
            signup("al", "al@example.com", "password123"),
            signup("alice", "not-an-email", "password123"),
            signup("alice", "alice@example.com", "short"),
            signup("12345", "digits@example.com", "password123"),
            signup("al ice", "alice@example.com", "password123"),
        ] {
            let result = service.register(input).await;
            assert!(
                matches!(result, Err(UserServiceError::ValidationError(_))),
                "{:?}",
                result
            );
        }
    }

    #[tokio::test]
    async fn test_login_and_validate_session() {
        let service = setup_test_service().await;
        let user = service
            .register(signup("alice", "alice@example.com", "password123"))
            .await
            .unwrap();

        let session = service.login("alice", "password123").await.unwrap();
        assert_eq!(session.user_id, user.id);

        let current = service.validate_session(&session.id).await.unwrap().unwrap();
        assert_eq!(current.id, user.id);

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let service = setup_test_service().await;
        service
            .register(signup("alice", "alice@example.com", "password123"))
            .await
            .unwrap();

        let wrong_password = service.login("alice", "password124").await;
        assert!(matches!(
            wrong_password,
            Err(UserServiceError::AuthenticationError(_))
        ));

        let unknown = service.login("mallory", "password123").await;
        assert!(matches!(unknown, Err(UserServiceError::AuthenticationError(_))));
    }

    #[tokio::test]
    async fn test_become_author_twice_keeps_single_membership() {
        let service = setup_test_service().await;
        let user = service
            .register(signup("alice", "alice@example.com", "password123"))
            .await
            .unwrap();

        assert!(service.become_author(user.id).await.unwrap());
        assert!(!service.become_author(user.id).await.unwrap());

        let reloaded = service.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.groups, vec![AUTHORS_GROUP.to_string()]);
        assert!(reloaded.is_author());
    }

    #[tokio::test]
    async fn test_validate_unknown_token() {
        let service = setup_test_service().await;
        assert!(service.validate_session("nope").await.unwrap().is_none());
    }
}
