use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use relaychat_config::AuthConfig;
use relaychat_database::{DatabaseError, User, UserRepository};
use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};

pub mod token;

pub use token::TokenIssuer;

const MAX_USERNAME_LEN: usize = 32;

/// Who is on the other end of a connection or request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub id: String,
    pub username: String,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            id: user.public_id.clone(),
            username: user.username.clone(),
        }
    }
}

/// A freshly authenticated identity together with its signed token.
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub token: String,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credential: {0}")]
    InvalidCredential(String),
    #[error("username is already taken")]
    UsernameTaken,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] argon2::password_hash::Error),
    #[error("token encoding failed: {0}")]
    TokenEncoding(jsonwebtoken::errors::Error),
}

#[derive(Clone)]
pub struct Authenticator {
    users: UserRepository,
    tokens: TokenIssuer,
}

impl Authenticator {
    pub fn new(pool: SqlitePool, config: &AuthConfig) -> Self {
        Self {
            users: UserRepository::new(pool),
            tokens: TokenIssuer::new(config),
        }
    }

    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Turn a presented token into an identity, or `InvalidCredential`.
    pub fn resolve(&self, token: &str) -> Result<Identity, AuthError> {
        self.tokens.resolve(token)
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let username = validate_username(username)?;
        if password.is_empty() {
            return Err(AuthError::InvalidInput("password must not be empty".into()));
        }

        let password_hash = hash_password(password)?;
        let user = self
            .users
            .create(username, &password_hash)
            .await
            .map_err(|error| match error {
                DatabaseError::Duplicate(_) => AuthError::UsernameTaken,
                other => AuthError::Database(other),
            })?;

        info!(user = %user.public_id, "account registered");
        self.session_for(&user)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AuthError> {
        let Some(user) = self.users.find_by_username(username.trim()).await? else {
            debug!(username, "login for unknown username");
            return Err(AuthError::InvalidCredentials);
        };

        let stored_hash = PasswordHash::new(&user.password_hash)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &stored_hash)
            .map_err(|_| AuthError::InvalidCredentials)?;

        debug!(user = %user.public_id, "login succeeded");
        self.session_for(&user)
    }

    fn session_for(&self, user: &User) -> Result<Session, AuthError> {
        let identity = Identity::from(user);
        let token = self.tokens.issue(&identity)?;
        Ok(Session { identity, token })
    }
}

fn validate_username(username: &str) -> Result<&str, AuthError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(AuthError::InvalidInput("username must not be empty".into()));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AuthError::InvalidInput(format!(
            "username must be at most {MAX_USERNAME_LEN} characters"
        )));
    }
    if username.chars().any(char::is_control) {
        return Err(AuthError::InvalidInput(
            "username must not contain control characters".into(),
        ));
    }
    Ok(username)
}

fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}
