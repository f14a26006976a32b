//! Domain service for token-based authentication.
//!
//! Covers credential verification, token issuance, and bearer-token
//! resolution. Token storage and password hashing live in the store.

use thiserror::Error;

use crate::db::User;

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Result of a successful token issuance.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub key: String,
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Verifies credentials and returns the user's bearer token, creating it
    /// on first use. The key is stable across repeated issuance.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] when the pair does not match
    /// an existing active user.
    async fn issue_token(&self, username: &str, password: &str) -> Result<IssuedToken, AuthError>;

    /// Resolves a bearer key to its owning user.
    ///
    /// Returns `None` for unknown keys and for keys owned by inactive users.
    async fn authenticate(&self, key: &str) -> Result<Option<User>, AuthError>;
}
