//! `SeaORM` implementation of the `AuthService` trait.

use crate::db::Store;
use crate::db::User;
use crate::services::auth_service::{AuthError, AuthService, IssuedToken};
use async_trait::async_trait;

pub struct SeaOrmAuthService {
    store: Store,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn issue_token(&self, username: &str, password: &str) -> Result<IssuedToken, AuthError> {
        // Inactive users cannot log in; verify_password filters them out.
        let user = self
            .store
            .verify_user_password(username, password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let token = self.store.get_or_create_token(user.id).await?;

        Ok(IssuedToken { key: token.key })
    }

    async fn authenticate(&self, key: &str) -> Result<Option<User>, AuthError> {
        let user = self.store.get_user_for_token(key).await?;

        Ok(user.filter(|u| u.is_active))
    }
}
