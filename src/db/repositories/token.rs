use anyhow::{Context, Result};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use super::user::User;
use crate::entities::{tokens, users};

pub struct TokenRepository {
    conn: DatabaseConnection,
}

impl TokenRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Return the user's token, creating it on first request.
    ///
    /// A key, once issued, is stable for that user.
    pub async fn get_or_create(&self, user_id: i32) -> Result<tokens::Model> {
        if let Some(existing) = tokens::Entity::find()
            .filter(tokens::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await
            .context("Failed to query token by user")?
        {
            return Ok(existing);
        }

        let token = tokens::ActiveModel {
            key: Set(generate_token_key()),
            user_id: Set(user_id),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
        };

        token.insert(&self.conn).await.context("Failed to insert token")
    }

    /// Resolve a bearer key to its owning user.
    pub async fn find_user(&self, key: &str) -> Result<Option<User>> {
        let row = tokens::Entity::find_by_id(key)
            .find_also_related(users::Entity)
            .one(&self.conn)
            .await
            .context("Failed to query user by token")?;

        Ok(row.and_then(|(_, user)| user).map(User::from))
    }
}

/// Generate a random token key (40 character hex string)
#[must_use]
pub fn generate_token_key() -> String {
    use rand::Rng;

    let mut rng = rand::rng();
    let bytes: [u8; 20] = rng.random();

    bytes.iter().fold(String::with_capacity(40), |mut acc, b| {
        use std::fmt::Write;
        let _ = write!(acc, "{b:02x}");
        acc
    })
}
