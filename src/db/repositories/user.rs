use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tokio::task;

use crate::config::SecurityConfig;
use crate::entities::users;

/// User record returned from the repository (without the password hash).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            first_name: model.first_name,
            last_name: model.last_name,
            is_active: model.is_active,
            is_superuser: model.is_superuser,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Input for the creation operation. The plaintext password is hashed here
/// and never stored.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub is_active: bool,
    pub is_superuser: bool,
}

/// Field-wise changes for a full or partial replace. `None` leaves the
/// stored value untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// List all users ordered by identifier.
    pub async fn list(&self) -> Result<Vec<User>> {
        let users = users::Entity::find()
            .order_by_asc(users::Column::Id)
            .all(&self.conn)
            .await
            .context("Failed to list users")?;

        Ok(users.into_iter().map(User::from).collect())
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    /// Get user by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    /// Create a user, hashing the plaintext password.
    ///
    /// Username uniqueness is enforced by the store's unique index; callers
    /// pre-check to surface a validation error instead of a constraint hit.
    pub async fn create(&self, new: NewUser, config: &SecurityConfig) -> Result<User> {
        let password = new.password;
        let hash_config = config.clone();
        let password_hash =
            task::spawn_blocking(move || hash_password(&password, Some(&hash_config)))
                .await
                .context("Password hashing task panicked")??;

        let now = chrono::Utc::now().to_rfc3339();

        let user = users::ActiveModel {
            username: Set(new.username),
            first_name: Set(new.first_name),
            last_name: Set(new.last_name),
            password_hash: Set(password_hash),
            is_active: Set(new.is_active),
            is_superuser: Set(new.is_superuser),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = user.insert(&self.conn).await.context("Failed to insert user")?;

        Ok(User::from(model))
    }

    /// Apply a full or partial replace. Returns `None` when the identifier
    /// does not resolve to an existing user.
    pub async fn update(
        &self,
        id: i32,
        changes: UserChanges,
        config: &SecurityConfig,
    ) -> Result<Option<User>> {
        let Some(user) = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user for update")?
        else {
            return Ok(None);
        };

        let mut active: users::ActiveModel = user.into();

        if let Some(username) = changes.username {
            active.username = Set(username);
        }
        if let Some(first_name) = changes.first_name {
            active.first_name = Set(first_name);
        }
        if let Some(last_name) = changes.last_name {
            active.last_name = Set(last_name);
        }
        if let Some(is_active) = changes.is_active {
            active.is_active = Set(is_active);
        }
        if let Some(password) = changes.password {
            let hash_config = config.clone();
            let new_hash =
                task::spawn_blocking(move || hash_password(&password, Some(&hash_config)))
                    .await
                    .context("Password hashing task panicked")??;
            active.password_hash = Set(new_hash);
        }

        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let model = active.update(&self.conn).await.context("Failed to update user")?;

        Ok(Some(User::from(model)))
    }

    /// Delete a user. Returns `false` when the identifier does not resolve.
    /// The user's token goes with it via the store's cascade.
    pub async fn delete(&self, id: i32) -> Result<bool> {
        let result = users::Entity::delete_by_id(id)
            .exec(&self.conn)
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected > 0)
    }

    /// Verify a username/password pair and return the matching user.
    ///
    /// Only active accounts verify. Argon2 runs on a blocking task because
    /// it would stall the async runtime otherwise.
    pub async fn verify_password(&self, username: &str, password: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            return Ok(None);
        };

        if !user.is_active {
            return Ok(None);
        }

        let password_hash = user.password_hash.clone();
        let password = password.to_string();

        let is_valid = task::spawn_blocking(move || {
            let parsed_hash = PasswordHash::new(&password_hash)
                .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

            let argon2 = Argon2::default();
            Ok::<bool, anyhow::Error>(
                argon2
                    .verify_password(password.as_bytes(), &parsed_hash)
                    .is_ok(),
            )
        })
        .await
        .context("Password verification task panicked")??;

        Ok(is_valid.then(|| User::from(user)))
    }
}

/// Hash a password using Argon2id with optional custom params.
/// If config is None, uses default params.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None, // output length (use default)
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}
