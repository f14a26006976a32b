use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::permissions;
use super::shapes::{UserAction, UserDto, UserShape};
use super::validation::{validate_password, validate_user_id, validate_username};
use super::{ApiError, AppState};
use crate::db::{NewUser, UserChanges};

/// Writable fields of the user resource.
///
/// Every field deserializes as optional; each operation enforces its own
/// requiredness so a missing field surfaces as a 400 with field detail
/// instead of an extractor rejection.
#[derive(Debug, Default, Deserialize)]
pub struct UserPayload {
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
}

impl UserPayload {
    /// Full writes require username and password. Names default to empty
    /// strings and the active flag to true, as on create.
    fn require_write_fields(&self) -> Result<(String, String), ApiError> {
        let mut missing: BTreeMap<String, Vec<String>> = BTreeMap::new();
        if self.username.is_none() {
            missing.insert(
                "username".to_string(),
                vec!["This field is required.".to_string()],
            );
        }
        if self.password.is_none() {
            missing.insert(
                "password".to_string(),
                vec!["This field is required.".to_string()],
            );
        }
        if !missing.is_empty() {
            return Err(ApiError::FieldErrors(missing));
        }

        Ok((
            self.username.clone().unwrap_or_default(),
            self.password.clone().unwrap_or_default(),
        ))
    }
}

/// Reject a username already owned by a different user. The store's unique
/// index remains the backstop for writes racing past this check.
async fn ensure_username_free(
    state: &AppState,
    username: &str,
    current_id: Option<i32>,
) -> Result<(), ApiError> {
    let existing = state
        .store()
        .get_user_by_username(username)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    match existing {
        Some(user) if Some(user.id) != current_id => Err(ApiError::field(
            "username",
            "A user with that username already exists.",
        )),
        _ => Ok(()),
    }
}

/// GET /api/v1/users/
pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
) -> Result<Json<Vec<UserDto>>, ApiError> {
    permissions::check(&actor, UserAction::List)?;

    let users = state
        .store()
        .list_users()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let shape = UserShape::for_action(UserAction::List);
    Ok(Json(users.iter().map(|u| shape.project(u)).collect()))
}

/// POST /api/v1/users/
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<UserDto>), ApiError> {
    permissions::check(&actor, UserAction::Create)?;

    let Json(payload) = payload.map_err(|e| ApiError::validation(e.body_text()))?;
    let (username, password) = payload.require_write_fields()?;
    validate_username(&username)?;
    validate_password(&password)?;
    ensure_username_free(&state, &username, None).await?;

    let user = state
        .store()
        .create_user(
            NewUser {
                username,
                first_name: payload.first_name.unwrap_or_default(),
                last_name: payload.last_name.unwrap_or_default(),
                password,
                is_active: payload.is_active.unwrap_or(true),
                is_superuser: false,
            },
            state.security(),
        )
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let shape = UserShape::for_action(UserAction::Create);
    Ok((StatusCode::CREATED, Json(shape.project(&user))))
}

/// GET /api/v1/users/{id}/
pub async fn retrieve(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<Json<UserDto>, ApiError> {
    permissions::check(&actor, UserAction::Retrieve)?;
    validate_user_id(id)?;

    let user = state
        .store()
        .get_user(id)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::user_not_found(id))?;

    let shape = UserShape::for_action(UserAction::Retrieve);
    Ok(Json(shape.project(&user)))
}

/// PUT /api/v1/users/{id}/
/// Full replace: all writable fields apply, missing names and flags take
/// their creation defaults.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(id): Path<i32>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> Result<Json<UserDto>, ApiError> {
    permissions::check(&actor, UserAction::Update)?;
    validate_user_id(id)?;

    // Resolve the target before reading the body: a stale identifier is 404
    // regardless of payload validity.
    if state
        .store()
        .get_user(id)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .is_none()
    {
        return Err(ApiError::user_not_found(id));
    }

    let Json(payload) = payload.map_err(|e| ApiError::validation(e.body_text()))?;
    let (username, password) = payload.require_write_fields()?;
    validate_username(&username)?;
    validate_password(&password)?;
    ensure_username_free(&state, &username, Some(id)).await?;

    let changes = UserChanges {
        username: Some(username),
        first_name: Some(payload.first_name.unwrap_or_default()),
        last_name: Some(payload.last_name.unwrap_or_default()),
        password: Some(password),
        is_active: Some(payload.is_active.unwrap_or(true)),
    };

    let user = state
        .store()
        .update_user(id, changes, state.security())
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::user_not_found(id))?;

    let shape = UserShape::for_action(UserAction::Update);
    Ok(Json(shape.project(&user)))
}

/// PATCH /api/v1/users/{id}/
/// Partial replace: only the submitted fields change.
pub async fn partial_update(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(id): Path<i32>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> Result<Json<UserDto>, ApiError> {
    permissions::check(&actor, UserAction::PartialUpdate)?;
    validate_user_id(id)?;

    if state
        .store()
        .get_user(id)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .is_none()
    {
        return Err(ApiError::user_not_found(id));
    }

    let Json(payload) = payload.map_err(|e| ApiError::validation(e.body_text()))?;

    if let Some(ref username) = payload.username {
        validate_username(username)?;
        ensure_username_free(&state, username, Some(id)).await?;
    }
    if let Some(ref password) = payload.password {
        validate_password(password)?;
    }

    let changes = UserChanges {
        username: payload.username,
        first_name: payload.first_name,
        last_name: payload.last_name,
        password: payload.password,
        is_active: payload.is_active,
    };

    let user = state
        .store()
        .update_user(id, changes, state.security())
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::user_not_found(id))?;

    let shape = UserShape::for_action(UserAction::PartialUpdate);
    Ok(Json(shape.project(&user)))
}

/// DELETE /api/v1/users/{id}/
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(actor)): Extension<CurrentUser>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    permissions::check(&actor, UserAction::Destroy)?;
    validate_user_id(id)?;

    let deleted = state
        .store()
        .delete_user(id)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    if !deleted {
        return Err(ApiError::user_not_found(id));
    }

    Ok(StatusCode::NO_CONTENT)
}
