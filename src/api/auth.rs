use axum::{
    Json,
    extract::{Request, State, rejection::JsonRejection},
    http::HeaderMap,
    middleware::Next,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{ApiError, AppState};
use crate::db::User;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ObtainTokenRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Authenticated user for the current request, inserted by the middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

// ============================================================================
// Middleware
// ============================================================================

/// Authentication middleware for the user resource routes.
///
/// Accepts exactly one credential form: `Authorization: Token <key>`.
/// A missing header, an unknown key, and a key owned by an inactive user
/// are all Unauthorized; permission checks happen later, per operation.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let Some(key) = extract_token_key(&headers) else {
        return Err(ApiError::Unauthorized(
            "Authentication credentials were not provided.".to_string(),
        ));
    };

    let user = state.auth().authenticate(&key).await?;

    let Some(user) = user else {
        return Err(ApiError::Unauthorized("Invalid token.".to_string()));
    };

    tracing::Span::current().record("user_id", user.username.as_str());
    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}

/// Extract the bearer key from the `Authorization: Token <key>` header
fn extract_token_key(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers.get("Authorization")?;
    let auth_str = auth_header.to_str().ok()?;
    let key = auth_str.strip_prefix("Token ")?;

    Some(key.trim().to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/api-token-auth/
/// Verify username and password, return the user's bearer token.
/// This endpoint requires no prior credential; it produces one.
pub async fn obtain_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ObtainTokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| ApiError::validation(e.body_text()))?;

    let mut missing: BTreeMap<String, Vec<String>> = BTreeMap::new();
    if payload.username.is_empty() {
        missing.insert(
            "username".to_string(),
            vec!["This field is required.".to_string()],
        );
    }
    if payload.password.is_empty() {
        missing.insert(
            "password".to_string(),
            vec!["This field is required.".to_string()],
        );
    }
    if !missing.is_empty() {
        return Err(ApiError::FieldErrors(missing));
    }

    let token = state
        .auth()
        .issue_token(&payload.username, &payload.password)
        .await?;

    Ok(Json(TokenResponse { token: token.key }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_token_key() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token_key(&headers), None);

        headers.insert("Authorization", HeaderValue::from_static("Token abc123"));
        assert_eq!(extract_token_key(&headers), Some("abc123".to_string()));

        headers.insert("Authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_token_key(&headers), None);
    }
}
