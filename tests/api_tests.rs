use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode},
};
use http_body_util::BodyExt;
use rosterd::config::Config;
use serde_json::{Value, json};
use tower::ServiceExt;

/// Credentials seeded by the initial migration
const ADMIN_USERNAME: &str = "admin";
const ADMIN_PASSWORD: &str = "password";

async fn spawn_app() -> Router {
    let mut config = Config::default();
    config.general.database_path = "sqlite::memory:".to_string();
    // A single pooled connection keeps the in-memory database alive
    // across sequential requests.
    config.general.max_db_connections = 1;
    config.general.min_db_connections = 1;
    // Cheap hashing keeps the suite fast; the seeded admin hash is
    // unaffected (its params travel inside the hash string).
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;

    let state = rosterd::api::create_app_state(config)
        .await
        .expect("Failed to create app state");
    rosterd::api::router(state)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Token {token}"));
    }

    let request = if let Some(body) = body {
        builder
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap()
    } else {
        builder.body(Body::empty()).unwrap()
    };

    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn obtain_token(app: &Router, username: &str, password: &str) -> String {
    let response = send(
        app,
        "POST",
        "/api/v1/api-token-auth/",
        None,
        Some(json!({"username": username, "password": password})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    body_json(response).await["token"]
        .as_str()
        .expect("token missing from issuance response")
        .to_string()
}

async fn create_user(app: &Router, admin_token: &str, payload: Value) -> Value {
    let response = send(app, "POST", "/api/v1/users/", Some(admin_token), Some(payload)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn test_token_auth_returns_stable_token() {
    let app = spawn_app().await;

    let first = obtain_token(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    assert_eq!(first.len(), 40);
    assert!(first.chars().all(|c| c.is_ascii_hexdigit()));

    let second = obtain_token(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_token_auth_rejects_invalid_credentials() {
    let app = spawn_app().await;

    let response = send(
        &app,
        "POST",
        "/api/v1/api-token-auth/",
        None,
        Some(json!({"username": ADMIN_USERNAME, "password": "wrong"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await.get("token").is_none());

    let response = send(
        &app,
        "POST",
        "/api/v1/api-token-auth/",
        None,
        Some(json!({"username": "nobody", "password": ADMIN_PASSWORD})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_token_auth_requires_fields() {
    let app = spawn_app().await;

    let response = send(&app, "POST", "/api/v1/api-token-auth/", None, Some(json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(body["fields"]["username"].is_array());
    assert!(body["fields"]["password"].is_array());
}

#[tokio::test]
async fn test_users_endpoints_require_token() {
    let app = spawn_app().await;

    for (method, uri) in [
        ("GET", "/api/v1/users/"),
        ("POST", "/api/v1/users/"),
        ("GET", "/api/v1/users/1/"),
        ("PUT", "/api/v1/users/1/"),
        ("PATCH", "/api/v1/users/1/"),
        ("DELETE", "/api/v1/users/1/"),
    ] {
        let response = send(&app, method, uri, None, None).await;
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "{method} {uri} without credentials"
        );
    }

    let response = send(&app, "GET", "/api/v1/users/", Some("not-a-real-token"), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Only the Token scheme is accepted.
    let token = obtain_token(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/users/")
                .header("Authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_list_users_read_shape() {
    let app = spawn_app().await;
    let token = obtain_token(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let response = send(&app, "GET", "/api/v1/users/", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let users = body.as_array().expect("list response is a sequence");
    assert_eq!(users.len(), 1);

    let admin = &users[0];
    assert_eq!(admin["id"], 1);
    assert_eq!(admin["username"], ADMIN_USERNAME);
    assert_eq!(admin["is_active"], true);
    assert!(admin.get("password").is_none());
    assert!(admin.get("password_hash").is_none());
}

#[tokio::test]
async fn test_create_user_echoes_write_shape() {
    let app = spawn_app().await;
    let token = obtain_token(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let created = create_user(
        &app,
        &token,
        json!({
            "username": "username1",
            "first_name": "first_name1",
            "last_name": "last_name1",
            "password": "password1",
            "is_active": true,
        }),
    )
    .await;

    // Write shape: submitted fields minus the password, no identifier.
    assert_eq!(
        created,
        json!({
            "username": "username1",
            "first_name": "first_name1",
            "last_name": "last_name1",
            "is_active": true,
        })
    );

    // The new user retrieves with the read shape under the next identifier.
    let response = send(&app, "GET", "/api/v1/users/2/", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["id"], 2);
    assert_eq!(body["username"], "username1");
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn test_create_duplicate_username_is_field_error() {
    let app = spawn_app().await;
    let token = obtain_token(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    create_user(
        &app,
        &token,
        json!({"username": "username1", "password": "password1"}),
    )
    .await;

    let response = send(
        &app,
        "POST",
        "/api/v1/users/",
        Some(&token),
        Some(json!({"username": "username1", "password": "other"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(body["fields"]["username"].is_array());

    // No second record was created.
    let response = send(&app, "GET", "/api/v1/users/", Some(&token), None).await;
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_create_missing_fields_is_field_error() {
    let app = spawn_app().await;
    let token = obtain_token(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let response = send(
        &app,
        "POST",
        "/api/v1/users/",
        Some(&token),
        Some(json!({"first_name": "nameless"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(body["fields"]["username"].is_array());
    assert!(body["fields"]["password"].is_array());
}

#[tokio::test]
async fn test_retrieve_unknown_id_is_not_found() {
    let app = spawn_app().await;
    let token = obtain_token(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let response = send(&app, "GET", "/api/v1/users/99/", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_full_update() {
    let app = spawn_app().await;
    let token = obtain_token(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    create_user(
        &app,
        &token,
        json!({
            "username": "username1",
            "first_name": "first_name1",
            "last_name": "last_name1",
            "password": "password1",
        }),
    )
    .await;

    // Full replace: unsubmitted names reset to their creation defaults.
    let response = send(
        &app,
        "PUT",
        "/api/v1/users/2/",
        Some(&token),
        Some(json!({"username": "renamed", "password": "password2"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "username": "renamed",
            "first_name": "",
            "last_name": "",
            "is_active": true,
        })
    );

    let response = send(&app, "GET", "/api/v1/users/2/", Some(&token), None).await;
    let body = body_json(response).await;
    assert_eq!(body["username"], "renamed");
    assert_eq!(body["first_name"], "");

    // Unknown identifier is 404 regardless of payload validity.
    let response = send(
        &app,
        "PUT",
        "/api/v1/users/99/",
        Some(&token),
        Some(json!({"username": "ghost", "password": "password"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Missing required fields on an existing target is a validation error.
    let response = send(
        &app,
        "PUT",
        "/api/v1/users/2/",
        Some(&token),
        Some(json!({"first_name": "only"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_partial_update() {
    let app = spawn_app().await;
    let token = obtain_token(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    create_user(
        &app,
        &token,
        json!({
            "username": "username1",
            "first_name": "first_name1",
            "last_name": "last_name1",
            "password": "password1",
        }),
    )
    .await;

    let response = send(
        &app,
        "PATCH",
        "/api/v1/users/2/",
        Some(&token),
        Some(json!({"first_name": "renamed"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "username": "username1",
            "first_name": "renamed",
            "last_name": "last_name1",
            "is_active": true,
        })
    );

    let response = send(
        &app,
        "PATCH",
        "/api/v1/users/99/",
        Some(&token),
        Some(json!({"first_name": "ghost"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_password_change_keeps_token_stable() {
    let app = spawn_app().await;
    let admin_token = obtain_token(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    create_user(
        &app,
        &admin_token,
        json!({"username": "username1", "password": "password1"}),
    )
    .await;

    let user_token = obtain_token(&app, "username1", "password1").await;

    let response = send(
        &app,
        "PATCH",
        "/api/v1/users/2/",
        Some(&admin_token),
        Some(json!({"password": "password2"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // The old password no longer verifies; the token key never rotates.
    let response = send(
        &app,
        "POST",
        "/api/v1/api-token-auth/",
        None,
        Some(json!({"username": "username1", "password": "password1"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let reissued = obtain_token(&app, "username1", "password2").await;
    assert_eq!(reissued, user_token);
}

#[tokio::test]
async fn test_non_superuser_is_forbidden() {
    let app = spawn_app().await;
    let admin_token = obtain_token(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    create_user(
        &app,
        &admin_token,
        json!({"username": "username1", "password": "password1"}),
    )
    .await;

    let user_token = obtain_token(&app, "username1", "password1").await;

    for (method, uri, body) in [
        ("GET", "/api/v1/users/", None),
        (
            "POST",
            "/api/v1/users/",
            Some(json!({"username": "username2", "password": "password2"})),
        ),
        ("GET", "/api/v1/users/1/", None),
        (
            "PUT",
            "/api/v1/users/1/",
            Some(json!({"username": "admin2", "password": "password"})),
        ),
        ("PATCH", "/api/v1/users/1/", Some(json!({"first_name": "x"}))),
        ("DELETE", "/api/v1/users/1/", None),
    ] {
        let response = send(&app, method, uri, Some(&user_token), body).await;
        assert_eq!(
            response.status(),
            StatusCode::FORBIDDEN,
            "{method} {uri} with a plain user token"
        );
    }
}

#[tokio::test]
async fn test_inactive_user_cannot_authenticate() {
    let app = spawn_app().await;
    let admin_token = obtain_token(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    create_user(
        &app,
        &admin_token,
        json!({"username": "username1", "password": "password1"}),
    )
    .await;

    let user_token = obtain_token(&app, "username1", "password1").await;

    let response = send(
        &app,
        "PATCH",
        "/api/v1/users/2/",
        Some(&admin_token),
        Some(json!({"is_active": false})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // The existing token stops authenticating (401, not 403)...
    let response = send(&app, "GET", "/api/v1/users/", Some(&user_token), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // ...and no new token can be issued.
    let response = send(
        &app,
        "POST",
        "/api/v1/api-token-auth/",
        None,
        Some(json!({"username": "username1", "password": "password1"})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_delete_user() {
    let app = spawn_app().await;
    let token = obtain_token(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    create_user(
        &app,
        &token,
        json!({"username": "username1", "password": "password1"}),
    )
    .await;

    let response = send(&app, "DELETE", "/api/v1/users/2/", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.is_empty());

    let response = send(&app, "GET", "/api/v1/users/2/", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = send(&app, "DELETE", "/api/v1/users/2/", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// The end-to-end scenario from the original contract: create as an
/// authenticated superuser, fail unauthenticated retrieval, then patch.
#[tokio::test]
async fn test_create_then_patch_scenario() {
    let app = spawn_app().await;
    let token = obtain_token(&app, ADMIN_USERNAME, ADMIN_PASSWORD).await;

    let created = create_user(
        &app,
        &token,
        json!({
            "username": "username1",
            "first_name": "first_name1",
            "last_name": "last_name1",
            "password": "password1",
            "is_active": true,
        }),
    )
    .await;
    assert_eq!(created["username"], "username1");

    let response = send(&app, "GET", "/api/v1/users/2/", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &app,
        "PATCH",
        "/api/v1/users/2/",
        Some(&token),
        Some(json!({
            "username": "username",
            "first_name": "first_name1",
            "last_name": "last_name1",
            "password": "password",
            "is_active": true,
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "username": "username",
            "first_name": "first_name1",
            "last_name": "last_name1",
            "is_active": true,
        })
    );
}
