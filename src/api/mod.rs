use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod auth;
mod error;
mod observability;
mod permissions;
mod shapes;
mod users;
mod validation;

pub use error::ApiError;
pub use shapes::{ReadUser, UserAction, UserDto, UserShape, WriteUser};

use crate::config::{Config, SecurityConfig};
use crate::db::Store;
use crate::services::{AuthService, SeaOrmAuthService};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,

    pub store: Store,

    pub auth_service: Arc<dyn AuthService>,
}

impl AppState {
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub const fn auth(&self) -> &Arc<dyn AuthService> {
        &self.auth_service
    }

    #[must_use]
    pub const fn security(&self) -> &SecurityConfig {
        &self.config.security
    }
}

pub async fn create_app_state(config: Config) -> anyhow::Result<Arc<AppState>> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let auth_service: Arc<dyn AuthService> = Arc::new(SeaOrmAuthService::new(store.clone()));

    Ok(Arc::new(AppState {
        config,
        store,
        auth_service,
    }))
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state.config.server.cors_allowed_origins.clone();

    let protected_routes = create_protected_router(state.clone());

    let api_router = Router::new()
        .merge(protected_routes)
        .route("/api-token-auth/", post(auth::obtain_token))
        .with_state(state);

    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api/v1", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::logging_middleware))
}

fn create_protected_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/users/", get(users::list).post(users::create))
        .route(
            "/users/{id}/",
            get(users::retrieve)
                .put(users::update)
                .patch(users::partial_update)
                .delete(users::destroy),
        )
        .route_layer(middleware::from_fn_with_state(state, auth::auth_middleware))
}
