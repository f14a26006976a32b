pub mod auth_service;
pub use auth_service::{AuthError, AuthService, IssuedToken};

pub mod auth_service_impl;
pub use auth_service_impl::SeaOrmAuthService;
