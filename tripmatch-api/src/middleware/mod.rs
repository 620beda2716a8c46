pub mod auth;

pub use auth::{admin_auth_middleware, user_auth_middleware, AdminClaims, UserClaims};
