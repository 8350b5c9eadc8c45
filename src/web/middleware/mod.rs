//! Middleware for the HTTP surface.

pub mod auth;
pub mod client;
pub mod cors;
pub mod rate_limit;
pub mod security;

pub use auth::{jwt_auth, AuthUser, JwtClaims, JwtState, OptionalAuthUser};
pub use client::client_ip;
pub use cors::create_cors_layer;
pub use rate_limit::{login_rate_limit, unlock_rate_limit, RateLimitState};
pub use security::security_headers;
