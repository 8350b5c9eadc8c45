//! CORS middleware configuration.

use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

const METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// Create a CORS layer from the configured origins.
///
/// With explicit origins, credentials (download cookies) are allowed. With
/// none, any origin may call the API but cookies are not shared.
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    let parsed_origins: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

    if parsed_origins.is_empty() {
        if !origins.is_empty() {
            tracing::warn!(?origins, "No valid CORS origins configured, allowing any origin");
        }
        return CorsLayer::new()
            .allow_methods(METHODS)
            .allow_headers(Any)
            .allow_origin(Any);
    }

    CorsLayer::new()
        .allow_methods(METHODS)
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT])
        .allow_credentials(true)
        .allow_origin(parsed_origins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_cors_layer_empty_origins() {
        let _layer = create_cors_layer(&[]);
    }

    #[test]
    fn test_create_cors_layer_with_origins() {
        let origins = vec!["https://files.example.com".to_string()];
        let _layer = create_cors_layer(&origins);
    }

    #[test]
    fn test_create_cors_layer_invalid_origins() {
        let _layer = create_cors_layer(&["\n".to_string()]);
    }
}
