//! Client address and agent extraction.

use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header::USER_AGENT, request::Parts, Extensions, HeaderMap},
};

use crate::audit::ClientInfo;

/// Extract client IP from request headers and connection info.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> String {
    // Try X-Forwarded-For header first (for reverse proxy)
    if let Some(forwarded) = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
    {
        // Take the first IP in the chain
        if let Some(ip) = forwarded.split(',').next() {
            let ip = ip.trim();
            if !ip.is_empty() {
                return ip.to_string();
            }
        }
    }

    if let Some(real_ip) = headers.get("X-Real-IP").and_then(|v| v.to_str().ok()) {
        return real_ip.trim().to_string();
    }

    if let Some(ConnectInfo(addr)) = extensions.get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    "unknown".to_string()
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        Ok(ClientInfo::new(
            client_ip(&parts.headers, &parts.extensions),
            user_agent,
        ))
    }
}
