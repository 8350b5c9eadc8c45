//! HTTP surface of Dropgate.
//!
//! Serves the retrieval links (`/d/{id}`, `/s/{id}`), the management API for
//! system users under `/api`, and the download-account dashboard.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
