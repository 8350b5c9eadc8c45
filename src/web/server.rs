//! HTTP server for Dropgate.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::file::FileStorage;
use crate::notify::NotificationPool;
use crate::{Database, DropgateError, Result};

use super::handlers::AppState;
use super::middleware::RateLimitState;
use super::router::create_router;

/// HTTP server wiring the application state to a listener.
pub struct WebServer {
    addr: SocketAddr,
    app_state: AppState,
    rate_limit: Arc<RateLimitState>,
    cors_origins: Vec<String>,
    api_timeout: Duration,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &Config, db: Database, notifications: NotificationPool) -> Result<Self> {
        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| DropgateError::Config(format!("invalid listen address: {e}")))?;

        let storage = FileStorage::new(&config.files.storage_path)?;
        tracing::info!("File storage initialized at: {}", config.files.storage_path);

        Ok(Self {
            addr,
            app_state: AppState::new(db, storage, config, notifications),
            rate_limit: Arc::new(RateLimitState::new(
                config.rate_limit.login_per_minute,
                config.rate_limit.unlock_per_minute,
            )),
            cors_origins: config.web.cors_origins.clone(),
            api_timeout: Duration::from_secs(config.server.api_timeout_secs),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Run the web server until it fails.
    pub async fn run(self) -> Result<()> {
        let router = create_router(
            self.app_state,
            self.rate_limit.clone(),
            &self.cors_origins,
            self.api_timeout,
        );

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        self.rate_limit.start_cleanup_task();
        tracing::info!("Web server listening on http://{}", local_addr);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }
}
