use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use dropgate::auth::bootstrap_admin;
use dropgate::notify::{LogNotifier, NotificationPool};
use dropgate::web::WebServer;
use dropgate::{Config, Database};

fn load_config() -> Config {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let mut config = match Config::load(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {path}: {e}");
            eprintln!("Using default configuration.");
            Config::default()
        }
    };
    config.apply_env_overrides();
    config
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = load_config();

    if let Err(e) = dropgate::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        dropgate::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = config.validate() {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    info!("Dropgate {}", env!("CARGO_PKG_VERSION"));
    info!(
        "Server configured on {}:{}",
        config.server.host, config.server.port
    );

    let db = match Database::open(&config.database.path, config.database.max_connections).await {
        Ok(db) => db,
        Err(e) => {
            error!(path = %config.database.path, "Failed to open database: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = bootstrap_admin(&db, &config.admin).await {
        error!("Failed to create bootstrap administrator: {e}");
        return ExitCode::FAILURE;
    }

    let notifications = if config.notifications.enabled {
        NotificationPool::start(
            Arc::new(LogNotifier),
            config.notifications.workers,
            config.notifications.queue_capacity,
        )
    } else {
        NotificationPool::disabled()
    };

    let server = match WebServer::new(&config, db, notifications) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to start web server: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server.run().await {
        error!("Web server error: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
