use anyhow::Error as AnyhowError;
use db::{DBService, DbErr};
use server::{AppState, config::ServerConfig, http};
use services::services::{auth::AuthService, realtime::RealtimeService};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, prelude::*};
use utils_jwt::JwtService;

#[derive(Debug, Error)]
pub enum BoardServerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

#[tokio::main]
async fn main() -> Result<(), BoardServerError> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,server={level},services={level},db={level},utils={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string).expect("Failed to create tracing filter");
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    let config = ServerConfig::from_env();

    // Default database lives under ./data; make sure it exists before the
    // pool opens the file.
    if config.database_url.contains("sqlite://data/") {
        std::fs::create_dir_all("data")?;
    }

    let db = DBService::new(&config.database_url).await?;
    let auth = AuthService::new(db.clone(), JwtService::new(&config.jwt_secret));
    let realtime = RealtimeService::new();
    let state = AppState::new(db, auth, realtime);

    let app = http::router(state);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;
    let actual_port = listener.local_addr()?.port();
    tracing::info!("Server running on http://{}:{}", config.host, actual_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = match signal(SignalKind::interrupt()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::error!("Failed to install SIGINT handler: {e}");
                return;
            }
        };
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                None
            }
        };

        tokio::select! {
            _ = sigint.recv() => {},
            _ = async {
                if let Some(sigterm) = sigterm.as_mut() {
                    sigterm.recv().await;
                } else {
                    std::future::pending::<()>().await;
                }
            } => {},
        }
        tracing::info!("Shutdown signal received, starting graceful shutdown");
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            return;
        }
        tracing::info!("Shutdown signal received, starting graceful shutdown");
    }
}
