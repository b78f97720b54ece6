use uuid::Uuid;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_DATABASE_URL: &str = "sqlite://data/board.sqlite?mode=rwc";

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        let port = std::env::var("BACKEND_PORT")
            .or_else(|_| std::env::var("PORT"))
            .ok()
            .and_then(|value| value.trim().parse::<u16>().ok())
            .unwrap_or_else(|| {
                tracing::info!("No PORT environment variable set, using port 0 for auto-assignment");
                0
            });
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let jwt_secret = std::env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!(
                "JWT_SECRET is not set; using an ephemeral secret. Tokens will not survive a restart."
            );
            Uuid::new_v4().to_string()
        });

        Self {
            host,
            port,
            database_url,
            jwt_secret,
        }
    }
}
