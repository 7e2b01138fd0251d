use anyhow::Context;
use common::Database;

use crate::auth::TokenAuthority;
use crate::state::AppState;

pub struct AppConfig {
    pub database_url: String,
    pub bind_address: String,
    pub port: u16,
    pub token_ttl_minutes: i64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let bind_address =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = match std::env::var("PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("PORT must be a valid port number, got `{}`", value))?,
            Err(_) => 8080,
        };

        let token_ttl_minutes = match std::env::var("TOKEN_TTL_MINUTES") {
            Ok(value) => value
                .parse::<i64>()
                .ok()
                .filter(|minutes| *minutes > 0)
                .with_context(|| {
                    format!("TOKEN_TTL_MINUTES must be a positive integer, got `{}`", value)
                })?,
            Err(_) => 60,
        };

        Ok(Self {
            database_url,
            bind_address,
            port,
            token_ttl_minutes,
        })
    }

    pub async fn create_app_state(&self) -> anyhow::Result<AppState> {
        let db = Database::new(&self.database_url)
            .await
            .context("Failed to initialize database")?;
        log::info!("Database initialized successfully!");

        let tokens = TokenAuthority::generate(chrono::Duration::minutes(self.token_ttl_minutes));
        Ok(AppState::new(db, tokens))
    }
}
