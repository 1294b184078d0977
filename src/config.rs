use anyhow::Result;
use moka::future::Cache;
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection};
use serde::Deserialize;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

use crate::schemas::AppState;

const DEVELOPMENT_SECRET: &str = "insecure-development-secret-change-me";

/// Process-wide settings, loaded once at startup and shared read-only.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_address: String,
    /// HMAC key for signing tokens.
    pub secret_key: String,
    pub access_token_lifetime_days: i64,
    pub refresh_token_lifetime_days: i64,
    /// Default `limit` of paginated lists.
    pub page_size: u64,
    pub media_root: PathBuf,
    /// Public prefix under which `media_root` is served.
    pub media_url: String,
    pub password_hash_cost: u32,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    /// Load defaults overlaid with `KITTENS_*` environment variables.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .set_default("database_url", "sqlite://kittens.db?mode=rwc")?
            .set_default("bind_address", "0.0.0.0:3000")?
            .set_default("secret_key", DEVELOPMENT_SECRET)?
            .set_default("access_token_lifetime_days", 7_i64)?
            .set_default("refresh_token_lifetime_days", 14_i64)?
            .set_default("page_size", 10_i64)?
            .set_default("media_root", "media")?
            .set_default("media_url", "/backend_media/")?
            .set_default("password_hash_cost", i64::from(bcrypt::DEFAULT_COST))?
            .set_default("request_timeout_secs", 30_i64)?
            .add_source(config::Environment::with_prefix("KITTENS").try_parsing(true))
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        if config.secret_key == DEVELOPMENT_SECRET {
            warn!("KITTENS_SECRET_KEY is not set, tokens are signed with the development key");
        }
        debug!("Loaded configuration: {:?}", config.redacted());
        Ok(config)
    }

    /// Override the values the CLI accepts as flags.
    pub fn with_overrides(mut self, database_url: Option<String>, bind_address: Option<String>) -> Self {
        if let Some(database_url) = database_url {
            self.database_url = database_url;
        }
        if let Some(bind_address) = bind_address {
            self.bind_address = bind_address;
        }
        self
    }

    /// `media_url` with exactly one trailing slash.
    pub fn media_prefix(&self) -> String {
        format!("{}/", self.media_url.trim_end_matches('/'))
    }

    fn redacted(&self) -> AppConfig {
        AppConfig {
            secret_key: "***".to_string(),
            ..self.clone()
        }
    }
}

/// Connect to the database, turning on foreign keys for SQLite.
pub async fn connect_database(database_url: &str) -> Result<DatabaseConnection> {
    info!("Connecting to database: {}", database_url);
    let db = Database::connect(database_url).await?;

    if db.get_database_backend() == DatabaseBackend::Sqlite {
        db.execute_unprepared("PRAGMA foreign_keys = ON;").await?;
    }
    Ok(db)
}

/// Initialize application state
pub async fn initialize_app_state(config: AppConfig) -> Result<AppState> {
    let db = connect_database(&config.database_url).await?;
    Ok(build_app_state(db, config))
}

pub fn build_app_state(db: DatabaseConnection, config: AppConfig) -> AppState {
    // Blacklist lookups by token id
    let token_states = Cache::builder()
        .max_capacity(10_000)
        .time_to_live(Duration::from_secs(60))
        .build();

    AppState {
        db,
        config: Arc::new(config),
        token_states,
    }
}
