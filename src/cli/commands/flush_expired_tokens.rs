use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, trace};

use crate::auth;
use crate::config::connect_database;

pub async fn flush_expired_tokens(database_url: &str) -> Result<u64> {
    trace!("Entering flush_expired_tokens function");
    debug!("Database URL: {}", database_url);

    let db = connect_database(database_url).await?;
    let removed = auth::flush_expired_tokens(&db, Utc::now().naive_utc()).await?;

    info!("Removed {} expired tokens", removed);
    Ok(removed)
}
