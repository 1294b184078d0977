use anyhow::Result;
use tracing::{debug, info, trace};

use super::initdb::run_migrations;
use super::serve::run_server;
use crate::config::{build_app_state, AppConfig};

pub async fn migrate_and_serve(config: AppConfig) -> Result<()> {
    trace!("Entering migrate_and_serve function");
    info!("Applying database migrations and starting server");
    debug!("Bind address: {}", config.bind_address);

    let db = run_migrations(&config.database_url).await?;
    let state = build_app_state(db, config);
    run_server(state).await
}
