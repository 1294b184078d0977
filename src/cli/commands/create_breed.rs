use anyhow::{Result, bail};
use model::entities::breed;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use tracing::{debug, info, trace};

use crate::config::connect_database;

pub async fn create_breed(database_url: &str, name: &str) -> Result<()> {
    trace!("Entering create_breed function");
    debug!("Database URL: {}", database_url);

    let candidate = breed::Model {
        id: 0,
        name: name.trim().to_string(),
    };
    candidate.full_clean()?;

    let db = connect_database(database_url).await?;
    let duplicate = breed::Entity::find()
        .filter(breed::Column::Name.eq(candidate.name.as_str()))
        .one(&db)
        .await?;
    if duplicate.is_some() {
        bail!("Breed '{}' already exists", candidate.name);
    }

    let created = breed::ActiveModel {
        name: Set(candidate.name),
        ..Default::default()
    }
    .insert(&db)
    .await?;

    info!("Breed created with ID: {}, name: {}", created.id, created.name);
    Ok(())
}
