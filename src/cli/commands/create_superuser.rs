use anyhow::{Result, bail};
use chrono::Utc;
use model::entities::user;
use model::validators::validate_password;
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, Set};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::auth::hash_password;
use crate::config::{AppConfig, connect_database};

pub async fn create_superuser(config: &AppConfig, username: &str, email: &str, password: &str) -> Result<()> {
    trace!("Entering create_superuser function");
    debug!("Database URL: {}", config.database_url);

    let candidate = user::Model {
        id: Uuid::nil(),
        username: username.to_string(),
        email: email.to_string(),
        first_name: None,
        last_name: None,
        password: String::new(),
        is_active: true,
        is_staff: true,
        is_superuser: true,
        date_joined: Utc::now().naive_utc(),
    };
    candidate.full_clean()?;

    let problems = validate_password(password, username, email);
    if let Some(problem) = problems.first() {
        bail!("Password rejected: {}", problem);
    }

    let db = connect_database(&config.database_url).await?;
    let existing = user::Entity::find()
        .filter(
            Condition::any()
                .add(user::Column::Username.eq(username))
                .add(user::Column::Email.eq(email)),
        )
        .one(&db)
        .await?;
    if let Some(existing) = existing {
        warn!("User '{}' already exists", existing.username);
        bail!("A user with that username or email already exists");
    }

    let password_hash = hash_password(password.to_string(), config.password_hash_cost).await?;
    let account = user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        first_name: Set(None),
        last_name: Set(None),
        password: Set(password_hash),
        is_staff: Set(true),
        is_superuser: Set(true),
        ..Default::default()
    };

    let created = account.insert(&db).await?;
    info!("Superuser '{}' created with ID {}", created.username, created.id);
    Ok(())
}
