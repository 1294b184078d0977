//! This file serves as the root for all SeaORM entity modules.
//! Users own at most one kitten; every kitten belongs to a breed; every
//! signed JWT is tracked in `issued_tokens` so it can be blacklisted.

pub mod breed;
pub mod issued_token;
pub mod kitten;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::breed::Entity as Breed;
    pub use super::issued_token::Entity as IssuedToken;
    pub use super::kitten::Entity as Kitten;
    pub use super::user::Entity as User;
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::{
        ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
        EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter, Set, SqlErr,
    };
    use uuid::Uuid;

    use super::*;
    use prelude::*;

    async fn setup_db() -> Result<DatabaseConnection, DbErr> {
        // Connect to the SQLite database
        let db = Database::connect("sqlite::memory:").await?;

        // Enable foreign keys
        db.execute_unprepared("PRAGMA foreign_keys = ON;").await?;

        Migrator::up(&db, None).await.expect("Migrations failed.");
        Ok(db)
    }

    async fn create_user(db: &DatabaseConnection, username: &str) -> Result<user::Model, DbErr> {
        user::ActiveModel {
            username: Set(username.to_string()),
            email: Set(format!("{username}@example.com")),
            password: Set("not-a-real-hash".to_string()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    async fn create_breed(db: &DatabaseConnection, name: &str) -> Result<breed::Model, DbErr> {
        breed::ActiveModel {
            name: Set(name.to_string()),
            ..Default::default()
        }
        .insert(db)
        .await
    }

    fn kitten_for(owner: &user::Model, breed: &breed::Model, name: &str) -> kitten::ActiveModel {
        kitten::ActiveModel {
            name: Set(name.to_string()),
            color: Set("ginger".to_string()),
            birth_date: Set(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()),
            owner_id: Set(owner.id),
            breed_id: Set(breed.id),
            image: Set("images/test.png".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_user_defaults() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let user = create_user(&db, "alice").await?;

        assert!(user.is_active);
        assert!(!user.is_staff);
        assert!(!user.is_superuser);
        assert_ne!(user.id, Uuid::nil());
        Ok(())
    }

    #[tokio::test]
    async fn test_slug_generated_from_name() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let owner = create_user(&db, "owner").await?;
        let siamese = create_breed(&db, "Siamese").await?;

        let kitten = kitten_for(&owner, &siamese, "Барсик").insert(&db).await?;
        assert_eq!(kitten.slug, "barsik");
        Ok(())
    }

    #[tokio::test]
    async fn test_explicit_slug_preserved() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let owner = create_user(&db, "owner").await?;
        let siamese = create_breed(&db, "Siamese").await?;

        let mut active = kitten_for(&owner, &siamese, "Барсик");
        active.slug = Set("my-own-Slug".to_string());
        let kitten = active.insert(&db).await?;
        assert_eq!(kitten.slug, "my-own-Slug");
        Ok(())
    }

    #[tokio::test]
    async fn test_slug_not_regenerated_on_rename() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let owner = create_user(&db, "owner").await?;
        let siamese = create_breed(&db, "Siamese").await?;
        let kitten = kitten_for(&owner, &siamese, "Murka").insert(&db).await?;

        let mut active = kitten.into_active_model();
        active.name = Set("Vaska".to_string());
        let renamed = active.update(&db).await?;

        assert_eq!(renamed.name, "Vaska");
        assert_eq!(renamed.slug, "murka");
        Ok(())
    }

    #[tokio::test]
    async fn test_one_kitten_per_owner() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let owner = create_user(&db, "owner").await?;
        let siamese = create_breed(&db, "Siamese").await?;
        kitten_for(&owner, &siamese, "First").insert(&db).await?;

        let err = kitten_for(&owner, &siamese, "Second")
            .insert(&db)
            .await
            .expect_err("second kitten for the same owner must fail");
        assert!(matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_breed_name_unique() -> Result<(), DbErr> {
        let db = setup_db().await?;
        create_breed(&db, "Persian").await?;
        let err = create_breed(&db, "Persian").await.expect_err("duplicate breed");
        assert!(matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_deleting_owner_cascades_to_kitten() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let owner = create_user(&db, "owner").await?;
        let other = create_user(&db, "other").await?;
        let siamese = create_breed(&db, "Siamese").await?;
        kitten_for(&owner, &siamese, "Doomed").insert(&db).await?;
        kitten_for(&other, &siamese, "Survivor").insert(&db).await?;

        User::delete_by_id(owner.id).exec(&db).await?;

        let remaining = Kitten::find().all(&db).await?;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "Survivor");
        Ok(())
    }

    #[tokio::test]
    async fn test_deleting_user_keeps_token_rows() -> Result<(), DbErr> {
        let db = setup_db().await?;
        let owner = create_user(&db, "owner").await?;
        let now = chrono::Utc::now().naive_utc();
        issued_token::ActiveModel {
            jti: Set("abc".to_string()),
            user_id: Set(Some(owner.id)),
            token_type: Set(issued_token::TokenKind::Refresh),
            created_at: Set(now),
            expires_at: Set(now),
            blacklisted_at: Set(None),
        }
        .insert(&db)
        .await?;

        User::delete_by_id(owner.id).exec(&db).await?;

        let token = IssuedToken::find_by_id("abc").one(&db).await?.unwrap();
        assert_eq!(token.user_id, None);
        let count = IssuedToken::find()
            .filter(issued_token::Column::Jti.eq("abc"))
            .count(&db)
            .await?;
        assert_eq!(count, 1);
        Ok(())
    }
}
