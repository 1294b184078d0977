use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(uuid(Users::Id).primary_key())
                    .col(string_len(Users::Username, 50).unique_key())
                    .col(string_len(Users::Email, 70).unique_key())
                    .col(string_len_null(Users::FirstName, 50))
                    .col(string_len_null(Users::LastName, 50))
                    .col(string(Users::Password))
                    .col(boolean(Users::IsActive).default(true))
                    .col(boolean(Users::IsStaff).default(false))
                    .col(boolean(Users::IsSuperuser).default(false))
                    .col(date_time(Users::DateJoined))
                    .to_owned(),
            )
            .await?;

        // Create breeds table
        manager
            .create_table(
                Table::create()
                    .table(Breeds::Table)
                    .if_not_exists()
                    .col(pk_auto(Breeds::Id))
                    .col(string_len(Breeds::Name, 50).unique_key())
                    .to_owned(),
            )
            .await?;

        // Create kittens table, one per owner
        manager
            .create_table(
                Table::create()
                    .table(Kittens::Table)
                    .if_not_exists()
                    .col(pk_auto(Kittens::Id))
                    .col(string_len(Kittens::Name, 50))
                    .col(string_len(Kittens::Slug, 50))
                    .col(string_len(Kittens::Color, 16))
                    .col(date(Kittens::BirthDate))
                    .col(uuid(Kittens::OwnerId).unique_key())
                    .col(integer(Kittens::BreedId))
                    .col(string(Kittens::Image))
                    .col(text_null(Kittens::Description))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_kitten_owner")
                            .from(Kittens::Table, Kittens::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_kitten_breed")
                            .from(Kittens::Table, Kittens::BreedId)
                            .to(Breeds::Table, Breeds::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_kittens_breed_id")
                    .table(Kittens::Table)
                    .col(Kittens::BreedId)
                    .to_owned(),
            )
            .await?;

        // Create issued_tokens table, rows outlive their user
        manager
            .create_table(
                Table::create()
                    .table(IssuedTokens::Table)
                    .if_not_exists()
                    .col(string_len(IssuedTokens::Jti, 64).primary_key())
                    .col(uuid_null(IssuedTokens::UserId))
                    .col(string_len(IssuedTokens::TokenType, 10))
                    .col(date_time(IssuedTokens::CreatedAt))
                    .col(date_time(IssuedTokens::ExpiresAt))
                    .col(date_time_null(IssuedTokens::BlacklistedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_issued_token_user")
                            .from(IssuedTokens::Table, IssuedTokens::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_issued_tokens_user_id")
                    .table(IssuedTokens::Table)
                    .col(IssuedTokens::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order to avoid foreign key constraints
        manager
            .drop_table(Table::drop().table(IssuedTokens::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Kittens::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Breeds::Table).to_owned())
            .await?;

        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    Email,
    FirstName,
    LastName,
    Password,
    IsActive,
    IsStaff,
    IsSuperuser,
    DateJoined,
}

#[derive(DeriveIden)]
enum Breeds {
    Table,
    Id,
    Name,
}

#[derive(DeriveIden)]
enum Kittens {
    Table,
    Id,
    Name,
    Slug,
    Color,
    BirthDate,
    OwnerId,
    BreedId,
    Image,
    Description,
}

#[derive(DeriveIden)]
enum IssuedTokens {
    Table,
    Jti,
    UserId,
    TokenType,
    CreatedAt,
    ExpiresAt,
    BlacklistedAt,
}
