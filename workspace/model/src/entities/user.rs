use crate::validators::{
    EMAIL_MAX_LENGTH, EMAIL_MIN_LENGTH, FieldErrors, NAME_MAX_LENGTH, NAME_MIN_LENGTH,
    USERNAME_MAX_LENGTH, USERNAME_MIN_LENGTH, check_length, validate_email, validate_name,
    validate_username,
};
use sea_orm::entity::prelude::*;
use sea_orm::Set;

/// Represents an account of the exhibition back office.
/// Staff users (`is_staff`) act as administrators for every resource.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub username: String,
    #[sea_orm(unique)]
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// bcrypt hash, never the raw password.
    pub password: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A user owns at most one kitten.
    #[sea_orm(has_one = "super::kitten::Entity")]
    Kitten,
    #[sea_orm(has_many = "super::issued_token::Entity")]
    IssuedToken,
}

impl Related<super::kitten::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Kitten.def()
    }
}

impl Related<super::issued_token::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::IssuedToken.def()
    }
}

impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        Self {
            id: Set(Uuid::new_v4()),
            is_active: Set(true),
            is_staff: Set(false),
            is_superuser: Set(false),
            date_joined: Set(chrono::Utc::now().naive_utc()),
            ..<Self as ActiveModelTrait>::default()
        }
    }
}

impl Model {
    /// Run every field rule of the record, collecting all failures.
    pub fn full_clean(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();

        errors.check(
            "username",
            check_length(&self.username, USERNAME_MIN_LENGTH, USERNAME_MAX_LENGTH),
        );
        errors.check("username", validate_username(&self.username));
        errors.check(
            "email",
            check_length(&self.email, EMAIL_MIN_LENGTH, EMAIL_MAX_LENGTH),
        );
        errors.check("email", validate_email(&self.email));

        for (field, value) in [("first_name", &self.first_name), ("last_name", &self.last_name)] {
            // Blank names are allowed on the record itself.
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                errors.check(field, check_length(value, NAME_MIN_LENGTH, NAME_MAX_LENGTH));
                errors.check(field, validate_name(value));
            }
        }

        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Model {
        Model {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            first_name: Some("Alice".to_string()),
            last_name: None,
            password: "hash".to_string(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
            date_joined: chrono::Utc::now().naive_utc(),
        }
    }

    #[test]
    fn test_full_clean_accepts_valid_user() {
        assert!(sample().full_clean().is_ok());
    }

    #[test]
    fn test_full_clean_reports_every_field() {
        let mut user = sample();
        user.username = "me".to_string();
        user.email = "nope".to_string();
        user.first_name = Some("A".to_string());
        user.last_name = Some("Smith!".to_string());

        let errors = user.full_clean().unwrap_err();
        assert!(errors.contains("username"));
        assert!(errors.contains("email"));
        assert!(errors.contains("first_name"));
        assert!(errors.contains("last_name"));
    }

    #[test]
    fn test_full_clean_allows_blank_names() {
        let mut user = sample();
        user.first_name = Some(String::new());
        user.last_name = None;
        assert!(user.full_clean().is_ok());
    }
}
