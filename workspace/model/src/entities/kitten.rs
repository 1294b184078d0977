use crate::slug::derive_slug;
use crate::validators::{
    COLOR_MAX_LENGTH, FieldErrors, NAME_MAX_LENGTH, check_length, validate_name, validate_slug,
};
use chrono::{Datelike, NaiveDate};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};

/// An exhibited kitten. Each user owns at most one.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "kittens")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    /// Derived from the name on first save when left blank; never regenerated.
    pub slug: String,
    pub color: String,
    pub birth_date: Date,
    #[sea_orm(unique)]
    pub owner_id: Uuid,
    pub breed_id: i32,
    /// Path of the uploaded image relative to the media root.
    pub image: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Owner,
    #[sea_orm(
        belongs_to = "super::breed::Entity",
        from = "Column::BreedId",
        to = "super::breed::Column::Id",
        on_delete = "Cascade"
    )]
    Breed,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::breed::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Breed.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let blank_slug = match &self.slug {
            ActiveValue::Set(slug) | ActiveValue::Unchanged(slug) => slug.is_empty(),
            ActiveValue::NotSet => true,
        };
        if blank_slug {
            if let ActiveValue::Set(name) | ActiveValue::Unchanged(name) = &self.name {
                let slug = derive_slug(name);
                tracing::debug!("Derived slug '{}' for kitten '{}'", slug, name);
                self.slug = Set(slug);
            }
        }
        Ok(self)
    }
}

impl Model {
    /// Age in whole months on `today`; zero for future birth dates.
    pub fn age_in_months(&self, today: NaiveDate) -> u32 {
        months_between(self.birth_date, today)
    }

    pub fn full_clean(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        if self.name.trim().is_empty() {
            errors.add("name", "This field may not be blank.");
        } else {
            errors.check("name", check_length(&self.name, 1, NAME_MAX_LENGTH));
            errors.check("name", validate_name(&self.name));
        }
        if !self.slug.is_empty() {
            errors.check("slug", validate_slug(&self.slug));
        }
        errors.check("color", check_length(&self.color, 1, COLOR_MAX_LENGTH));
        if self.image.is_empty() {
            errors.add("image", "No file was submitted.");
        }
        errors.into_result()
    }
}

pub fn months_between(from: NaiveDate, to: NaiveDate) -> u32 {
    if to <= from {
        return 0;
    }
    let mut months = (to.year() - from.year()) * 12 + to.month() as i32 - from.month() as i32;
    if to.day() < from.day() {
        months -= 1;
    }
    u32::try_from(months).unwrap_or(0)
}
