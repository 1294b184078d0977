use crate::validators::{FieldErrors, NAME_MAX_LENGTH, check_length, validate_name};
use sea_orm::entity::prelude::*;

/// A named category of kitten. Names are unique across the exhibition.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "breeds")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::kitten::Entity")]
    Kitten,
}

impl Related<super::kitten::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Kitten.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn full_clean(&self) -> Result<(), FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.check("name", check_length(&self.name, 1, NAME_MAX_LENGTH));
        errors.check("name", validate_name(&self.name));
        errors.into_result()
    }
}

/// Case-insensitive "starts with" filter on breed names.
///
/// A prefix shorter than two characters matches nothing, an absent prefix
/// matches everything.
pub fn filter_by_name_prefix(breeds: Vec<Model>, prefix: Option<&str>) -> Vec<Model> {
    match prefix {
        None => breeds,
        Some(prefix) if prefix.chars().count() < 2 => Vec::new(),
        Some(prefix) => {
            let prefix = prefix.to_lowercase();
            breeds
                .into_iter()
                .filter(|breed| breed.name.to_lowercase().starts_with(&prefix))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breeds(names: &[&str]) -> Vec<Model> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Model {
                id: i as i32 + 1,
                name: ToString::to_string(name),
            })
            .collect()
    }

    fn names(models: &[Model]) -> Vec<&str> {
        models.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn test_prefix_filter_is_case_insensitive() {
        let all = breeds(&["Siamese", "Siberian", "Persian"]);
        let matched = filter_by_name_prefix(all, Some("si"));
        assert_eq!(names(&matched), ["Siamese", "Siberian"]);
    }

    #[test]
    fn test_short_prefix_matches_nothing() {
        let all = breeds(&["Siamese", "Siberian", "Persian"]);
        assert!(filter_by_name_prefix(all.clone(), Some("s")).is_empty());
        assert!(filter_by_name_prefix(all, Some("")).is_empty());
    }

    #[test]
    fn test_missing_prefix_keeps_everything() {
        let all = breeds(&["Siamese", "Persian"]);
        assert_eq!(filter_by_name_prefix(all, None).len(), 2);
    }

    #[test]
    fn test_cyrillic_prefix() {
        let all = breeds(&["Сиамская", "Сибирская", "Персидская"]);
        let matched = filter_by_name_prefix(all, Some("СИ"));
        assert_eq!(matched.len(), 2);
    }

    #[test]
    fn test_full_clean() {
        assert!(Model { id: 1, name: "Maine Coon".into() }.full_clean().is_ok());
        assert!(Model { id: 1, name: "Maine_Coon".into() }.full_clean().is_err());
    }
}
