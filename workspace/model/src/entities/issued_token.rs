use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Kind of a signed token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[sea_orm(string_value = "access")]
    Access,
    #[sea_orm(string_value = "refresh")]
    Refresh,
}

/// Every JWT the service signs, keyed by its `jti` claim.
/// A token is only honoured while its row exists and is not blacklisted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "issued_tokens")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub jti: String,
    pub user_id: Option<Uuid>,
    pub token_type: TokenKind,
    pub created_at: DateTime,
    pub expires_at: DateTime,
    pub blacklisted_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_blacklisted(&self) -> bool {
        self.blacklisted_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_kind_wire_names() {
        assert_eq!(serde_json::to_value(TokenKind::Access).unwrap(), "access");
        assert_eq!(serde_json::to_value(TokenKind::Refresh).unwrap(), "refresh");
    }

    #[test]
    fn test_token_kind_schema() {
        let (name, _schema) = <TokenKind as ToSchema>::schema();
        assert_eq!(name, "TokenKind");
    }
}
