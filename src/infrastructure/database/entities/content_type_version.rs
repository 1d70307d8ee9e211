//! Content type version entity (append-only history)

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "content_type_versions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub version_hash: String,
    pub type_key: String,
    /// Snapshot of the definition at this version as JSON
    pub snapshot: Json,
    pub change_source: String,
    pub author: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::content_type::Entity",
        from = "Column::TypeKey",
        to = "super::content_type::Column::TypeKey"
    )]
    ContentType,
    #[sea_orm(has_many = "super::version_parent::Entity")]
    Parents,
}

impl Related<super::content_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ContentType.def()
    }
}

impl Related<super::version_parent::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Parents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
