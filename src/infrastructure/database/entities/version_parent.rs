//! Version parent link entity
//!
//! Join table carrying 0..N parent hashes per version. The single-parent
//! case is the N=1 special case; merge records carry two or more rows.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "version_parents")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub version_id: i32,
    pub parent_hash: String,
    /// Position of this parent in the record's parent list
    pub ordinal: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::content_type_version::Entity",
        from = "Column::VersionId",
        to = "super::content_type_version::Column::Id"
    )]
    Version,
}

impl Related<super::content_type_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Version.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
