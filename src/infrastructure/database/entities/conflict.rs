//! Conflict entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "conflicts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub uuid: Uuid,
    pub type_key: String,
    pub conflict_type: String,
    pub severity: String,
    /// FieldDiff from merge base to the local side, as JSON
    pub source_changes: Json,
    /// FieldDiff from merge base to the remote side, as JSON
    pub target_changes: Json,
    pub priority: i32,
    /// Resolution as JSON once finalized
    pub resolution: Option<Json>,
    pub resolved_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
