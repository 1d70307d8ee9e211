//! Sync attempt log entity
//!
//! One row is written before and after every remote call so a deployment's
//! log can name exactly which types need attention.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub deployment_id: Uuid,
    pub type_key: String,
    pub direction: String,
    pub attempt: i32,
    pub outcome: String,
    pub message: Option<String>,
    pub snapshot_hash: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
