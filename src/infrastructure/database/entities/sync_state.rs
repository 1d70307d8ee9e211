//! Sync state entity, one row per content type key

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sync_states")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub type_key: String,
    pub local_hash: Option<String>,
    pub remote_hash: Option<String>,
    pub last_synced_hash: Option<String>,
    pub sync_status: String,
    pub conflict_status: String,
    /// Resumable progress as JSON; non-null iff sync_status = 'syncing'
    pub sync_progress: Option<Json>,
    pub last_sync_at: Option<DateTimeUtc>,
    pub last_conflict_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
