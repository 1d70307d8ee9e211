//! Version records forming the per-type history DAG

use crate::domain::snapshot::ContentTypeSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Where an accepted change originated
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeSource {
    Ui,
    Ai,
    Sync,
}

/// An append-only version record.
///
/// Zero parents marks a root, one parent a linear edit, two or more a merge
/// resolving a conflict. Parent links always use the join-table
/// representation; a single parent is just the N=1 case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version_hash: String,
    pub type_key: String,
    pub parent_hashes: Vec<String>,
    pub snapshot: ContentTypeSnapshot,
    pub change_source: ChangeSource,
    pub author: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VersionRecord {
    pub fn is_root(&self) -> bool {
        self.parent_hashes.is_empty()
    }

    pub fn is_merge(&self) -> bool {
        self.parent_hashes.len() >= 2
    }
}
