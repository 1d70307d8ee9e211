//! Conflict registry
//!
//! Owns open conflicts from detection until resolution. Resolution must be
//! followed by `SyncStateStore::resolve_conflict` and a two-parent version
//! record; the orchestrator drives that sequence.

use crate::domain::conflict::{Conflict, Resolution};
use crate::infrastructure::database::entities::{conflict, Conflict as ConflictEntity};
use crate::sync::conflict_detector::ConflictAssessment;
use crate::sync::error::{Result, SyncError};
use crate::sync::state_store::SyncStateStore;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::{info, instrument};
use uuid::Uuid;

/// Registry of open and resolved conflicts
#[derive(Clone)]
pub struct ConflictManager {
    conn: DatabaseConnection,
    state_store: SyncStateStore,
}

impl ConflictManager {
    pub fn new(conn: DatabaseConnection, state_store: SyncStateStore) -> Self {
        Self { conn, state_store }
    }

    /// Create or refresh the open conflict for a type and mark its sync
    /// state conflicted.
    ///
    /// `dependent_items` is how many content entries reference this type;
    /// more dependents raise the priority.
    #[instrument(skip(self, assessment), fields(type_key = assessment.type_key))]
    pub async fn flag_for_review(
        &self,
        assessment: &ConflictAssessment,
        dependent_items: u32,
    ) -> Result<Conflict> {
        let priority =
            assessment.severity.weight() + dependent_items.min(i32::MAX as u32) as i32;
        let now = Utc::now();

        let existing = ConflictEntity::find()
            .filter(conflict::Column::TypeKey.eq(&assessment.type_key))
            .filter(conflict::Column::Resolution.is_null())
            .one(&self.conn)
            .await?;

        let source_changes = to_json(&assessment.type_key, &assessment.source_changes)?;
        let target_changes = to_json(&assessment.type_key, &assessment.target_changes)?;

        let row = match existing {
            Some(row) => {
                let mut active: conflict::ActiveModel = row.into();
                active.conflict_type = Set(assessment.conflict_type.to_string());
                active.severity = Set(assessment.severity.to_string());
                active.source_changes = Set(source_changes);
                active.target_changes = Set(target_changes);
                active.priority = Set(priority);
                active.updated_at = Set(now);
                active.update(&self.conn).await?
            }
            None => {
                let active = conflict::ActiveModel {
                    uuid: Set(Uuid::new_v4()),
                    type_key: Set(assessment.type_key.clone()),
                    conflict_type: Set(assessment.conflict_type.to_string()),
                    severity: Set(assessment.severity.to_string()),
                    source_changes: Set(source_changes),
                    target_changes: Set(target_changes),
                    priority: Set(priority),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                };
                active.insert(&self.conn).await?
            }
        };

        self.state_store
            .mark_as_conflicted(&assessment.type_key)
            .await?;

        info!(
            type_key = assessment.type_key,
            severity = %assessment.severity,
            priority,
            "conflict flagged for review"
        );

        to_domain(row)
    }

    /// Open conflicts ordered by priority, highest first
    pub async fn open_conflicts(&self) -> Result<Vec<Conflict>> {
        let rows = ConflictEntity::find()
            .filter(conflict::Column::Resolution.is_null())
            .order_by_desc(conflict::Column::Priority)
            .all(&self.conn)
            .await?;
        rows.into_iter().map(to_domain).collect()
    }

    /// The open conflict for a type, if any
    pub async fn get_conflict(&self, type_key: &str) -> Result<Option<Conflict>> {
        let row = ConflictEntity::find()
            .filter(conflict::Column::TypeKey.eq(type_key))
            .filter(conflict::Column::Resolution.is_null())
            .one(&self.conn)
            .await?;
        row.map(to_domain).transpose()
    }

    /// Finalize a resolution on the open conflict for a type.
    ///
    /// The caller must follow up with `SyncStateStore::resolve_conflict` and
    /// a two-parent version record.
    pub async fn resolve_conflict(
        &self,
        type_key: &str,
        resolution: Resolution,
    ) -> Result<Conflict> {
        let row = ConflictEntity::find()
            .filter(conflict::Column::TypeKey.eq(type_key))
            .filter(conflict::Column::Resolution.is_null())
            .one(&self.conn)
            .await?
            .ok_or_else(|| SyncError::UnknownType(type_key.to_string()))?;

        let now = Utc::now();
        let mut active: conflict::ActiveModel = row.into();
        active.resolution = Set(Some(to_json(type_key, &resolution)?));
        active.resolved_at = Set(Some(now));
        active.updated_at = Set(now);
        let row = active.update(&self.conn).await?;

        info!(type_key, strategy = %resolution.strategy, "conflict resolved");

        to_domain(row)
    }
}

/// Serialization failures surface as [`SyncError::CorruptRecord`] at write
/// time instead of silently storing `null`
fn to_json<T: serde::Serialize>(type_key: &str, value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| SyncError::CorruptRecord {
        type_key: type_key.to_string(),
        detail: e.to_string(),
    })
}

fn to_domain(row: conflict::Model) -> Result<Conflict> {
    let parse = |detail: String| SyncError::CorruptRecord {
        type_key: row.type_key.clone(),
        detail,
    };

    Ok(Conflict {
        id: row.uuid,
        type_key: row.type_key.clone(),
        conflict_type: row
            .conflict_type
            .parse()
            .map_err(|e: strum::ParseError| parse(e.to_string()))?,
        severity: row
            .severity
            .parse()
            .map_err(|e: strum::ParseError| parse(e.to_string()))?,
        source_changes: serde_json::from_value(row.source_changes.clone())
            .map_err(|e| parse(e.to_string()))?,
        target_changes: serde_json::from_value(row.target_changes.clone())
            .map_err(|e| parse(e.to_string()))?,
        priority: row.priority,
        resolution: row
            .resolution
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| parse(e.to_string()))?,
        created_at: row.created_at,
    })
}
