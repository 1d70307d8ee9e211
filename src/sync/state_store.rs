//! Durable per-type sync state
//!
//! One row per content type key holds the local/remote/last-synced hashes,
//! the status machine, and resumable progress. Every transition helper
//! enforces the invariant that progress is present iff the row is `syncing`.

use crate::domain::sync::{
    ConflictStatus, SyncAction, SyncDelta, SyncProgress, SyncState, SyncStatus,
};
use crate::infrastructure::database::entities::{sync_state, SyncState as SyncStateEntity};
use crate::sync::error::{Result, SyncError};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use tracing::{debug, warn};

/// Store for durable [`SyncState`] rows
#[derive(Clone)]
pub struct SyncStateStore {
    conn: DatabaseConnection,
}

impl SyncStateStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Fetch the sync state for a type key
    pub async fn get(&self, type_key: &str) -> Result<Option<SyncState>> {
        let row = SyncStateEntity::find()
            .filter(sync_state::Column::TypeKey.eq(type_key))
            .one(&self.conn)
            .await?;
        Ok(row.map(to_domain))
    }

    /// All tracked states
    pub async fn all(&self) -> Result<Vec<SyncState>> {
        let rows = SyncStateEntity::find().all(&self.conn).await?;
        Ok(rows.into_iter().map(to_domain).collect())
    }

    /// Record what change detection observed for a key.
    ///
    /// Creates the row with status `new` on first sight; otherwise updates
    /// the hashes and moves the row to `modified` or `in_sync` depending on
    /// whether the sides agree. Rows mid-sync are left alone.
    pub async fn record_observation(
        &self,
        type_key: &str,
        local_hash: Option<&str>,
        remote_hash: Option<&str>,
    ) -> Result<SyncState> {
        let existing = self.find_row(type_key).await?;

        match existing {
            None => {
                let mut state = SyncState::new(type_key);
                state.local_hash = local_hash.map(str::to_string);
                state.remote_hash = remote_hash.map(str::to_string);
                self.insert(&state).await
            }
            Some(row) => {
                let mut state = to_domain(row.clone());
                if state.sync_status == SyncStatus::Syncing {
                    debug!(type_key, "skipping observation for in-flight sync");
                    return Ok(state);
                }

                state.local_hash = local_hash.map(str::to_string);
                state.remote_hash = remote_hash.map(str::to_string);

                let agree = match (local_hash, remote_hash) {
                    (Some(l), Some(r)) => l == r,
                    _ => false,
                };
                state.sync_status = if agree {
                    SyncStatus::InSync
                } else {
                    SyncStatus::Modified
                };
                state.sync_progress = None;

                self.update_row(row, &state).await
            }
        }
    }

    /// Compute the sync action implied by the current hashes.
    ///
    /// No prior row means [`SyncAction::InitialSync`]; otherwise the pure
    /// delta logic on [`SyncState`] decides.
    pub async fn calculate_delta(
        &self,
        type_key: &str,
        local_hash: &str,
        remote_hash: &str,
    ) -> Result<SyncDelta> {
        match self.get(type_key).await? {
            None => Ok(SyncDelta {
                action: SyncAction::InitialSync,
                local_hash: Some(local_hash.to_string()),
                remote_hash: Some(remote_hash.to_string()),
            }),
            Some(state) => Ok(state.delta(local_hash, remote_hash)),
        }
    }

    /// Record a successful sync: all three hashes agree, status `in_sync`,
    /// conflict cleared, progress cleared. The only path that advances the
    /// merge base. Idempotent.
    pub async fn mark_as_synced(
        &self,
        type_key: &str,
        local_hash: &str,
        remote_hash: &str,
    ) -> Result<SyncState> {
        let mut state = self
            .get(type_key)
            .await?
            .unwrap_or_else(|| SyncState::new(type_key));

        state.local_hash = Some(local_hash.to_string());
        state.remote_hash = Some(remote_hash.to_string());
        state.last_synced_hash = Some(local_hash.to_string());
        state.sync_status = SyncStatus::InSync;
        state.conflict_status = ConflictStatus::None;
        state.sync_progress = None;
        state.last_sync_at = Some(Utc::now());

        self.upsert(&state).await
    }

    /// Mark a type as conflicted
    pub async fn mark_as_conflicted(&self, type_key: &str) -> Result<SyncState> {
        let mut state = self
            .get(type_key)
            .await?
            .unwrap_or_else(|| SyncState::new(type_key));
        state.sync_status = SyncStatus::Conflict;
        state.conflict_status = ConflictStatus::Detected;
        state.sync_progress = None;
        state.last_conflict_at = Some(Utc::now());
        self.upsert(&state).await
    }

    /// Record that a conflict was resolved. The subsequent `mark_as_synced`
    /// moves the row back to `in_sync`.
    pub async fn resolve_conflict(&self, type_key: &str) -> Result<SyncState> {
        let mut state = self
            .get(type_key)
            .await?
            .ok_or_else(|| SyncError::UnknownType(type_key.to_string()))?;
        state.conflict_status = ConflictStatus::Resolved;
        self.upsert(&state).await
    }

    /// Keys with an unresolved conflict
    pub async fn get_conflicted_types(&self) -> Result<Vec<String>> {
        let rows = SyncStateEntity::find()
            .filter(
                sync_state::Column::ConflictStatus.eq(ConflictStatus::Detected.to_string()),
            )
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(|r| r.type_key).collect())
    }

    /// Enter `syncing` with validated resumable progress.
    ///
    /// Malformed progress is rejected before any state mutation.
    pub async fn set_sync_progress(
        &self,
        type_key: &str,
        progress: SyncProgress,
    ) -> Result<SyncState> {
        progress
            .validate()
            .map_err(SyncError::InvalidProgress)?;

        let mut state = self
            .get(type_key)
            .await?
            .unwrap_or_else(|| SyncState::new(type_key));
        state.sync_status = SyncStatus::Syncing;
        state.sync_progress = Some(progress);
        self.upsert(&state).await
    }

    /// Read back resumable progress after a restart.
    ///
    /// Malformed stored progress is treated as absent: the row silently
    /// returns to `pending` instead of crashing resume logic.
    pub async fn resume_sync(&self, type_key: &str) -> Result<Option<SyncProgress>> {
        let Some(row) = self.find_row(type_key).await? else {
            return Ok(None);
        };

        let Some(raw) = row.sync_progress.clone() else {
            return Ok(None);
        };

        match serde_json::from_value::<SyncProgress>(raw)
            .map_err(|e| e.to_string())
            .and_then(|p| p.validate().map(|_| p))
        {
            Ok(progress) => Ok(Some(progress)),
            Err(reason) => {
                warn!(type_key, %reason, "discarding malformed sync progress");
                let mut state = to_domain(row.clone());
                state.sync_status = SyncStatus::Pending;
                state.sync_progress = None;
                self.update_row(row, &state).await?;
                Ok(None)
            }
        }
    }

    /// Abort an in-flight sync: status `failed`, progress cleared
    pub async fn rollback_partial_sync(&self, type_key: &str) -> Result<SyncState> {
        let mut state = self
            .get(type_key)
            .await?
            .ok_or_else(|| SyncError::UnknownType(type_key.to_string()))?;
        state.sync_status = SyncStatus::Failed;
        state.sync_progress = None;
        self.upsert(&state).await
    }

    /// Move a `failed` row back to `pending` for an operator retry
    pub async fn mark_pending(&self, type_key: &str) -> Result<SyncState> {
        let mut state = self
            .get(type_key)
            .await?
            .ok_or_else(|| SyncError::UnknownType(type_key.to_string()))?;
        state.sync_status = SyncStatus::Pending;
        state.sync_progress = None;
        self.upsert(&state).await
    }

    /// Every key stuck in `syncing` — the set a process restart must
    /// reconcile before doing new work
    pub async fn detect_interrupted_sync(&self) -> Result<Vec<String>> {
        let rows = SyncStateEntity::find()
            .filter(sync_state::Column::SyncStatus.eq(SyncStatus::Syncing.to_string()))
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(|r| r.type_key).collect())
    }

    /// Keys currently marked `failed`
    pub async fn failed_types(&self) -> Result<Vec<String>> {
        let rows = SyncStateEntity::find()
            .filter(sync_state::Column::SyncStatus.eq(SyncStatus::Failed.to_string()))
            .all(&self.conn)
            .await?;
        Ok(rows.into_iter().map(|r| r.type_key).collect())
    }

    /// Insert or update a state row
    pub async fn upsert(&self, state: &SyncState) -> Result<SyncState> {
        match self.find_row(&state.type_key).await? {
            None => self.insert(state).await,
            Some(row) => self.update_row(row, state).await,
        }
    }

    async fn find_row(&self, type_key: &str) -> Result<Option<sync_state::Model>> {
        Ok(SyncStateEntity::find()
            .filter(sync_state::Column::TypeKey.eq(type_key))
            .one(&self.conn)
            .await?)
    }

    async fn insert(&self, state: &SyncState) -> Result<SyncState> {
        let state = enforce_progress_invariant(state.clone());
        let now = Utc::now();
        let active = sync_state::ActiveModel {
            type_key: Set(state.type_key.clone()),
            local_hash: Set(state.local_hash.clone()),
            remote_hash: Set(state.remote_hash.clone()),
            last_synced_hash: Set(state.last_synced_hash.clone()),
            sync_status: Set(state.sync_status.to_string()),
            conflict_status: Set(state.conflict_status.to_string()),
            sync_progress: Set(progress_json(&state)),
            last_sync_at: Set(state.last_sync_at),
            last_conflict_at: Set(state.last_conflict_at),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        let row = active.insert(&self.conn).await?;
        Ok(to_domain(row))
    }

    async fn update_row(
        &self,
        row: sync_state::Model,
        state: &SyncState,
    ) -> Result<SyncState> {
        let state = enforce_progress_invariant(state.clone());
        let mut active: sync_state::ActiveModel = row.into();
        active.local_hash = Set(state.local_hash.clone());
        active.remote_hash = Set(state.remote_hash.clone());
        active.last_synced_hash = Set(state.last_synced_hash.clone());
        active.sync_status = Set(state.sync_status.to_string());
        active.conflict_status = Set(state.conflict_status.to_string());
        active.sync_progress = Set(progress_json(&state));
        active.last_sync_at = Set(state.last_sync_at);
        active.last_conflict_at = Set(state.last_conflict_at);
        active.updated_at = Set(Utc::now());
        let row = active.update(&self.conn).await?;
        Ok(to_domain(row))
    }
}

/// Progress may only survive a write while the row is `syncing`
fn enforce_progress_invariant(mut state: SyncState) -> SyncState {
    if !state.sync_status.allows_progress() {
        state.sync_progress = None;
    }
    state
}

fn progress_json(state: &SyncState) -> Option<serde_json::Value> {
    state
        .sync_progress
        .as_ref()
        .and_then(|p| serde_json::to_value(p).ok())
}

fn to_domain(row: sync_state::Model) -> SyncState {
    let sync_status = row
        .sync_status
        .parse::<SyncStatus>()
        .unwrap_or(SyncStatus::Pending);
    let conflict_status = row
        .conflict_status
        .parse::<ConflictStatus>()
        .unwrap_or(ConflictStatus::None);
    // Malformed progress is treated as absent on read; resume_sync also
    // downgrades the stored row.
    let sync_progress = row
        .sync_progress
        .and_then(|v| serde_json::from_value::<SyncProgress>(v).ok())
        .filter(|p| p.validate().is_ok());

    SyncState {
        type_key: row.type_key,
        local_hash: row.local_hash,
        remote_hash: row.remote_hash,
        last_synced_hash: row.last_synced_hash,
        sync_status,
        conflict_status,
        sync_progress,
        last_sync_at: row.last_sync_at,
        last_conflict_at: row.last_conflict_at,
    }
}
