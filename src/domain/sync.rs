//! Sync state, status machine, resumable progress, and delta calculation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Per-type sync lifecycle status
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncStatus {
    /// First detection of the type, nothing synced yet
    New,
    /// Known but awaiting a sync
    Pending,
    /// Local or remote edits since last sync
    Modified,
    /// Push/pull in flight, resumable progress is present
    Syncing,
    /// Both sides agree on the last synced hash
    InSync,
    /// Divergence detected, resolution required
    Conflict,
    /// A sync attempt was rolled back
    Failed,
}

impl SyncStatus {
    /// Whether resumable progress may be attached in this status
    pub fn allows_progress(&self) -> bool {
        matches!(self, Self::Syncing)
    }
}

/// Conflict bookkeeping, orthogonal to the sync status
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConflictStatus {
    None,
    Detected,
    Resolved,
}

/// Resumable progress for an in-flight sync.
///
/// Present iff the row is in [`SyncStatus::Syncing`]; every transition helper
/// clears it when entering any other status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub current_step: u32,
    pub total_steps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_processed_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncProgress {
    /// Validate the invariants enforced on every write and read
    pub fn validate(&self) -> Result<(), String> {
        if self.total_steps == 0 {
            return Err("total_steps must be at least 1".to_string());
        }
        if self.current_step > self.total_steps {
            return Err(format!(
                "current_step {} exceeds total_steps {}",
                self.current_step, self.total_steps
            ));
        }
        Ok(())
    }
}

/// The sync action implied by the current local/remote hashes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncAction {
    InitialSync,
    Push,
    Pull,
    Conflict,
    NoChange,
}

/// Result of delta calculation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncDelta {
    pub action: SyncAction,
    pub local_hash: Option<String>,
    pub remote_hash: Option<String>,
}

/// Mutable per-type sync record, one per `type_key`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub type_key: String,
    pub local_hash: Option<String>,
    pub remote_hash: Option<String>,
    /// The merge base: the hash both sides agreed on at the most recent
    /// successful sync
    pub last_synced_hash: Option<String>,
    pub sync_status: SyncStatus,
    pub conflict_status: ConflictStatus,
    pub sync_progress: Option<SyncProgress>,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_conflict_at: Option<DateTime<Utc>>,
}

impl SyncState {
    pub fn new(type_key: impl Into<String>) -> Self {
        Self {
            type_key: type_key.into(),
            local_hash: None,
            remote_hash: None,
            last_synced_hash: None,
            sync_status: SyncStatus::New,
            conflict_status: ConflictStatus::None,
            sync_progress: None,
            last_sync_at: None,
            last_conflict_at: None,
        }
    }

    /// Classify the sync action for the given current hashes.
    ///
    /// With a merge base, each side is compared against it. Without one the
    /// previously stored hashes are used to infer direction, and ambiguity
    /// classifies as [`SyncAction::Conflict`]: the engine never silently
    /// overwrites a side it cannot prove unchanged.
    pub fn delta(&self, local_hash: &str, remote_hash: &str) -> SyncDelta {
        let action = if local_hash == remote_hash {
            // Identical content on both sides is never a conflict, no matter
            // how it was produced.
            SyncAction::NoChange
        } else if let Some(base) = &self.last_synced_hash {
            let local_changed = local_hash != base;
            let remote_changed = remote_hash != base;
            match (local_changed, remote_changed) {
                (true, true) => SyncAction::Conflict,
                (true, false) => SyncAction::Push,
                (false, true) => SyncAction::Pull,
                (false, false) => SyncAction::NoChange,
            }
        } else {
            let local_changed = self.local_hash.as_deref() != Some(local_hash);
            let remote_changed = self.remote_hash.as_deref() != Some(remote_hash);
            match (local_changed, remote_changed) {
                (true, false) => SyncAction::Push,
                (false, true) => SyncAction::Pull,
                // No merge base and both sides moved: direction is
                // unknowable, so classify as a conflict.
                _ => SyncAction::Conflict,
            }
        };

        SyncDelta {
            action,
            local_hash: Some(local_hash.to_string()),
            remote_hash: Some(remote_hash.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_base(base: &str) -> SyncState {
        let mut state = SyncState::new("article");
        state.local_hash = Some(base.to_string());
        state.remote_hash = Some(base.to_string());
        state.last_synced_hash = Some(base.to_string());
        state.sync_status = SyncStatus::InSync;
        state
    }

    #[test]
    fn delta_push_when_only_local_changed() {
        let state = state_with_base("h0");
        assert_eq!(state.delta("h1", "h0").action, SyncAction::Push);
    }

    #[test]
    fn delta_pull_when_only_remote_changed() {
        let state = state_with_base("h0");
        assert_eq!(state.delta("h0", "h1").action, SyncAction::Pull);
    }

    #[test]
    fn delta_conflict_when_both_changed() {
        let state = state_with_base("h0");
        assert_eq!(state.delta("h1", "h2").action, SyncAction::Conflict);
    }

    #[test]
    fn delta_no_change_when_neither_changed() {
        let state = state_with_base("h0");
        assert_eq!(state.delta("h0", "h0").action, SyncAction::NoChange);
    }

    #[test]
    fn identical_hashes_never_conflict() {
        // Both sides diverged from the base but converged on the same
        // content: no false conflict.
        let state = state_with_base("h0");
        assert_eq!(state.delta("h1", "h1").action, SyncAction::NoChange);
    }

    #[test]
    fn ambiguous_direction_defaults_to_conflict() {
        let mut state = SyncState::new("article");
        state.local_hash = Some("a".to_string());
        state.remote_hash = Some("b".to_string());
        assert_eq!(state.delta("c", "d").action, SyncAction::Conflict);
    }

    #[test]
    fn progress_validation_rejects_overflow() {
        let progress = SyncProgress {
            current_step: 5,
            total_steps: 3,
            last_processed_id: None,
            processed_count: None,
            error: None,
        };
        assert!(progress.validate().is_err());
    }
}
