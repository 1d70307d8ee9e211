//! Conflict detection and classification
//!
//! A conflict exists precisely when the delta action is `Conflict`: both
//! sides diverged from the last agreed hash. Classification compares the
//! field-level diffs of each side against the merge base.

use crate::domain::conflict::{ConflictSeverity, ConflictType};
use crate::domain::content_type::ContentTypeDefinition;
use crate::domain::diff::FieldDiff;
use crate::domain::sync::SyncAction;
use crate::hashing;
use crate::sync::error::Result;
use crate::sync::state_store::SyncStateStore;
use crate::sync::version_store::VersionStore;
use tracing::{debug, instrument};

/// A classified divergence, input to the conflict manager and the
/// resolution strategy selector
#[derive(Debug, Clone)]
pub struct ConflictAssessment {
    pub type_key: String,
    pub conflict_type: ConflictType,
    pub severity: ConflictSeverity,
    /// Merge base → local
    pub source_changes: FieldDiff,
    /// Merge base → remote
    pub target_changes: FieldDiff,
    pub local_hash: String,
    pub remote_hash: String,
}

/// Detects and classifies true conflicts
#[derive(Clone)]
pub struct ConflictDetector {
    state_store: SyncStateStore,
    version_store: VersionStore,
}

impl ConflictDetector {
    pub fn new(state_store: SyncStateStore, version_store: VersionStore) -> Self {
        Self {
            state_store,
            version_store,
        }
    }

    /// Assess whether local and remote definitions of a type are in true
    /// conflict; `None` means a clean push/pull or no change.
    #[instrument(skip_all, fields(type_key = local.key))]
    pub async fn assess(
        &self,
        local: &ContentTypeDefinition,
        remote: &ContentTypeDefinition,
    ) -> Result<Option<ConflictAssessment>> {
        local.validate()?;
        remote.validate()?;

        let local_hash = hashing::content_hash(local)?;
        let remote_hash = hashing::content_hash(remote)?;

        let delta = self
            .state_store
            .calculate_delta(&local.key, &local_hash, &remote_hash)
            .await?;
        if delta.action != SyncAction::Conflict {
            debug!(action = %delta.action, "no conflict");
            return Ok(None);
        }

        let base_fields = match self.merge_base_fields(&local.key).await? {
            Some(fields) => fields,
            None => {
                // No recoverable merge base: the divergence cannot be
                // attributed to either side, so classify conservatively.
                return Ok(Some(ConflictAssessment {
                    type_key: local.key.clone(),
                    conflict_type: ConflictType::Structural,
                    severity: ConflictSeverity::High,
                    source_changes: FieldDiff::between(&remote.fields, &local.fields),
                    target_changes: FieldDiff::between(&local.fields, &remote.fields),
                    local_hash,
                    remote_hash,
                }));
            }
        };

        let source_changes = FieldDiff::between(&base_fields, &local.fields);
        let target_changes = FieldDiff::between(&base_fields, &remote.fields);
        let (conflict_type, severity) =
            classify(&source_changes, &target_changes, local, remote);

        Ok(Some(ConflictAssessment {
            type_key: local.key.clone(),
            conflict_type,
            severity,
            source_changes,
            target_changes,
            local_hash,
            remote_hash,
        }))
    }

    async fn merge_base_fields(
        &self,
        type_key: &str,
    ) -> Result<Option<Vec<crate::domain::content_type::FieldDescriptor>>> {
        let Some(state) = self.state_store.get(type_key).await? else {
            return Ok(None);
        };
        let Some(base_hash) = state.last_synced_hash else {
            return Ok(None);
        };
        Ok(self
            .version_store
            .get_version(&base_hash)
            .await?
            .map(|record| record.snapshot.fields))
    }
}

/// Classify a conflict from the two per-side diffs.
///
/// Field-kind changes on shared fields are high severity; additive-only
/// changes on disjoint field sets are low severity and frequently
/// auto-mergeable.
fn classify(
    source: &FieldDiff,
    target: &FieldDiff,
    local: &ContentTypeDefinition,
    remote: &ContentTypeDefinition,
) -> (ConflictType, ConflictSeverity) {
    // A shared field whose kind differs between the two sides is the most
    // dangerous outcome: content stored under one kind may not parse as the
    // other.
    let kind_mismatch = local.fields.iter().any(|lf| {
        remote
            .field(&lf.key)
            .map(|rf| rf.kind != lf.kind)
            .unwrap_or(false)
    });
    if kind_mismatch {
        return (ConflictType::FieldTypeMismatch, ConflictSeverity::High);
    }

    let disjoint = source.disjoint_from(target);

    if source.is_additive_only() && target.is_additive_only() && disjoint {
        return (ConflictType::FieldAdded, ConflictSeverity::Low);
    }

    let any_removed = !source.removed.is_empty() || !target.removed.is_empty();
    if any_removed {
        let severity = if disjoint {
            ConflictSeverity::Medium
        } else {
            ConflictSeverity::High
        };
        return (ConflictType::FieldRemoved, severity);
    }

    let severity = if disjoint {
        ConflictSeverity::Medium
    } else {
        ConflictSeverity::High
    };
    (ConflictType::Structural, severity)
}
