//! Deployment orchestrator
//!
//! Drives a deployment end to end: change detection, conflict gating,
//! per-item push with retry, version recording, and the status channel.
//! This is the only code that calls `mark_as_synced`/`mark_as_conflicted`;
//! the stores stay policy-free.

use crate::config::EngineConfig;
use crate::domain::content_type::ContentTypeDefinition;
use crate::domain::deployment::{DeploymentStatus, SyncPhase};
use crate::domain::sync::{SyncAction, SyncProgress};
use crate::domain::version::ChangeSource;
use crate::hashing;
use crate::infrastructure::database::entities::{
    content_type, sync_history, ContentType as ContentTypeEntity,
};
use crate::infrastructure::events::{Event, EventBus};
use crate::infrastructure::remote::{RemoteClient, RemoteError};
use crate::sync::change_detector::ChangeDetector;
use crate::sync::conflict_detector::ConflictDetector;
use crate::sync::conflict_manager::ConflictManager;
use crate::sync::error::{Result, SyncError};
use crate::sync::resolution::ResolutionStrategySelector;
use crate::sync::state_store::SyncStateStore;
use crate::sync::version_store::{HistoryWriteOutcome, VersionStore};
use chrono::{DateTime, Utc};
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Options for a single deployment
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Restrict the deployment to these type keys
    pub keys: Option<HashSet<String>>,
    /// Override the configured auto-resolution policy
    pub auto_resolve: Option<bool>,
    pub author: Option<String>,
    pub message: Option<String>,
}

/// Terminal report for a deployment
#[derive(Debug, Clone)]
pub struct DeploymentReport {
    pub deployment_id: Uuid,
    pub status: DeploymentStatus,
    /// Keys pushed and marked in sync
    pub pushed: Vec<String>,
    /// Keys whose push failed after retries
    pub failed: Vec<String>,
    /// Keys halted or flagged by conflict detection
    pub conflicts: Vec<String>,
    /// Keys skipped (no change, or the remote side is ahead)
    pub skipped: Vec<String>,
    pub logs: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
enum PushKind {
    Create,
    Update { etag: String },
}

#[derive(Debug, Clone)]
struct PushItem {
    key: String,
    definition: ContentTypeDefinition,
    local_hash: String,
    kind: PushKind,
    /// Present when the item is a resolved conflict; the recorded version
    /// gets both hashes as parents
    merge_parents: Option<(String, String)>,
}

enum PushAttempt {
    Pushed,
    /// The remote moved underneath the etag (HTTP 412)
    Stale,
    Failed(RemoteError),
}

/// Orchestrates deployments of locally authored content types to the
/// remote platform
pub struct SyncOrchestrator {
    conn: DatabaseConnection,
    remote: Arc<dyn RemoteClient>,
    events: Arc<EventBus>,
    config: EngineConfig,
    state_store: SyncStateStore,
    version_store: VersionStore,
    change_detector: ChangeDetector,
    conflict_detector: ConflictDetector,
    conflict_manager: ConflictManager,
    selector: ResolutionStrategySelector,
    /// Per-key async locks serializing concurrent work on the same type
    key_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SyncOrchestrator {
    pub fn new(
        conn: DatabaseConnection,
        remote: Arc<dyn RemoteClient>,
        events: Arc<EventBus>,
        config: EngineConfig,
    ) -> Self {
        let state_store = SyncStateStore::new(conn.clone());
        let version_store = VersionStore::new(conn.clone());
        Self {
            change_detector: ChangeDetector::with_state_store(state_store.clone()),
            conflict_detector: ConflictDetector::new(
                state_store.clone(),
                version_store.clone(),
            ),
            conflict_manager: ConflictManager::new(conn.clone(), state_store.clone()),
            selector: ResolutionStrategySelector::new(),
            key_locks: Mutex::new(HashMap::new()),
            conn,
            remote,
            events,
            config,
            state_store,
            version_store,
        }
    }

    /// Deploy locally authored definitions to the remote platform.
    ///
    /// Unresolved conflicts halt the whole deployment before any push;
    /// per-item push failures after that point are isolated.
    #[instrument(skip_all, fields(types = local.len()))]
    pub async fn deploy(
        &self,
        local: &[ContentTypeDefinition],
        options: SyncOptions,
    ) -> Result<DeploymentReport> {
        let deployment_id = Uuid::new_v4();
        let started_at = Utc::now();
        let auto_resolve = options
            .auto_resolve
            .unwrap_or(self.config.auto_resolve_conflicts);
        let mut logs = Vec::new();
        let mut skipped = Vec::new();
        let mut conflicts = Vec::new();

        self.progress(
            deployment_id,
            SyncPhase::DetectingChanges,
            0.0,
            "listing remote content types",
        );

        let remote_types = self.remote.list_content_types().await?;
        let remote_defs: Vec<ContentTypeDefinition> = remote_types
            .iter()
            .map(|t| t.definition.clone())
            .collect();
        let etags: HashMap<String, String> = remote_types
            .iter()
            .map(|t| (t.definition.key.clone(), t.etag.clone()))
            .collect();

        let change_set = match &options.keys {
            Some(keys) => {
                self.change_detector
                    .detect_changes_for_keys(local, &remote_defs, keys)
                    .await?
            }
            None => {
                self.change_detector
                    .detect_changes(local, &remote_defs)
                    .await?
            }
        };
        logs.push(format!("change detection: {}", change_set.summary().trim_end()));

        let local_by_key: HashMap<&str, &ContentTypeDefinition> =
            local.iter().map(|d| (d.key.as_str(), d)).collect();
        let remote_by_key: HashMap<&str, &ContentTypeDefinition> =
            remote_defs.iter().map(|d| (d.key.as_str(), d)).collect();

        for change in &change_set.created {
            // Remote-only types are pull work, out of scope for a push
            // deployment.
            skipped.push(change.type_key.clone());
            logs.push(format!("{}: exists only remotely, skipped", change.type_key));
        }
        skipped.extend(change_set.unchanged.iter().map(|c| c.type_key.clone()));

        self.progress(
            deployment_id,
            SyncPhase::CheckingConflicts,
            10.0,
            "classifying changed types",
        );

        let mut items: Vec<PushItem> = Vec::new();
        let mut unresolved: Vec<String> = Vec::new();

        for change in &change_set.deleted {
            // Local-only types are creates.
            let Some(def) = local_by_key.get(change.type_key.as_str()) else {
                continue;
            };
            items.push(PushItem {
                key: change.type_key.clone(),
                definition: (*def).clone(),
                local_hash: hashing::content_hash(def)?,
                kind: PushKind::Create,
                merge_parents: None,
            });
        }

        for change in &change_set.updated {
            let key = change.type_key.as_str();
            let (Some(local_def), Some(remote_def)) =
                (local_by_key.get(key), remote_by_key.get(key))
            else {
                continue;
            };
            let local_hash = hashing::content_hash(local_def)?;
            let remote_hash = hashing::content_hash(remote_def)?;
            let delta = self
                .state_store
                .calculate_delta(key, &local_hash, &remote_hash)
                .await?;

            match delta.action {
                SyncAction::NoChange => skipped.push(key.to_string()),
                SyncAction::Pull => {
                    skipped.push(key.to_string());
                    logs.push(format!("{}: remote is ahead, skipped", key));
                }
                SyncAction::Push | SyncAction::InitialSync => {
                    let etag = etags.get(key).cloned().unwrap_or_default();
                    items.push(PushItem {
                        key: key.to_string(),
                        definition: (*local_def).clone(),
                        local_hash,
                        kind: PushKind::Update { etag },
                        merge_parents: None,
                    });
                }
                SyncAction::Conflict => {
                    let Some(assessment) =
                        self.conflict_detector.assess(local_def, remote_def).await?
                    else {
                        skipped.push(key.to_string());
                        continue;
                    };
                    let conflict =
                        self.conflict_manager.flag_for_review(&assessment, 0).await?;
                    self.events.emit(Event::ConflictDetected {
                        type_key: key.to_string(),
                        severity: conflict.severity,
                    });
                    conflicts.push(key.to_string());

                    if !auto_resolve {
                        unresolved.push(key.to_string());
                        continue;
                    }

                    let strategy = self.selector.select_best_strategy(&conflict);
                    let outcome = self.selector.resolve(
                        &conflict,
                        strategy,
                        local_def,
                        remote_def,
                        options.author.as_deref(),
                    );
                    let Some(resolution) = outcome.resolution else {
                        unresolved.push(key.to_string());
                        logs.push(format!("{}: conflict requires manual resolution", key));
                        continue;
                    };

                    self.conflict_manager
                        .resolve_conflict(key, resolution.clone())
                        .await?;
                    self.state_store.resolve_conflict(key).await?;
                    conflicts.retain(|k| k != key);
                    let merged = self.selector.merged_definition(local_def, &resolution);
                    let merged_hash = hashing::content_hash(&merged)?;
                    logs.push(format!("{}: conflict auto-resolved ({})", key, strategy));
                    self.record_divergent_sides(key, local_def, remote_def).await;
                    let etag = etags.get(key).cloned().unwrap_or_default();
                    items.push(PushItem {
                        key: key.to_string(),
                        definition: merged,
                        local_hash: merged_hash,
                        kind: PushKind::Update { etag },
                        merge_parents: Some((
                            assessment.local_hash.clone(),
                            assessment.remote_hash.clone(),
                        )),
                    });
                }
            }
        }

        if !unresolved.is_empty() {
            logs.push(format!(
                "deployment halted: {} unresolved conflict(s)",
                unresolved.len()
            ));
            let report = DeploymentReport {
                deployment_id,
                status: DeploymentStatus::Conflicted,
                pushed: Vec::new(),
                failed: Vec::new(),
                conflicts,
                skipped,
                logs,
                started_at,
                finished_at: Utc::now(),
            };
            self.finish(&report);
            return Ok(report);
        }

        items.sort_by(|a, b| a.key.cmp(&b.key));
        self.events.emit(Event::DeploymentStarted {
            deployment_id,
            total_items: items.len(),
        });

        // Durable capture: a later retry_failed_syncs must see exactly what
        // this deployment tried to push, even across a restart.
        for item in &items {
            self.capture_definition(&item.definition).await?;
        }

        let report = self
            .push_items(
                deployment_id,
                items,
                &options,
                logs,
                conflicts,
                Vec::new(),
                skipped,
                started_at,
            )
            .await?;
        self.finish(&report);
        Ok(report)
    }

    /// Re-push only the types whose last deployment attempt failed, using
    /// the snapshots captured at deploy time.
    #[instrument(skip(self))]
    pub async fn retry_failed_syncs(&self, options: SyncOptions) -> Result<DeploymentReport> {
        let deployment_id = Uuid::new_v4();
        let started_at = Utc::now();
        let failed = self.state_store.failed_types().await?;

        let mut items = Vec::new();
        let mut logs = Vec::new();
        let mut still_failed = Vec::new();
        for key in &failed {
            let Some(definition) = self.captured_definition(key).await? else {
                logs.push(format!("{}: no captured snapshot, skipped", key));
                continue;
            };
            // Check remote existence before touching the row: a key only
            // moves off `failed` once it is actually queued, so an error
            // here leaves it visible to the next retry.
            let kind = match self.remote.get_content_type(key).await {
                Ok(remote_type) => PushKind::Update {
                    etag: remote_type.etag,
                },
                Err(RemoteError::NotFound(_)) => PushKind::Create,
                Err(e) => {
                    warn!(type_key = key.as_str(), error = %e, "existence check failed");
                    logs.push(format!("{}: existence check failed: {}", key, e));
                    still_failed.push(key.clone());
                    continue;
                }
            };
            self.state_store.mark_pending(key).await?;
            items.push(PushItem {
                key: key.clone(),
                local_hash: hashing::content_hash(&definition)?,
                definition,
                kind,
                merge_parents: None,
            });
        }

        info!(retrying = items.len(), "retrying failed syncs");
        self.events.emit(Event::DeploymentStarted {
            deployment_id,
            total_items: items.len(),
        });

        let report = self
            .push_items(
                deployment_id,
                items,
                &options,
                logs,
                Vec::new(),
                still_failed,
                Vec::new(),
                started_at,
            )
            .await?;
        self.finish(&report);
        Ok(report)
    }

    #[allow(clippy::too_many_arguments)]
    async fn push_items(
        &self,
        deployment_id: Uuid,
        items: Vec<PushItem>,
        options: &SyncOptions,
        mut logs: Vec<String>,
        mut conflicts: Vec<String>,
        mut failed: Vec<String>,
        skipped: Vec<String>,
        started_at: DateTime<Utc>,
    ) -> Result<DeploymentReport> {
        let total = items.len();
        let mut pushed = Vec::new();

        for (index, item) in items.into_iter().enumerate() {
            let lock = self.key_lock(&item.key).await;
            let _guard = lock.lock().await;

            self.progress(
                deployment_id,
                SyncPhase::Pushing,
                percentage(index, total),
                &format!("pushing {}", item.key),
            );
            self.state_store
                .set_sync_progress(
                    &item.key,
                    SyncProgress {
                        current_step: index as u32 + 1,
                        total_steps: total.max(1) as u32,
                        last_processed_id: Some(deployment_id.to_string()),
                        processed_count: Some(pushed.len() as u32),
                        error: None,
                    },
                )
                .await?;
            self.write_history(deployment_id, &item.key, 0, "attempt", None, &item.local_hash)
                .await?;

            match self.push_with_retry(deployment_id, &item).await? {
                PushAttempt::Pushed => {
                    self.after_push(deployment_id, &item, options, &mut logs)
                        .await?;
                    pushed.push(item.key.clone());
                }
                PushAttempt::Stale => {
                    match self.handle_stale(deployment_id, &item).await? {
                        StaleOutcome::Converged => {
                            logs.push(format!("{}: remote already matches, marked in sync", item.key));
                            pushed.push(item.key.clone());
                        }
                        StaleOutcome::Conflicted => {
                            logs.push(format!("{}: remote changed mid-push, flagged as conflict", item.key));
                            conflicts.push(item.key.clone());
                        }
                        StaleOutcome::Pushed => {
                            self.after_push(deployment_id, &item, options, &mut logs)
                                .await?;
                            pushed.push(item.key.clone());
                        }
                        StaleOutcome::Failed(e) => {
                            self.state_store.rollback_partial_sync(&item.key).await?;
                            self.write_history(
                                deployment_id,
                                &item.key,
                                0,
                                "failed",
                                Some(&e.to_string()),
                                &item.local_hash,
                            )
                            .await?;
                            logs.push(format!("{}: push failed: {}", item.key, e));
                            failed.push(item.key.clone());
                        }
                    }
                }
                PushAttempt::Failed(e) => {
                    self.state_store.rollback_partial_sync(&item.key).await?;
                    self.write_history(
                        deployment_id,
                        &item.key,
                        0,
                        "failed",
                        Some(&e.to_string()),
                        &item.local_hash,
                    )
                    .await?;
                    logs.push(format!("{}: push failed: {}", item.key, e));
                    failed.push(item.key.clone());
                }
            }
        }

        let status = if pushed.is_empty() && failed.is_empty() && !conflicts.is_empty() {
            DeploymentStatus::Conflicted
        } else if failed.is_empty() && conflicts.is_empty() {
            DeploymentStatus::Completed
        } else if pushed.is_empty() {
            DeploymentStatus::Failed
        } else {
            DeploymentStatus::Partial
        };

        logs.push(format!(
            "deployment {}: {} pushed, {} failed, {} conflicted, {} skipped",
            status,
            pushed.len(),
            failed.len(),
            conflicts.len(),
            skipped.len()
        ));

        Ok(DeploymentReport {
            deployment_id,
            status,
            pushed,
            failed,
            conflicts,
            skipped,
            logs,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Push one item, retrying transient failures with exponential backoff
    /// and jitter up to the configured ceiling.
    async fn push_with_retry(
        &self,
        deployment_id: Uuid,
        item: &PushItem,
    ) -> Result<PushAttempt> {
        let mut attempt: u32 = 0;
        loop {
            let result = match &item.kind {
                PushKind::Create => self.remote.create_content_type(&item.definition).await,
                PushKind::Update { etag } => {
                    self.remote
                        .update_content_type(&item.key, &item.definition, etag)
                        .await
                }
            };

            match result {
                Ok(_) => return Ok(PushAttempt::Pushed),
                Err(RemoteError::PreconditionFailed) => return Ok(PushAttempt::Stale),
                Err(e) if e.is_transient() && attempt < self.config.max_retry_attempts => {
                    let retry_after = match &e {
                        RemoteError::RateLimited { retry_after } => *retry_after,
                        _ => None,
                    };
                    let delay = self.backoff_delay(attempt, retry_after);
                    attempt += 1;
                    warn!(
                        type_key = item.key,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient push failure, retrying"
                    );
                    self.write_history(
                        deployment_id,
                        &item.key,
                        attempt as i32,
                        "retry",
                        Some(&e.to_string()),
                        &item.local_hash,
                    )
                    .await?;
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Ok(PushAttempt::Failed(e)),
            }
        }
    }

    /// Bookkeeping after a successful push: advance the merge base, record
    /// the version (best-effort), log the attempt, emit the event.
    async fn after_push(
        &self,
        deployment_id: Uuid,
        item: &PushItem,
        options: &SyncOptions,
        logs: &mut Vec<String>,
    ) -> Result<()> {
        self.state_store
            .mark_as_synced(&item.key, &item.local_hash, &item.local_hash)
            .await?;

        let history = match &item.merge_parents {
            Some((parent_a, parent_b)) => {
                self.version_store
                    .try_record_merge(
                        &item.definition,
                        parent_a,
                        parent_b,
                        options.author.as_deref(),
                        options.message.as_deref(),
                    )
                    .await
            }
            None => {
                self.version_store
                    .try_record_change(
                        &item.definition,
                        ChangeSource::Sync,
                        options.author.as_deref(),
                        options.message.as_deref(),
                    )
                    .await
            }
        };
        let version_hash = match history {
            HistoryWriteOutcome::Recorded(record) => Some(record.version_hash),
            HistoryWriteOutcome::Unchanged => None,
            HistoryWriteOutcome::Failed(reason) => {
                logs.push(format!("{}: history write failed: {}", item.key, reason));
                None
            }
        };

        self.write_history(deployment_id, &item.key, 0, "pushed", None, &item.local_hash)
            .await?;
        logs.push(format!("{}: pushed", item.key));
        self.events.emit(Event::TypeSynced {
            type_key: item.key.clone(),
            version_hash,
        });
        debug!(type_key = item.key, "push complete");
        Ok(())
    }

    /// Record both sides of an auto-resolved divergence as version records
    /// parented on the current head, so the merge record's parent links
    /// resolve to real nodes. Best-effort: history problems must not block
    /// the deployment.
    async fn record_divergent_sides(
        &self,
        key: &str,
        local_def: &ContentTypeDefinition,
        remote_def: &ContentTypeDefinition,
    ) {
        let parents: Vec<String> = match self.version_store.head(key).await {
            Ok(head) => head.map(|h| vec![h.version_hash]).unwrap_or_default(),
            Err(e) => {
                warn!(type_key = key, error = %e, "head lookup failed before merge");
                Vec::new()
            }
        };
        let sides = [
            (local_def, ChangeSource::Ui),
            (remote_def, ChangeSource::Sync),
        ];
        for (def, source) in sides {
            if let Err(e) = self
                .version_store
                .record_version(def, &parents, source, None, None)
                .await
            {
                warn!(type_key = key, error = %e, "failed to record divergent side");
            }
        }
    }

    /// A 412 means the remote moved under the etag. Re-read the remote and
    /// route the pair back through conflict detection; if the remote happens
    /// to already match the local content, the push degenerates to a no-op.
    async fn handle_stale(
        &self,
        deployment_id: Uuid,
        item: &PushItem,
    ) -> Result<StaleOutcome> {
        let fresh = self.remote.get_content_type(&item.key).await?;
        let fresh_hash = hashing::content_hash(&fresh.definition)?;
        self.state_store
            .record_observation(&item.key, Some(&item.local_hash), Some(&fresh_hash))
            .await?;

        if fresh_hash == item.local_hash {
            self.state_store
                .mark_as_synced(&item.key, &item.local_hash, &fresh_hash)
                .await?;
            self.write_history(deployment_id, &item.key, 0, "converged", None, &item.local_hash)
                .await?;
            return Ok(StaleOutcome::Converged);
        }

        match self
            .conflict_detector
            .assess(&item.definition, &fresh.definition)
            .await?
        {
            Some(assessment) => {
                let conflict = self.conflict_manager.flag_for_review(&assessment, 0).await?;
                self.events.emit(Event::ConflictDetected {
                    type_key: item.key.clone(),
                    severity: conflict.severity,
                });
                self.write_history(
                    deployment_id,
                    &item.key,
                    0,
                    "conflict",
                    Some("remote changed mid-push"),
                    &item.local_hash,
                )
                .await?;
                Ok(StaleOutcome::Conflicted)
            }
            None => {
                // A clean push against the refreshed etag; one more attempt,
                // no retry ladder.
                match self
                    .remote
                    .update_content_type(&item.key, &item.definition, &fresh.etag)
                    .await
                {
                    Ok(_) => Ok(StaleOutcome::Pushed),
                    Err(e) => Ok(StaleOutcome::Failed(e)),
                }
            }
        }
    }

    /// Upsert the definition a deployment is about to push into the local
    /// catalog table
    async fn capture_definition(&self, definition: &ContentTypeDefinition) -> Result<()> {
        let json =
            serde_json::to_value(definition).map_err(|e| SyncError::CorruptRecord {
                type_key: definition.key.clone(),
                detail: e.to_string(),
            })?;
        let now = Utc::now();

        let existing = ContentTypeEntity::find()
            .filter(content_type::Column::TypeKey.eq(&definition.key))
            .one(&self.conn)
            .await?;
        match existing {
            Some(row) => {
                let mut active: content_type::ActiveModel = row.into();
                active.name = Set(definition.name.clone());
                active.category = Set(definition.category.clone());
                active.definition = Set(json);
                active.updated_at = Set(now);
                active.update(&self.conn).await?;
            }
            None => {
                let active = content_type::ActiveModel {
                    type_key: Set(definition.key.clone()),
                    name: Set(definition.name.clone()),
                    category: Set(definition.category.clone()),
                    definition: Set(json),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                };
                active.insert(&self.conn).await?;
            }
        }
        Ok(())
    }

    async fn captured_definition(
        &self,
        type_key: &str,
    ) -> Result<Option<ContentTypeDefinition>> {
        let Some(row) = ContentTypeEntity::find()
            .filter(content_type::Column::TypeKey.eq(type_key))
            .one(&self.conn)
            .await?
        else {
            return Ok(None);
        };
        let definition = serde_json::from_value(row.definition).map_err(|e| {
            SyncError::CorruptRecord {
                type_key: type_key.to_string(),
                detail: e.to_string(),
            }
        })?;
        Ok(Some(definition))
    }

    async fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        // Evict entries nobody holds; the map must not grow with every key
        // ever deployed.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn backoff_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let base = self
            .config
            .retry_base_delay_ms
            .saturating_mul(1u64 << attempt.min(16));
        let jitter = {
            let mut rng = rand::thread_rng();
            rng.gen_range(0..=self.config.retry_base_delay_ms.max(1) / 2)
        };
        let delay = Duration::from_millis(base.saturating_add(jitter));
        match retry_after {
            Some(hinted) => hinted.max(delay),
            None => delay,
        }
    }

    async fn write_history(
        &self,
        deployment_id: Uuid,
        type_key: &str,
        attempt: i32,
        outcome: &str,
        message: Option<&str>,
        snapshot_hash: &str,
    ) -> Result<()> {
        let row = sync_history::ActiveModel {
            deployment_id: Set(deployment_id),
            type_key: Set(type_key.to_string()),
            direction: Set("push".to_string()),
            attempt: Set(attempt),
            outcome: Set(outcome.to_string()),
            message: Set(message.map(str::to_string)),
            snapshot_hash: Set(Some(snapshot_hash.to_string())),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        row.insert(&self.conn).await?;
        Ok(())
    }

    fn progress(&self, deployment_id: Uuid, phase: SyncPhase, percentage: f32, message: &str) {
        self.events.emit(Event::DeploymentProgress {
            deployment_id,
            phase,
            percentage,
            message: message.to_string(),
        });
    }

    fn finish(&self, report: &DeploymentReport) {
        self.progress(
            report.deployment_id,
            SyncPhase::Finished,
            100.0,
            "deployment finished",
        );
        self.events.emit(Event::DeploymentFinished {
            deployment_id: report.deployment_id,
            status: report.status,
            logs: report.logs.clone(),
        });
        info!(
            deployment_id = %report.deployment_id,
            status = %report.status,
            pushed = report.pushed.len(),
            failed = report.failed.len(),
            conflicts = report.conflicts.len(),
            "deployment finished"
        );
    }
}

enum StaleOutcome {
    /// The remote already holds the local content
    Converged,
    Conflicted,
    Pushed,
    Failed(RemoteError),
}

fn percentage(done: usize, total: usize) -> f32 {
    if total == 0 {
        return 100.0;
    }
    (done as f32 / total as f32) * 100.0
}
