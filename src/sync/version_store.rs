//! Append-only version history with DAG queries
//!
//! Every accepted change (UI, AI, or sync) becomes a record whose parents
//! always live in the join table; merges are records with two parents.
//! History is advisory: the orchestrator uses the `try_*` variants whose
//! failures are explicit results rather than hard errors.

use crate::domain::content_type::ContentTypeDefinition;
use crate::domain::diff::FieldDiff;
use crate::domain::snapshot::ContentTypeSnapshot;
use crate::domain::version::{ChangeSource, VersionRecord};
use crate::hashing;
use crate::infrastructure::database::entities::{
    content_type_version, version_parent, ContentTypeVersion, VersionParent,
};
use crate::sync::error::{Result, SyncError};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

/// Result of an append attempt
#[derive(Debug, Clone)]
pub enum RecordOutcome {
    Recorded(VersionRecord),
    /// The content hash already heads this type's history; appending it
    /// again would be a no-op (and a cycle)
    Unchanged { hash: String },
}

/// Best-effort variant surfaced to callers that must not fail on history
/// problems. Losing history is recoverable; losing the content change is not.
#[derive(Debug, Clone)]
pub enum HistoryWriteOutcome {
    Recorded(VersionRecord),
    Unchanged,
    Failed(String),
}

/// In-memory reconstruction of a type's version DAG
#[derive(Debug, Clone)]
pub struct VersionTree {
    /// All records by version hash
    pub nodes: HashMap<String, VersionRecord>,
    /// Child hash → parent hashes
    pub parents: HashMap<String, Vec<String>>,
    /// Parent hash → child hashes
    pub children: HashMap<String, Vec<String>>,
    /// Records with no parents, oldest first
    pub roots: Vec<String>,
}

/// Store for the append-only version history
#[derive(Clone)]
pub struct VersionStore {
    conn: DatabaseConnection,
}

impl VersionStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Append a version with explicit parent hashes
    pub async fn record_version(
        &self,
        definition: &ContentTypeDefinition,
        parent_hashes: &[String],
        change_source: ChangeSource,
        author: Option<&str>,
        message: Option<&str>,
    ) -> Result<RecordOutcome> {
        definition.validate()?;
        let snapshot = ContentTypeSnapshot::capture(definition)?;

        // A hash can never be its own ancestor: content fixpoints are no-ops.
        if parent_hashes.iter().any(|p| p == &snapshot.hash) {
            return Ok(RecordOutcome::Unchanged {
                hash: snapshot.hash,
            });
        }
        if self.find_version_row(&snapshot.hash).await?.is_some() {
            return Ok(RecordOutcome::Unchanged {
                hash: snapshot.hash,
            });
        }

        let active = content_type_version::ActiveModel {
            version_hash: Set(snapshot.hash.clone()),
            type_key: Set(definition.key.clone()),
            snapshot: Set(serde_json::to_value(&snapshot).map_err(|e| {
                SyncError::CorruptRecord {
                    type_key: definition.key.clone(),
                    detail: e.to_string(),
                }
            })?),
            change_source: Set(change_source.to_string()),
            author: Set(author.map(str::to_string)),
            message: Set(message.map(str::to_string)),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        let row = active.insert(&self.conn).await?;

        for (ordinal, parent) in parent_hashes.iter().enumerate() {
            let link = version_parent::ActiveModel {
                version_id: Set(row.id),
                parent_hash: Set(parent.clone()),
                ordinal: Set(ordinal as i32),
                ..Default::default()
            };
            link.insert(&self.conn).await?;
        }

        debug!(
            type_key = definition.key,
            hash = snapshot.hash,
            parents = parent_hashes.len(),
            "recorded version"
        );

        Ok(RecordOutcome::Recorded(VersionRecord {
            version_hash: snapshot.hash.clone(),
            type_key: definition.key.clone(),
            parent_hashes: parent_hashes.to_vec(),
            snapshot,
            change_source,
            author: author.map(str::to_string),
            message: message.map(str::to_string),
            created_at: row.created_at,
        }))
    }

    /// Append a linear edit parented on the current head
    pub async fn record_change(
        &self,
        definition: &ContentTypeDefinition,
        change_source: ChangeSource,
        author: Option<&str>,
        message: Option<&str>,
    ) -> Result<RecordOutcome> {
        let parents: Vec<String> = self
            .head(&definition.key)
            .await?
            .map(|head| vec![head.version_hash])
            .unwrap_or_default();
        self.record_version(definition, &parents, change_source, author, message)
            .await
    }

    /// Append a merge record with two parents, resolving a conflict
    pub async fn record_merge(
        &self,
        definition: &ContentTypeDefinition,
        parent_a: &str,
        parent_b: &str,
        author: Option<&str>,
        message: Option<&str>,
    ) -> Result<RecordOutcome> {
        let parents = vec![parent_a.to_string(), parent_b.to_string()];
        self.record_version(definition, &parents, ChangeSource::Sync, author, message)
            .await
    }

    /// Best-effort [`record_change`]: failures become a loggable outcome
    pub async fn try_record_change(
        &self,
        definition: &ContentTypeDefinition,
        change_source: ChangeSource,
        author: Option<&str>,
        message: Option<&str>,
    ) -> HistoryWriteOutcome {
        match self
            .record_change(definition, change_source, author, message)
            .await
        {
            Ok(RecordOutcome::Recorded(record)) => HistoryWriteOutcome::Recorded(record),
            Ok(RecordOutcome::Unchanged { .. }) => HistoryWriteOutcome::Unchanged,
            Err(e) => {
                warn!(type_key = definition.key, error = %e, "history write failed");
                HistoryWriteOutcome::Failed(e.to_string())
            }
        }
    }

    /// Best-effort [`record_merge`]
    pub async fn try_record_merge(
        &self,
        definition: &ContentTypeDefinition,
        parent_a: &str,
        parent_b: &str,
        author: Option<&str>,
        message: Option<&str>,
    ) -> HistoryWriteOutcome {
        match self
            .record_merge(definition, parent_a, parent_b, author, message)
            .await
        {
            Ok(RecordOutcome::Recorded(record)) => HistoryWriteOutcome::Recorded(record),
            Ok(RecordOutcome::Unchanged { .. }) => HistoryWriteOutcome::Unchanged,
            Err(e) => {
                warn!(type_key = definition.key, error = %e, "history write failed");
                HistoryWriteOutcome::Failed(e.to_string())
            }
        }
    }

    /// The most recently appended record for a type
    pub async fn head(&self, type_key: &str) -> Result<Option<VersionRecord>> {
        let row = ContentTypeVersion::find()
            .filter(content_type_version::Column::TypeKey.eq(type_key))
            .order_by_desc(content_type_version::Column::Id)
            .one(&self.conn)
            .await?;
        match row {
            None => Ok(None),
            Some(row) => Ok(Some(self.hydrate(row).await?)),
        }
    }

    /// Look up a record by version hash
    pub async fn get_version(&self, version_hash: &str) -> Result<Option<VersionRecord>> {
        match self.find_version_row(version_hash).await? {
            None => Ok(None),
            Some(row) => Ok(Some(self.hydrate(row).await?)),
        }
    }

    /// All records for a type, oldest first
    pub async fn list_versions(&self, type_key: &str) -> Result<Vec<VersionRecord>> {
        let rows = ContentTypeVersion::find()
            .filter(content_type_version::Column::TypeKey.eq(type_key))
            .order_by_asc(content_type_version::Column::Id)
            .all(&self.conn)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.hydrate(row).await?);
        }
        Ok(out)
    }

    /// Reconstruct the version DAG for a type
    pub async fn build_tree(&self, type_key: &str) -> Result<VersionTree> {
        let records = self.list_versions(type_key).await?;

        let mut nodes = HashMap::new();
        let mut parents: HashMap<String, Vec<String>> = HashMap::new();
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        let mut roots = Vec::new();

        for record in records {
            let hash = record.version_hash.clone();
            if record.parent_hashes.is_empty() {
                roots.push(hash.clone());
            }
            for parent in &record.parent_hashes {
                children
                    .entry(parent.clone())
                    .or_default()
                    .push(hash.clone());
            }
            parents.insert(hash.clone(), record.parent_hashes.clone());
            nodes.insert(hash, record);
        }

        Ok(VersionTree {
            nodes,
            parents,
            children,
            roots,
        })
    }

    /// Find the merge base of two versions by bidirectional ancestor
    /// traversal: breadth-first walk of parent links on each side until the
    /// ancestor sets intersect.
    pub async fn find_common_ancestor(
        &self,
        hash_a: &str,
        hash_b: &str,
    ) -> Result<Option<String>> {
        let record_a = self
            .get_version(hash_a)
            .await?
            .ok_or_else(|| SyncError::UnknownVersion(hash_a.to_string()))?;
        let tree = self.build_tree(&record_a.type_key).await?;
        if !tree.nodes.contains_key(hash_b) {
            return Err(SyncError::UnknownVersion(hash_b.to_string()));
        }

        let mut seen_a: HashSet<String> = HashSet::from([hash_a.to_string()]);
        let mut seen_b: HashSet<String> = HashSet::from([hash_b.to_string()]);
        let mut frontier_a: VecDeque<String> = VecDeque::from([hash_a.to_string()]);
        let mut frontier_b: VecDeque<String> = VecDeque::from([hash_b.to_string()]);

        // A version is its own ancestor: identical hashes meet immediately.
        if let Some(hit) = seen_a.intersection(&seen_b).next() {
            return Ok(Some(hit.clone()));
        }

        while !frontier_a.is_empty() || !frontier_b.is_empty() {
            if let Some(hit) = step(&tree, &mut frontier_a, &mut seen_a, &seen_b) {
                return Ok(Some(hit));
            }
            if let Some(hit) = step(&tree, &mut frontier_b, &mut seen_b, &seen_a) {
                return Ok(Some(hit));
            }
        }

        Ok(None)
    }

    /// Walk the first-parent chain from a version back to its root.
    ///
    /// An unknown starting hash is an error; a parent link pointing at a
    /// hash the store never recorded ends the walk instead of poisoning
    /// every query above it.
    pub async fn lineage(&self, version_hash: &str) -> Result<Vec<VersionRecord>> {
        let mut out = Vec::new();
        let mut cursor = Some(version_hash.to_string());
        let mut visited = HashSet::new();

        while let Some(hash) = cursor {
            if !visited.insert(hash.clone()) {
                // Defensive: the DAG forbids cycles by construction, but a
                // corrupt store must not hang the walk.
                break;
            }
            let record = match self.get_version(&hash).await? {
                Some(record) => record,
                None if out.is_empty() => {
                    return Err(SyncError::UnknownVersion(hash));
                }
                None => {
                    warn!(hash, "lineage walk hit an unrecorded parent");
                    break;
                }
            };
            cursor = record.parent_hashes.first().cloned();
            out.push(record);
        }

        Ok(out)
    }

    /// Structural diff between two snapshots' field lists
    pub async fn diff(&self, hash_a: &str, hash_b: &str) -> Result<FieldDiff> {
        let a = self
            .get_version(hash_a)
            .await?
            .ok_or_else(|| SyncError::UnknownVersion(hash_a.to_string()))?;
        let b = self
            .get_version(hash_b)
            .await?
            .ok_or_else(|| SyncError::UnknownVersion(hash_b.to_string()))?;
        Ok(FieldDiff::between(&a.snapshot.fields, &b.snapshot.fields))
    }

    /// Hash helper for callers that only hold a field list
    pub fn hash_definition(definition: &ContentTypeDefinition) -> Result<String> {
        Ok(hashing::content_hash(definition)?)
    }

    async fn find_version_row(
        &self,
        version_hash: &str,
    ) -> Result<Option<content_type_version::Model>> {
        Ok(ContentTypeVersion::find()
            .filter(content_type_version::Column::VersionHash.eq(version_hash))
            .one(&self.conn)
            .await?)
    }

    async fn hydrate(&self, row: content_type_version::Model) -> Result<VersionRecord> {
        let parent_rows = VersionParent::find()
            .filter(version_parent::Column::VersionId.eq(row.id))
            .order_by_asc(version_parent::Column::Ordinal)
            .all(&self.conn)
            .await?;

        let snapshot: ContentTypeSnapshot = serde_json::from_value(row.snapshot.clone())
            .map_err(|e| SyncError::CorruptRecord {
                type_key: row.type_key.clone(),
                detail: e.to_string(),
            })?;
        let change_source = row
            .change_source
            .parse::<ChangeSource>()
            .map_err(|e| SyncError::CorruptRecord {
                type_key: row.type_key.clone(),
                detail: e.to_string(),
            })?;

        Ok(VersionRecord {
            version_hash: row.version_hash,
            type_key: row.type_key,
            parent_hashes: parent_rows.into_iter().map(|p| p.parent_hash).collect(),
            snapshot,
            change_source,
            author: row.author,
            message: row.message,
            created_at: row.created_at,
        })
    }
}

/// Expand one ancestor frontier by a single node; returns the intersection
/// hit if the expansion reaches the other side's seen set.
fn step(
    tree: &VersionTree,
    frontier: &mut VecDeque<String>,
    seen: &mut HashSet<String>,
    other_seen: &HashSet<String>,
) -> Option<String> {
    let current = frontier.pop_front()?;
    if let Some(parents) = tree.parents.get(&current) {
        for parent in parents {
            if other_seen.contains(parent) {
                return Some(parent.clone());
            }
            if seen.insert(parent.clone()) {
                frontier.push_back(parent.clone());
            }
        }
    }
    None
}
