//! Local/remote change detection
//!
//! Pure set-diff over content hashes, O(n) in the number of types. Only
//! content is inspected, never timestamps: there is no trusted clock.

use crate::domain::content_type::ContentTypeDefinition;
use crate::domain::diff::FieldDiff;
use crate::hashing;
use crate::sync::error::Result;
use crate::sync::state_store::SyncStateStore;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use tracing::{debug, instrument};

/// A definition paired with its content hash
#[derive(Debug, Clone)]
pub struct HashedType {
    pub hash: String,
    pub definition: ContentTypeDefinition,
}

/// One changed type in a [`ChangeSet`]
#[derive(Debug, Clone)]
pub struct TypeChange {
    pub type_key: String,
    pub local_hash: Option<String>,
    pub remote_hash: Option<String>,
    /// Field-level diff, present for updated types (local → remote)
    pub field_diff: Option<FieldDiff>,
}

/// Result of a change detection run
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Present remotely but not locally
    pub created: Vec<TypeChange>,
    /// Present on both sides with different content
    pub updated: Vec<TypeChange>,
    /// Present locally but not remotely
    pub deleted: Vec<TypeChange>,
    /// Present on both sides with identical content; both hashes are set
    /// and equal
    pub unchanged: Vec<TypeChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    /// Human-readable summary of the detected changes
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} created, {} updated, {} deleted, {} unchanged",
            self.created.len(),
            self.updated.len(),
            self.deleted.len(),
            self.unchanged.len()
        );
        for change in &self.created {
            let _ = writeln!(out, "  + {} (remote only)", change.type_key);
        }
        for change in &self.updated {
            let _ = writeln!(out, "  ~ {}", change.type_key);
            if let Some(diff) = &change.field_diff {
                for key in &diff.added {
                    let _ = writeln!(out, "      + field {}", key);
                }
                for key in &diff.modified {
                    let _ = writeln!(out, "      ~ field {}", key);
                }
                for key in &diff.removed {
                    let _ = writeln!(out, "      - field {}", key);
                }
            }
        }
        for change in &self.deleted {
            let _ = writeln!(out, "  - {} (local only)", change.type_key);
        }
        out
    }
}

/// Detects drift between locally authored and remote content types
#[derive(Clone)]
pub struct ChangeDetector {
    /// When present, every detection result is persisted into sync state
    state_store: Option<SyncStateStore>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self { state_store: None }
    }

    pub fn with_state_store(state_store: SyncStateStore) -> Self {
        Self {
            state_store: Some(state_store),
        }
    }

    /// Hash one side into a key → hashed-definition map.
    ///
    /// Every definition is validated before hashing; a malformed definition
    /// aborts detection before any state is written.
    pub fn hash_side(
        definitions: &[ContentTypeDefinition],
    ) -> Result<HashMap<String, HashedType>> {
        let mut out = HashMap::with_capacity(definitions.len());
        for def in definitions {
            def.validate()?;
            let hash = hashing::content_hash(def)?;
            out.insert(
                def.key.clone(),
                HashedType {
                    hash,
                    definition: def.clone(),
                },
            );
        }
        Ok(out)
    }

    /// Diff the local side against the remote side
    #[instrument(skip_all, fields(local = local.len(), remote = remote.len()))]
    pub async fn detect_changes(
        &self,
        local: &[ContentTypeDefinition],
        remote: &[ContentTypeDefinition],
    ) -> Result<ChangeSet> {
        self.detect(local, remote, None).await
    }

    /// Same algorithm restricted to a key subset
    pub async fn detect_changes_for_keys(
        &self,
        local: &[ContentTypeDefinition],
        remote: &[ContentTypeDefinition],
        keys: &HashSet<String>,
    ) -> Result<ChangeSet> {
        self.detect(local, remote, Some(keys)).await
    }

    async fn detect(
        &self,
        local: &[ContentTypeDefinition],
        remote: &[ContentTypeDefinition],
        keys: Option<&HashSet<String>>,
    ) -> Result<ChangeSet> {
        let local_hashes = Self::hash_side(local)?;
        let remote_hashes = Self::hash_side(remote)?;

        let in_scope = |key: &str| keys.map_or(true, |k| k.contains(key));

        let mut set = ChangeSet::default();

        for (key, remote_type) in &remote_hashes {
            if !in_scope(key) {
                continue;
            }
            match local_hashes.get(key) {
                None => set.created.push(TypeChange {
                    type_key: key.clone(),
                    local_hash: None,
                    remote_hash: Some(remote_type.hash.clone()),
                    field_diff: None,
                }),
                Some(local_type) if local_type.hash != remote_type.hash => {
                    let diff = FieldDiff::between(
                        &local_type.definition.fields,
                        &remote_type.definition.fields,
                    );
                    set.updated.push(TypeChange {
                        type_key: key.clone(),
                        local_hash: Some(local_type.hash.clone()),
                        remote_hash: Some(remote_type.hash.clone()),
                        field_diff: Some(diff),
                    });
                }
                Some(local_type) => set.unchanged.push(TypeChange {
                    type_key: key.clone(),
                    local_hash: Some(local_type.hash.clone()),
                    remote_hash: Some(remote_type.hash.clone()),
                    field_diff: None,
                }),
            }
        }

        for (key, local_type) in &local_hashes {
            if !in_scope(key) {
                continue;
            }
            if !remote_hashes.contains_key(key) {
                set.deleted.push(TypeChange {
                    type_key: key.clone(),
                    local_hash: Some(local_type.hash.clone()),
                    remote_hash: None,
                    field_diff: None,
                });
            }
        }

        set.created.sort_by(|a, b| a.type_key.cmp(&b.type_key));
        set.updated.sort_by(|a, b| a.type_key.cmp(&b.type_key));
        set.deleted.sort_by(|a, b| a.type_key.cmp(&b.type_key));
        set.unchanged.sort_by(|a, b| a.type_key.cmp(&b.type_key));

        debug!(
            created = set.created.len(),
            updated = set.updated.len(),
            deleted = set.deleted.len(),
            unchanged = set.unchanged.len(),
            "change detection complete"
        );

        if let Some(store) = &self.state_store {
            self.persist(store, &set).await?;
        }

        Ok(set)
    }

    /// Every detected key gets its freshly computed hashes recorded,
    /// unchanged ones included: a row left stale by an earlier crash must
    /// not survive a clean detection run.
    async fn persist(&self, store: &SyncStateStore, set: &ChangeSet) -> Result<()> {
        for change in set
            .created
            .iter()
            .chain(set.updated.iter())
            .chain(set.deleted.iter())
            .chain(set.unchanged.iter())
        {
            store
                .record_observation(
                    &change.type_key,
                    change.local_hash.as_deref(),
                    change.remote_hash.as_deref(),
                )
                .await?;
        }
        Ok(())
    }
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::content_type::{FieldDescriptor, FieldKind};

    fn field(key: &str, kind: FieldKind) -> FieldDescriptor {
        FieldDescriptor {
            key: key.to_string(),
            name: key.to_string(),
            kind,
            required: false,
            unique: false,
            indexed: false,
            settings: serde_json::json!({}),
        }
    }

    fn def(key: &str, fields: Vec<FieldDescriptor>) -> ContentTypeDefinition {
        ContentTypeDefinition {
            key: key.to_string(),
            name: key.to_string(),
            category: None,
            fields,
            ui_metadata: None,
        }
    }

    #[tokio::test]
    async fn detects_created_updated_deleted_unchanged() {
        let local = vec![
            def("article", vec![field("title", FieldKind::Text)]),
            def("page", vec![field("slug", FieldKind::Text)]),
            def("local_only", vec![]),
        ];
        let remote = vec![
            def("article", vec![field("title", FieldKind::Text)]),
            def(
                "page",
                vec![field("slug", FieldKind::Text), field("body", FieldKind::RichText)],
            ),
            def("remote_only", vec![]),
        ];

        let set = ChangeDetector::new()
            .detect_changes(&local, &remote)
            .await
            .unwrap();

        assert_eq!(set.unchanged.len(), 1);
        assert_eq!(set.unchanged[0].type_key, "article");
        assert_eq!(set.unchanged[0].local_hash, set.unchanged[0].remote_hash);
        assert_eq!(set.created.len(), 1);
        assert_eq!(set.created[0].type_key, "remote_only");
        assert_eq!(set.deleted.len(), 1);
        assert_eq!(set.deleted[0].type_key, "local_only");
        assert_eq!(set.updated.len(), 1);
        let diff = set.updated[0].field_diff.as_ref().unwrap();
        assert_eq!(diff.added, vec!["body"]);
    }

    #[tokio::test]
    async fn batch_variant_restricts_to_keys() {
        let local = vec![def("a", vec![]), def("b", vec![])];
        let remote = vec![def("c", vec![])];

        let keys: HashSet<String> = ["a".to_string(), "c".to_string()].into();
        let set = ChangeDetector::new()
            .detect_changes_for_keys(&local, &remote, &keys)
            .await
            .unwrap();

        assert_eq!(set.deleted.len(), 1);
        assert_eq!(set.deleted[0].type_key, "a");
        assert_eq!(set.created.len(), 1);
        assert_eq!(set.created[0].type_key, "c");
    }

    #[tokio::test]
    async fn summary_mentions_field_level_changes() {
        let local = vec![def("page", vec![field("slug", FieldKind::Text)])];
        let remote = vec![def(
            "page",
            vec![field("slug", FieldKind::Text), field("body", FieldKind::RichText)],
        )];

        let set = ChangeDetector::new()
            .detect_changes(&local, &remote)
            .await
            .unwrap();
        let summary = set.summary();
        assert!(summary.contains("~ page"));
        assert!(summary.contains("+ field body"));
    }
}
