//! Resolution strategy selection and execution

use crate::domain::conflict::{Conflict, Resolution, ResolutionStrategy};
use crate::domain::content_type::{ContentTypeDefinition, FieldDescriptor};
use chrono::Utc;
use tracing::debug;

/// Outcome of executing a resolution strategy.
///
/// `requires_manual` is a hard stop for callers, not a retryable failure.
#[derive(Debug, Clone)]
pub struct ResolutionOutcome {
    pub success: bool,
    pub resolution: Option<Resolution>,
    pub requires_manual: bool,
    pub error: Option<String>,
}

impl ResolutionOutcome {
    fn resolved(resolution: Resolution) -> Self {
        Self {
            success: true,
            resolution: Some(resolution),
            requires_manual: false,
            error: None,
        }
    }

    fn manual() -> Self {
        Self {
            success: false,
            resolution: None,
            requires_manual: true,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            resolution: None,
            requires_manual: false,
            error: Some(error),
        }
    }
}

/// Picks and applies resolution strategies
#[derive(Debug, Clone, Default)]
pub struct ResolutionStrategySelector;

impl ResolutionStrategySelector {
    pub fn new() -> Self {
        Self
    }

    /// Select the best strategy for a conflict:
    /// - one side unchanged → take the other side;
    /// - changes on disjoint field sets → auto-merge (safe union);
    /// - anything else → manual merge, the only outcome the engine cannot
    ///   resolve itself.
    pub fn select_best_strategy(&self, conflict: &Conflict) -> ResolutionStrategy {
        let source_empty = conflict.source_changes.is_empty();
        let target_empty = conflict.target_changes.is_empty();

        if source_empty && !target_empty {
            return ResolutionStrategy::TakeRemote;
        }
        if target_empty && !source_empty {
            return ResolutionStrategy::TakeLocal;
        }
        if conflict.source_changes.disjoint_from(&conflict.target_changes) {
            return ResolutionStrategy::AutoMerge;
        }
        ResolutionStrategy::ManualMerge
    }

    /// Execute a strategy over the two sides' definitions
    pub fn resolve(
        &self,
        conflict: &Conflict,
        strategy: ResolutionStrategy,
        local: &ContentTypeDefinition,
        remote: &ContentTypeDefinition,
        resolved_by: Option<&str>,
    ) -> ResolutionOutcome {
        debug!(
            type_key = conflict.type_key,
            strategy = %strategy,
            "executing resolution strategy"
        );

        let merged_fields = match strategy {
            ResolutionStrategy::TakeLocal => local.fields.clone(),
            ResolutionStrategy::TakeRemote => remote.fields.clone(),
            ResolutionStrategy::AutoMerge => {
                if !conflict
                    .source_changes
                    .disjoint_from(&conflict.target_changes)
                {
                    return ResolutionOutcome::failed(
                        "auto-merge requires disjoint change sets".to_string(),
                    );
                }
                merge_disjoint(local, remote, conflict)
            }
            ResolutionStrategy::ManualMerge => return ResolutionOutcome::manual(),
        };

        ResolutionOutcome::resolved(Resolution {
            strategy,
            merged_fields,
            resolved_by: resolved_by.map(str::to_string),
            resolved_at: Utc::now(),
        })
    }

    /// Build the merged definition a resolution settles on
    pub fn merged_definition(
        &self,
        local: &ContentTypeDefinition,
        resolution: &Resolution,
    ) -> ContentTypeDefinition {
        ContentTypeDefinition {
            key: local.key.clone(),
            name: local.name.clone(),
            category: local.category.clone(),
            fields: resolution.merged_fields.clone(),
            ui_metadata: local.ui_metadata.clone(),
        }
    }
}

/// Safe union of two sides whose change sets are disjoint: start from the
/// local fields, apply the remote side's changes to the fields it touched.
fn merge_disjoint(
    local: &ContentTypeDefinition,
    remote: &ContentTypeDefinition,
    conflict: &Conflict,
) -> Vec<FieldDescriptor> {
    let mut merged: Vec<FieldDescriptor> = Vec::new();

    let remote_touched = conflict.target_changes.touched_keys();

    for field in &local.fields {
        if conflict.target_changes.removed.iter().any(|k| k == &field.key) {
            continue;
        }
        if remote_touched.contains(field.key.as_str()) {
            if let Some(remote_field) = remote.field(&field.key) {
                merged.push(remote_field.clone());
                continue;
            }
        }
        merged.push(field.clone());
    }

    // Fields only the remote side added
    for key in &conflict.target_changes.added {
        if merged.iter().any(|f| &f.key == key) {
            continue;
        }
        if let Some(remote_field) = remote.field(key) {
            merged.push(remote_field.clone());
        }
    }

    merged.sort_by(|a, b| a.key.cmp(&b.key));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conflict::{ConflictSeverity, ConflictType};
    use crate::domain::content_type::FieldKind;
    use crate::domain::diff::FieldDiff;
    use uuid::Uuid;

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

    fn def(fields: Vec<FieldDescriptor>) -> ContentTypeDefinition {
        ContentTypeDefinition {
            key: "article".to_string(),
            name: "Article".to_string(),
            category: None,
            fields,
            ui_metadata: None,
        }
    }

    fn conflict(source: FieldDiff, target: FieldDiff) -> Conflict {
        Conflict {
            id: Uuid::new_v4(),
            type_key: "article".to_string(),
            conflict_type: ConflictType::FieldAdded,
            severity: ConflictSeverity::Low,
            source_changes: source,
            target_changes: target,
            priority: 10,
            resolution: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn selects_take_remote_when_local_unchanged() {
        let c = conflict(
            FieldDiff::default(),
            FieldDiff {
                added: vec!["tags".into()],
                ..Default::default()
            },
        );
        let selector = ResolutionStrategySelector::new();
        assert_eq!(
            selector.select_best_strategy(&c),
            ResolutionStrategy::TakeRemote
        );
    }

    #[test]
    fn selects_auto_merge_for_disjoint_changes() {
        let c = conflict(
            FieldDiff {
                modified: vec!["title".into()],
                ..Default::default()
            },
            FieldDiff {
                added: vec!["tags".into()],
                ..Default::default()
            },
        );
        let selector = ResolutionStrategySelector::new();
        assert_eq!(
            selector.select_best_strategy(&c),
            ResolutionStrategy::AutoMerge
        );
    }

    #[test]
    fn selects_manual_for_overlapping_changes() {
        let c = conflict(
            FieldDiff {
                modified: vec!["title".into()],
                ..Default::default()
            },
            FieldDiff {
                modified: vec!["title".into()],
                ..Default::default()
            },
        );
        let selector = ResolutionStrategySelector::new();
        assert_eq!(
            selector.select_best_strategy(&c),
            ResolutionStrategy::ManualMerge
        );
    }

    #[test]
    fn auto_merge_unions_disjoint_additions() {
        let local = def(vec![
            field("title", FieldKind::Text),
            field("body", FieldKind::RichText),
        ]);
        let remote = def(vec![
            field("title", FieldKind::Text),
            field("body", FieldKind::RichText),
            field("tags", FieldKind::Json),
        ]);
        let c = conflict(
            FieldDiff::default(),
            FieldDiff {
                added: vec!["tags".into()],
                ..Default::default()
            },
        );

        let selector = ResolutionStrategySelector::new();
        let outcome = selector.resolve(
            &c,
            ResolutionStrategy::AutoMerge,
            &local,
            &remote,
            Some("sync"),
        );
        assert!(outcome.success);
        let resolution = outcome.resolution.unwrap();
        let keys: Vec<&str> = resolution
            .merged_fields
            .iter()
            .map(|f| f.key.as_str())
            .collect();
        assert_eq!(keys, vec!["body", "tags", "title"]);
    }

    #[test]
    fn manual_merge_is_a_hard_stop() {
        let local = def(vec![field("title", FieldKind::Text)]);
        let remote = def(vec![field("title", FieldKind::RichText)]);
        let c = conflict(
            FieldDiff {
                modified: vec!["title".into()],
                ..Default::default()
            },
            FieldDiff {
                modified: vec!["title".into()],
                ..Default::default()
            },
        );

        let selector = ResolutionStrategySelector::new();
        let outcome = selector.resolve(
            &c,
            ResolutionStrategy::ManualMerge,
            &local,
            &remote,
            None,
        );
        assert!(!outcome.success);
        assert!(outcome.requires_manual);
    }
}
