//! Field-level structural diff between two content-type field lists

use crate::domain::content_type::FieldDescriptor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Keys added, modified, or removed between two field lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    pub removed: Vec<String>,
}

impl FieldDiff {
    /// Compute the diff from `base` to `other` by key comparison.
    ///
    /// Keys only in `other` are `added`, keys only in `base` are `removed`,
    /// keys in both with differing semantic content are `modified`. Field
    /// declaration order never affects the result.
    pub fn between(base: &[FieldDescriptor], other: &[FieldDescriptor]) -> Self {
        let mut diff = Self::default();

        for field in other {
            match base.iter().find(|f| f.key == field.key) {
                None => diff.added.push(field.key.clone()),
                Some(existing) if !existing.same_content(field) => {
                    diff.modified.push(field.key.clone());
                }
                Some(_) => {}
            }
        }
        for field in base {
            if !other.iter().any(|f| f.key == field.key) {
                diff.removed.push(field.key.clone());
            }
        }

        diff.added.sort();
        diff.modified.sort();
        diff.removed.sort();
        diff
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// True when the diff only adds fields
    pub fn is_additive_only(&self) -> bool {
        !self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }

    /// All field keys this diff touches
    pub fn touched_keys(&self) -> HashSet<&str> {
        self.added
            .iter()
            .chain(self.modified.iter())
            .chain(self.removed.iter())
            .map(String::as_str)
            .collect()
    }

    /// True when the two diffs touch no common field
    pub fn disjoint_from(&self, other: &Self) -> bool {
        self.touched_keys().is_disjoint(&other.touched_keys())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::content_type::FieldKind;

    fn field(key: &str, kind: FieldKind, required: bool) -> FieldDescriptor {
        FieldDescriptor {
            key: key.to_string(),
            name: key.to_string(),
            kind,
            required,
            unique: false,
            indexed: false,
            settings: serde_json::json!({}),
        }
    }

    #[test]
    fn diff_classifies_added_modified_removed() {
        let base = vec![
            field("title", FieldKind::Text, true),
            field("body", FieldKind::RichText, false),
            field("legacy", FieldKind::Text, false),
        ];
        let other = vec![
            field("title", FieldKind::Text, true),
            field("body", FieldKind::RichText, true),
            field("tags", FieldKind::Json, false),
        ];

        let diff = FieldDiff::between(&base, &other);
        assert_eq!(diff.added, vec!["tags"]);
        assert_eq!(diff.modified, vec!["body"]);
        assert_eq!(diff.removed, vec!["legacy"]);
    }

    #[test]
    fn diff_ignores_field_order() {
        let base = vec![
            field("a", FieldKind::Text, false),
            field("b", FieldKind::Text, false),
        ];
        let reordered = vec![
            field("b", FieldKind::Text, false),
            field("a", FieldKind::Text, false),
        ];
        assert!(FieldDiff::between(&base, &reordered).is_empty());
    }

    #[test]
    fn disjoint_detection() {
        let a = FieldDiff {
            added: vec!["tags".into()],
            ..Default::default()
        };
        let b = FieldDiff {
            modified: vec!["title".into()],
            ..Default::default()
        };
        let c = FieldDiff {
            modified: vec!["tags".into()],
            ..Default::default()
        };
        assert!(a.disjoint_from(&b));
        assert!(!a.disjoint_from(&c));
    }
}
