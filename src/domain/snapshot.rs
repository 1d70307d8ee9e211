//! Immutable content-type snapshots

use crate::domain::content_type::{ContentTypeDefinition, FieldDescriptor};
use crate::hashing::{self, HashError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A hashed, immutable capture of a content-type definition.
///
/// Identity is the hash: two snapshots with identical canonical content carry
/// the same hash no matter which side or actor produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTypeSnapshot {
    pub hash: String,
    pub type_key: String,
    pub fields: Vec<FieldDescriptor>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ContentTypeSnapshot {
    /// Capture a snapshot of a definition, computing its content hash
    pub fn capture(definition: &ContentTypeDefinition) -> Result<Self, HashError> {
        Ok(Self {
            hash: hashing::content_hash(definition)?,
            type_key: definition.key.clone(),
            fields: definition.fields.clone(),
            category: definition.category.clone(),
            created_at: Utc::now(),
        })
    }

    /// Rebuild a definition from the snapshot (UI metadata is not retained)
    pub fn to_definition(&self, name: &str) -> ContentTypeDefinition {
        ContentTypeDefinition {
            key: self.type_key.clone(),
            name: name.to_string(),
            category: self.category.clone(),
            fields: self.fields.clone(),
            ui_metadata: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::content_type::{FieldDescriptor, FieldKind};
    use serde_json::json;

    #[test]
    fn capture_and_rebuild_preserve_content_hash() {
        let definition = ContentTypeDefinition {
            key: "article".to_string(),
            name: "Article".to_string(),
            category: Some("editorial".to_string()),
            fields: vec![FieldDescriptor {
                key: "title".to_string(),
                name: "Title".to_string(),
                kind: FieldKind::Text,
                required: true,
                unique: false,
                indexed: true,
                settings: json!({ "max_length": 120 }),
            }],
            ui_metadata: Some(json!({ "icon": "file-text" })),
        };

        let snapshot = ContentTypeSnapshot::capture(&definition).unwrap();
        assert_eq!(snapshot.hash, hashing::content_hash(&definition).unwrap());

        let rebuilt = snapshot.to_definition("Article");
        assert_eq!(
            hashing::content_hash(&rebuilt).unwrap(),
            snapshot.hash,
            "dropping ui metadata must not change the content hash"
        );
    }
}
