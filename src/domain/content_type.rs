//! Content-type definitions and typed field descriptors
//!
//! Fields are modelled as a closed tagged union rather than an opaque JSON
//! document, validated at the boundary where definitions enter the engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors produced by boundary validation of a definition
#[derive(Error, Debug)]
pub enum DefinitionError {
    /// The type key is empty
    #[error("content type key must not be empty")]
    EmptyTypeKey,

    /// A field has an empty key
    #[error("field key must not be empty in content type '{0}'")]
    EmptyFieldKey(String),

    /// Two fields share the same key
    #[error("duplicate field key '{field}' in content type '{type_key}'")]
    DuplicateFieldKey { type_key: String, field: String },

    /// Field settings must be a JSON object
    #[error("settings for field '{field}' in '{type_key}' must be a JSON object")]
    SettingsNotObject { type_key: String, field: String },

    /// A select field declares no options
    #[error("select field '{field}' in '{type_key}' has no options")]
    EmptySelectOptions { type_key: String, field: String },
}

/// The kind of a content-type field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    RichText,
    Number,
    Boolean,
    DateTime,
    /// Reference to another content type by key
    Reference { target: String },
    Media,
    /// Enumerated choice with a fixed option list
    Select { options: Vec<String> },
    Json,
}

/// A single field of a content type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub key: String,
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub indexed: bool,
    /// Kind-specific settings, always a JSON object
    #[serde(default = "empty_object")]
    pub settings: Value,
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}

impl FieldDescriptor {
    /// True when the two descriptors carry the same semantic content.
    ///
    /// This is the field-level counterpart of hash equality: everything the
    /// hasher canonicalizes participates, nothing else does.
    pub fn same_content(&self, other: &Self) -> bool {
        self.key == other.key
            && self.name == other.name
            && self.kind == other.kind
            && self.required == other.required
            && self.unique == other.unique
            && self.indexed == other.indexed
            && self.settings == other.settings
    }
}

/// A locally authored (or remotely fetched) content-type definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTypeDefinition {
    /// Stable identifier, unique across the platform
    pub key: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    /// Authoring-tool metadata (labels, editor hints). Carried through the
    /// engine but never hashed.
    #[serde(default)]
    pub ui_metadata: Option<Value>,
}

impl ContentTypeDefinition {
    /// Validate the definition before it enters the engine.
    ///
    /// Rejected definitions never touch persistent state.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.key.trim().is_empty() {
            return Err(DefinitionError::EmptyTypeKey);
        }

        let mut seen = std::collections::HashSet::new();
        for field in &self.fields {
            if field.key.trim().is_empty() {
                return Err(DefinitionError::EmptyFieldKey(self.key.clone()));
            }
            if !seen.insert(field.key.as_str()) {
                return Err(DefinitionError::DuplicateFieldKey {
                    type_key: self.key.clone(),
                    field: field.key.clone(),
                });
            }
            if !field.settings.is_object() {
                return Err(DefinitionError::SettingsNotObject {
                    type_key: self.key.clone(),
                    field: field.key.clone(),
                });
            }
            if let FieldKind::Select { options } = &field.kind {
                if options.is_empty() {
                    return Err(DefinitionError::EmptySelectOptions {
                        type_key: self.key.clone(),
                        field: field.key.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Find a field by key
    pub fn field(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_field(key: &str) -> FieldDescriptor {
        FieldDescriptor {
            key: key.to_string(),
            name: key.to_string(),
            kind: FieldKind::Text,
            required: false,
            unique: false,
            indexed: false,
            settings: empty_object(),
        }
    }

    #[test]
    fn validate_accepts_well_formed_definition() {
        let def = ContentTypeDefinition {
            key: "article".to_string(),
            name: "Article".to_string(),
            category: Some("editorial".to_string()),
            fields: vec![text_field("title"), text_field("body")],
            ui_metadata: None,
        };
        assert!(def.validate().is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_field_keys() {
        let def = ContentTypeDefinition {
            key: "article".to_string(),
            name: "Article".to_string(),
            category: None,
            fields: vec![text_field("title"), text_field("title")],
            ui_metadata: None,
        };
        assert!(matches!(
            def.validate(),
            Err(DefinitionError::DuplicateFieldKey { .. })
        ));
    }

    #[test]
    fn validate_rejects_non_object_settings() {
        let mut field = text_field("title");
        field.settings = Value::String("not an object".to_string());
        let def = ContentTypeDefinition {
            key: "article".to_string(),
            name: "Article".to_string(),
            category: None,
            fields: vec![field],
            ui_metadata: None,
        };
        assert!(matches!(
            def.validate(),
            Err(DefinitionError::SettingsNotObject { .. })
        ));
    }
}
