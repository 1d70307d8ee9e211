//! Canonicalization and content hashing for content-type definitions
//!
//! Two definitions hash identically iff they are semantically identical:
//! authoring metadata never participates, field declaration order never
//! matters, and JSON object keys are serialized in a deterministic order.

use crate::domain::content_type::{ContentTypeDefinition, FieldDescriptor, FieldKind};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from canonicalization
#[derive(Error, Debug)]
pub enum HashError {
    #[error("canonical json encode failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Compute the canonical SHA-256 content hash of a definition, hex-encoded
pub fn content_hash(definition: &ContentTypeDefinition) -> Result<String, HashError> {
    let canonical = canonical_json(definition)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Produce the canonical JSON serialization a hash is computed over.
///
/// Canonicalization rules, in order:
/// 1. keep only semantic fields (key, name, category, and for each field:
///    key, name, kind, required, unique, indexed, settings) — `ui_metadata`
///    is dropped;
/// 2. sort fields by field key, not declaration order;
/// 3. sort all JSON object keys recursively;
/// 4. serialize without insignificant whitespace.
pub fn canonical_json(definition: &ContentTypeDefinition) -> Result<String, HashError> {
    let mut map = Map::new();
    map.insert("key".to_string(), Value::String(definition.key.clone()));
    map.insert("name".to_string(), Value::String(definition.name.clone()));
    map.insert(
        "category".to_string(),
        definition
            .category
            .as_ref()
            .map(|c| Value::String(c.clone()))
            .unwrap_or(Value::Null),
    );
    map.insert("fields".to_string(), canonical_fields(&definition.fields)?);

    Ok(serde_json::to_string(&canon_value(Value::Object(map)))?)
}

fn canonical_fields(fields: &[FieldDescriptor]) -> Result<Value, HashError> {
    let mut sorted: Vec<&FieldDescriptor> = fields.iter().collect();
    sorted.sort_by(|a, b| a.key.cmp(&b.key));

    let mut out = Vec::with_capacity(sorted.len());
    for field in sorted {
        let mut map = Map::new();
        map.insert("key".to_string(), Value::String(field.key.clone()));
        map.insert("name".to_string(), Value::String(field.name.clone()));
        map.insert("kind".to_string(), kind_value(&field.kind)?);
        map.insert("required".to_string(), Value::Bool(field.required));
        map.insert("unique".to_string(), Value::Bool(field.unique));
        map.insert("indexed".to_string(), Value::Bool(field.indexed));
        map.insert("settings".to_string(), field.settings.clone());
        out.push(Value::Object(map));
    }
    Ok(Value::Array(out))
}

fn kind_value(kind: &FieldKind) -> Result<Value, HashError> {
    Ok(serde_json::to_value(kind)?)
}

/// Recursively sort object keys by UTF-8 byte order
fn canon_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut canon = Map::new();
            for (key, value) in entries {
                canon.insert(key, canon_value(value));
            }
            Value::Object(canon)
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canon_value).collect()),
        other => other,
    }
}
