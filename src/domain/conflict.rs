//! Conflicts and resolution strategies

use crate::domain::content_type::FieldDescriptor;
use crate::domain::diff::FieldDiff;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Classification of a detected conflict
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConflictType {
    /// Both sides only added fields
    FieldAdded,
    /// One or both sides removed fields
    FieldRemoved,
    /// A shared field changed kind on at least one side
    FieldTypeMismatch,
    /// Overlapping or otherwise unclassifiable structural divergence
    Structural,
}

/// How severe a conflict is, driving priority and auto-resolution
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConflictSeverity {
    Low,
    Medium,
    High,
}

impl ConflictSeverity {
    /// Base weight for priority computation
    pub fn weight(&self) -> i32 {
        match self {
            Self::Low => 10,
            Self::Medium => 50,
            Self::High => 100,
        }
    }
}

/// Strategy for resolving a conflict
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResolutionStrategy {
    TakeLocal,
    TakeRemote,
    AutoMerge,
    /// Requires a human decision; the engine never resolves this itself
    ManualMerge,
}

/// A finalized resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub strategy: ResolutionStrategy,
    /// The merged field list the resolution settled on
    pub merged_fields: Vec<FieldDescriptor>,
    pub resolved_by: Option<String>,
    pub resolved_at: DateTime<Utc>,
}

/// An open or resolved conflict, keyed by `type_key`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub id: Uuid,
    pub type_key: String,
    pub conflict_type: ConflictType,
    pub severity: ConflictSeverity,
    /// Changes from the merge base to the local side
    pub source_changes: FieldDiff,
    /// Changes from the merge base to the remote side
    pub target_changes: FieldDiff,
    pub priority: i32,
    pub resolution: Option<Resolution>,
    pub created_at: DateTime<Utc>,
}

impl Conflict {
    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}
