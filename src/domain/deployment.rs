//! Deployment-level status shared by the orchestrator and the event channel

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Terminal status of a deployment
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeploymentStatus {
    /// Every accepted item pushed successfully
    Completed,
    /// Some items pushed, some failed
    Partial,
    /// No item pushed successfully
    Failed,
    /// Unresolved conflicts halted the deployment before any push
    Conflicted,
}

/// Phase of an in-flight deployment, published on the status channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncPhase {
    DetectingChanges,
    CheckingConflicts,
    ResolvingConflicts,
    Pushing,
    RecordingHistory,
    Finished,
}
