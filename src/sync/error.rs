//! Sync engine error types

use crate::domain::content_type::DefinitionError;
use crate::hashing::HashError;
use crate::infrastructure::remote::RemoteError;
use thiserror::Error;

/// Sync engine errors
#[derive(Error, Debug)]
pub enum SyncError {
    /// A definition failed boundary validation
    #[error("validation failed: {0}")]
    Validation(#[from] DefinitionError),

    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Remote platform error
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Canonicalization/hashing error
    #[error("hashing error: {0}")]
    Hash(#[from] HashError),

    /// Malformed sync progress rejected before any state mutation
    #[error("invalid sync progress: {0}")]
    InvalidProgress(String),

    /// A conflict needs a human decision; never auto-resolved
    #[error("manual resolution required for content type '{type_key}'")]
    ManualResolutionRequired { type_key: String },

    /// Unresolved conflicts block the deployment
    #[error("{count} unresolved conflict(s) block the deployment")]
    Conflicted { count: usize },

    /// No such content type
    #[error("unknown content type: {0}")]
    UnknownType(String),

    /// No such version
    #[error("unknown version: {0}")]
    UnknownVersion(String),

    /// Stored row could not be decoded
    #[error("corrupt stored record for '{type_key}': {detail}")]
    CorruptRecord { type_key: String, detail: String },
}

/// Result type for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;
