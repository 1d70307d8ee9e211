//! Sea-ORM entity definitions
//!
//! These map the sync engine's domain models to database tables.

pub mod conflict;
pub mod content_type;
pub mod content_type_version;
pub mod sync_history;
pub mod sync_state;
pub mod version_parent;

// Re-export all entities
pub use conflict::Entity as Conflict;
pub use content_type::Entity as ContentType;
pub use content_type_version::Entity as ContentTypeVersion;
pub use sync_history::Entity as SyncHistory;
pub use sync_state::Entity as SyncState;
pub use version_parent::Entity as VersionParent;

// Re-export active models for easy access
pub use conflict::ActiveModel as ConflictActive;
pub use content_type::ActiveModel as ContentTypeActive;
pub use content_type_version::ActiveModel as ContentTypeVersionActive;
pub use sync_history::ActiveModel as SyncHistoryActive;
pub use sync_state::ActiveModel as SyncStateActive;
pub use version_parent::ActiveModel as VersionParentActive;
