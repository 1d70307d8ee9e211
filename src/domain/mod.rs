//! Domain model for the content-type sync engine
//!
//! These types are the validated, strongly-typed core the rest of the engine
//! operates on. Database entities map to and from them.

pub mod conflict;
pub mod content_type;
pub mod deployment;
pub mod diff;
pub mod snapshot;
pub mod sync;
pub mod version;

pub use conflict::{Conflict, ConflictSeverity, ConflictType, Resolution, ResolutionStrategy};
pub use content_type::{ContentTypeDefinition, DefinitionError, FieldDescriptor, FieldKind};
pub use deployment::{DeploymentStatus, SyncPhase};
pub use diff::FieldDiff;
pub use snapshot::ContentTypeSnapshot;
pub use sync::{ConflictStatus, SyncAction, SyncDelta, SyncProgress, SyncState, SyncStatus};
pub use version::{ChangeSource, VersionRecord};
