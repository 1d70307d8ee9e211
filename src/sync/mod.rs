//! The synchronization engine: change detection, durable sync state,
//! version history, conflict handling, and the deployment orchestrator.

pub mod change_detector;
pub mod conflict_detector;
pub mod conflict_manager;
pub mod error;
pub mod orchestrator;
pub mod resolution;
pub mod state_store;
pub mod version_store;

pub use change_detector::{ChangeDetector, ChangeSet, TypeChange};
pub use conflict_detector::ConflictDetector;
pub use conflict_manager::ConflictManager;
pub use error::{Result, SyncError};
pub use orchestrator::{DeploymentReport, SyncOptions, SyncOrchestrator};
pub use resolution::{ResolutionOutcome, ResolutionStrategySelector};
pub use state_store::SyncStateStore;
pub use version_store::{HistoryWriteOutcome, RecordOutcome, VersionStore, VersionTree};
