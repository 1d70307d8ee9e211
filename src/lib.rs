//! Content-type synchronization and versioning engine
//!
//! Tracks locally authored content-type definitions against a remote
//! publishing platform: content hashing, change detection, durable and
//! resumable sync state, append-only version history, conflict detection
//! and resolution, and a deployment orchestrator with retry.

pub mod config;
pub mod domain;
pub mod hashing;
pub mod infrastructure;
pub mod sync;

use crate::config::EngineConfig;
use crate::infrastructure::database::Database;
use crate::infrastructure::events::EventBus;
use crate::infrastructure::remote::{BoundedClient, RemoteClient};
use crate::sync::{
    ChangeDetector, ConflictDetector, ConflictManager, Result, SyncOrchestrator,
    SyncStateStore, VersionStore,
};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// The engine context: owns the database, the event bus, and every service.
///
/// Constructed once per process; services are cheap handles over the shared
/// connection and can be cloned out freely.
pub struct SyncEngine {
    db: Database,
    events: Arc<EventBus>,
    config: EngineConfig,
    state_store: SyncStateStore,
    version_store: VersionStore,
    change_detector: ChangeDetector,
    conflict_detector: ConflictDetector,
    conflict_manager: ConflictManager,
    orchestrator: SyncOrchestrator,
}

impl SyncEngine {
    /// Open (or create) the engine database under `data_dir` and wire up
    /// all services.
    pub async fn new(
        data_dir: &Path,
        config: EngineConfig,
        remote: Arc<dyn RemoteClient>,
    ) -> Result<Self> {
        let db_path = data_dir.join("sync.db");
        let db = if db_path.exists() {
            Database::open(&db_path).await?
        } else {
            Database::create(&db_path).await?
        };
        Self::from_database(db, config, remote).await
    }

    /// Fully in-memory engine for tests and ephemeral runs
    pub async fn new_in_memory(
        config: EngineConfig,
        remote: Arc<dyn RemoteClient>,
    ) -> Result<Self> {
        let db = Database::create_in_memory().await?;
        Self::from_database(db, config, remote).await
    }

    async fn from_database(
        db: Database,
        config: EngineConfig,
        remote: Arc<dyn RemoteClient>,
    ) -> Result<Self> {
        db.migrate().await?;

        // Platform rate limits apply regardless of batch size; every remote
        // call goes through one bounded permit pool.
        let remote: Arc<dyn RemoteClient> = Arc::new(BoundedClient::new(
            remote,
            config.max_concurrent_remote_calls,
        ));

        let conn = db.conn().clone();
        let events = Arc::new(EventBus::new(config.event_channel_capacity));

        let state_store = SyncStateStore::new(conn.clone());
        let version_store = VersionStore::new(conn.clone());
        let change_detector = ChangeDetector::with_state_store(state_store.clone());
        let conflict_detector =
            ConflictDetector::new(state_store.clone(), version_store.clone());
        let conflict_manager = ConflictManager::new(conn.clone(), state_store.clone());
        let orchestrator =
            SyncOrchestrator::new(conn, remote, events.clone(), config.clone());

        info!("sync engine initialized");

        Ok(Self {
            db,
            events,
            config,
            state_store,
            version_store,
            change_detector,
            conflict_detector,
            conflict_manager,
            orchestrator,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn state_store(&self) -> &SyncStateStore {
        &self.state_store
    }

    pub fn version_store(&self) -> &VersionStore {
        &self.version_store
    }

    pub fn change_detector(&self) -> &ChangeDetector {
        &self.change_detector
    }

    pub fn conflict_detector(&self) -> &ConflictDetector {
        &self.conflict_detector
    }

    pub fn conflict_manager(&self) -> &ConflictManager {
        &self.conflict_manager
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.orchestrator
    }
}
