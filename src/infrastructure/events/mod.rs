//! Event bus for the deployment status channel

use crate::domain::deployment::{DeploymentStatus, SyncPhase};
use crate::domain::conflict::ConflictSeverity;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Sync engine events
#[derive(Debug, Clone)]
pub enum Event {
    /// A deployment started
    DeploymentStarted {
        deployment_id: Uuid,
        total_items: usize,
    },

    /// Progress update for an in-flight deployment
    DeploymentProgress {
        deployment_id: Uuid,
        phase: SyncPhase,
        percentage: f32,
        message: String,
    },

    /// Terminal record for a deployment
    DeploymentFinished {
        deployment_id: Uuid,
        status: DeploymentStatus,
        logs: Vec<String>,
    },

    /// A conflict was detected on a content type
    ConflictDetected {
        type_key: String,
        severity: ConflictSeverity,
    },

    /// A content type was pushed and recorded
    TypeSynced {
        type_key: String,
        version_hash: Option<String>,
    },
}

/// Event bus for broadcasting events
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus with specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event
    pub fn emit(&self, event: Event) {
        // Ignore send errors (no receivers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
