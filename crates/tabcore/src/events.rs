use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub type RunId = Uuid;

/// Events emitted while a run walks the DAG. Observers (CLI progress
/// output, log sinks) subscribe through the bus; emission never blocks the
/// executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    RunStarted {
        run_id: RunId,
        workflow: String,
        timestamp: DateTime<Utc>,
    },
    NodeStarted {
        run_id: RunId,
        node: String,
        node_type: String,
        timestamp: DateTime<Utc>,
    },
    NodeSucceeded {
        run_id: RunId,
        node: String,
        rows: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    NodeFailed {
        run_id: RunId,
        node: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    RunCompleted {
        run_id: RunId,
        workflow: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcast bus for execution events.
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all subscribers; dropped if nobody listens.
    pub fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }
}
