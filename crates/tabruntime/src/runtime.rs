use crate::executor::{RunOutcome, WorkflowExecutor};
use crate::preview::PreviewService;
use crate::registry::NodeRegistry;
use crate::store::{NodeSummary, WorkflowStore, WorkflowSummary};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use tabcore::{EngineError, EventBus, ExecutionEvent, NodeKind};

/// Configuration for the engine runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Upper bound on concurrently executing nodes within one run.
    pub max_parallel_nodes: usize,
    /// Outputs longer than this many rows are not retained in the cache
    /// and are recomputed on demand by preview.
    pub max_cached_rows: usize,
    pub event_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_parallel_nodes: 8,
            max_cached_rows: 500_000,
            event_buffer_size: 1000,
        }
    }
}

/// Engine facade tying the store, registry, executor and preview service
/// together. Created once at service start and shared by handlers.
pub struct Runtime {
    store: WorkflowStore,
    registry: Arc<NodeRegistry>,
    executor: WorkflowExecutor,
    preview: PreviewService,
    event_bus: Arc<EventBus>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::with_registry(Arc::new(NodeRegistry::new()), RuntimeConfig::default())
    }

    pub fn with_registry(registry: Arc<NodeRegistry>, config: RuntimeConfig) -> Self {
        Self {
            store: WorkflowStore::new(),
            registry,
            executor: WorkflowExecutor::new(config.max_parallel_nodes, config.max_cached_rows),
            preview: PreviewService::new(config.max_cached_rows),
            event_bus: Arc::new(EventBus::new(config.event_buffer_size)),
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub async fn create_workflow(&self, name: &str) -> Result<WorkflowSummary, EngineError> {
        self.store.create_workflow(name).await
    }

    pub async fn delete_workflow(&self, name: &str) -> Result<(), EngineError> {
        self.store.delete_workflow(name).await
    }

    pub async fn list_workflows(&self) -> Vec<WorkflowSummary> {
        self.store.list_workflows().await
    }

    pub async fn add_node(
        &self,
        workflow_name: &str,
        node_name: &str,
        kind: NodeKind,
    ) -> Result<NodeSummary, EngineError> {
        self.store
            .add_node(workflow_name, node_name, kind, &self.registry)
            .await
    }

    pub async fn list_nodes(&self, workflow_name: &str) -> Result<Vec<NodeSummary>, EngineError> {
        self.store.list_nodes(workflow_name).await
    }

    /// Run a workflow end to end. One run per workflow at a time; a second
    /// concurrent request fails with `AlreadyRunning`.
    pub async fn run_workflow(&self, workflow_name: &str) -> Result<RunOutcome, EngineError> {
        self.executor
            .execute(&self.store, &self.registry, &self.event_bus, workflow_name)
            .await
    }

    /// Bounded, workflow-state-neutral sample of a node's output.
    pub async fn preview(
        &self,
        workflow_name: &str,
        node_name: &str,
        limit: usize,
    ) -> Result<Vec<Map<String, JsonValue>>, EngineError> {
        self.preview
            .preview(&self.store, &self.registry, workflow_name, node_name, limit)
            .await
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<ExecutionEvent> {
        self.event_bus.subscribe()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}
