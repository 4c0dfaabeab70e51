use crate::registry::NodeRegistry;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tabcore::{
    EngineError, Frame, NodeKind, NodeSpec, NodeStatus, Workflow, WorkflowStatus,
};
use tokio::sync::RwLock;

/// Listing row for a workflow.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSummary {
    pub name: String,
    pub status: WorkflowStatus,
    pub last_run_at: Option<DateTime<Utc>>,
    pub failed_nodes: Vec<String>,
}

/// Listing row for a node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeSummary {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub status: NodeStatus,
}

impl From<&Workflow> for WorkflowSummary {
    fn from(wf: &Workflow) -> Self {
        Self {
            name: wf.name.clone(),
            status: wf.status(),
            last_run_at: wf.last_run_at,
            failed_nodes: wf.failed_nodes.clone(),
        }
    }
}

impl From<&NodeSpec> for NodeSummary {
    fn from(node: &NodeSpec) -> Self {
        Self {
            name: node.name.clone(),
            node_type: node.kind.type_id().to_string(),
            status: node.status,
        }
    }
}

/// In-memory collection of workflows and their nodes.
///
/// An explicit store object with no process-wide state: created at service
/// start and passed to the executor and preview service. All reads go
/// through snapshots taken under the lock, so observers never see a status
/// mid-transition.
pub struct WorkflowStore {
    inner: RwLock<HashMap<String, Workflow>>,
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create_workflow(&self, name: &str) -> Result<WorkflowSummary, EngineError> {
        let mut workflows = self.inner.write().await;
        if workflows.contains_key(name) {
            return Err(EngineError::Conflict(format!("workflow '{}'", name)));
        }
        let wf = Workflow::new(name);
        let summary = WorkflowSummary::from(&wf);
        workflows.insert(name.to_string(), wf);
        tracing::info!("Created workflow: {}", name);
        Ok(summary)
    }

    /// Remove a workflow and, with it, every node it owns.
    pub async fn delete_workflow(&self, name: &str) -> Result<(), EngineError> {
        let mut workflows = self.inner.write().await;
        match workflows.remove(name) {
            Some(_) => {
                tracing::info!("Deleted workflow: {}", name);
                Ok(())
            }
            None => Err(EngineError::NotFound(format!("workflow '{}'", name))),
        }
    }

    pub async fn list_workflows(&self) -> Vec<WorkflowSummary> {
        let workflows = self.inner.read().await;
        let mut summaries: Vec<WorkflowSummary> =
            workflows.values().map(WorkflowSummary::from).collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    /// Validate and append a node. Validation runs through the registry
    /// before any mutation, so a rejected node leaves the set unchanged.
    pub async fn add_node(
        &self,
        workflow_name: &str,
        node_name: &str,
        kind: NodeKind,
        registry: &NodeRegistry,
    ) -> Result<NodeSummary, EngineError> {
        let mut workflows = self.inner.write().await;
        let wf = workflows
            .get_mut(workflow_name)
            .ok_or_else(|| EngineError::NotFound(format!("workflow '{}'", workflow_name)))?;

        if wf.find_node(node_name).is_some() {
            return Err(EngineError::Conflict(format!(
                "node '{}' in workflow '{}'",
                node_name, workflow_name
            )));
        }
        registry.validate(node_name, &kind, wf)?;

        let node = NodeSpec::new(node_name, kind);
        let summary = NodeSummary::from(&node);
        wf.nodes.push(node);
        tracing::info!(
            "Added node '{}' ({}) to workflow '{}'",
            node_name,
            summary.node_type,
            workflow_name
        );
        Ok(summary)
    }

    pub async fn list_nodes(&self, workflow_name: &str) -> Result<Vec<NodeSummary>, EngineError> {
        let workflows = self.inner.read().await;
        let wf = workflows
            .get(workflow_name)
            .ok_or_else(|| EngineError::NotFound(format!("workflow '{}'", workflow_name)))?;
        Ok(wf.nodes.iter().map(NodeSummary::from).collect())
    }

    /// Consistent copy of a workflow, cached outputs included.
    pub async fn snapshot(&self, workflow_name: &str) -> Result<Workflow, EngineError> {
        let workflows = self.inner.read().await;
        workflows
            .get(workflow_name)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("workflow '{}'", workflow_name)))
    }

    /// Claim a workflow for a run: rejects a second concurrent run, resets
    /// every node to `pending`, and clears errors, outputs and the failure
    /// set. Returns the snapshot the executor walks.
    pub async fn begin_run(&self, workflow_name: &str) -> Result<Workflow, EngineError> {
        let mut workflows = self.inner.write().await;
        let wf = workflows
            .get_mut(workflow_name)
            .ok_or_else(|| EngineError::NotFound(format!("workflow '{}'", workflow_name)))?;

        if wf.run_in_flight {
            return Err(EngineError::AlreadyRunning(workflow_name.to_string()));
        }

        wf.run_in_flight = true;
        wf.run_generation += 1;
        wf.failed_nodes.clear();
        for node in &mut wf.nodes {
            node.status = NodeStatus::Pending;
            node.error = None;
            node.output = None;
        }
        Ok(wf.clone())
    }

    /// Release a run claim without completing it (structural failure before
    /// any node executed).
    pub async fn abort_run(&self, workflow_name: &str) {
        let mut workflows = self.inner.write().await;
        if let Some(wf) = workflows.get_mut(workflow_name) {
            wf.run_in_flight = false;
        }
    }

    /// Record the terminal outcome of a run and release the claim.
    pub async fn finish_run(
        &self,
        workflow_name: &str,
        failed_nodes: Vec<String>,
        completed_at: DateTime<Utc>,
    ) {
        let mut workflows = self.inner.write().await;
        if let Some(wf) = workflows.get_mut(workflow_name) {
            wf.failed_nodes = failed_nodes;
            wf.last_run_at = Some(completed_at);
            wf.run_in_flight = false;
        }
    }

    pub async fn set_node_running(&self, workflow_name: &str, node_name: &str) {
        self.update_node(workflow_name, node_name, |node| {
            node.status = NodeStatus::Running;
        })
        .await;
    }

    /// Mark a node successful. `output` is `None` when the frame exceeded
    /// the configured cache cap and must be recomputed on demand.
    pub async fn set_node_success(
        &self,
        workflow_name: &str,
        node_name: &str,
        output: Option<Arc<Frame>>,
    ) {
        self.update_node(workflow_name, node_name, |node| {
            node.status = NodeStatus::Success;
            node.error = None;
            node.output = output;
        })
        .await;
    }

    pub async fn set_node_failed(&self, workflow_name: &str, node_name: &str, error: String) {
        self.update_node(workflow_name, node_name, |node| {
            node.status = NodeStatus::Failed;
            node.error = Some(error);
            node.output = None;
        })
        .await;
    }

    /// Cache an output computed by the preview service against the snapshot
    /// generation it was computed from. Skipped while a run is in flight,
    /// and skipped when a run has claimed the workflow since the snapshot
    /// was taken, so a stale preview never clobbers a newer run's output.
    pub async fn cache_output(
        &self,
        workflow_name: &str,
        node_name: &str,
        output: Arc<Frame>,
        generation: u64,
    ) {
        let mut workflows = self.inner.write().await;
        if let Some(wf) = workflows.get_mut(workflow_name) {
            if wf.run_in_flight || wf.run_generation != generation {
                return;
            }
            if let Some(node) = wf.find_node_mut(node_name) {
                node.output = Some(output);
            }
        }
    }

    async fn update_node<F>(&self, workflow_name: &str, node_name: &str, apply: F)
    where
        F: FnOnce(&mut NodeSpec),
    {
        let mut workflows = self.inner.write().await;
        if let Some(node) = workflows
            .get_mut(workflow_name)
            .and_then(|wf| wf.find_node_mut(node_name))
        {
            apply(node);
        }
    }
}

impl Default for WorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}
