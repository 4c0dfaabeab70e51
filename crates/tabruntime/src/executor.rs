use crate::dag::build_plan;
use crate::registry::NodeRegistry;
use crate::store::WorkflowStore;
use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tabcore::{
    Compute, ComputeContext, EngineError, EventBus, ExecutionEvent, Frame, NodeStatus, RunId,
    WorkflowStatus,
};
use uuid::Uuid;

/// Terminal summary of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub status: WorkflowStatus,
    pub failed_nodes: Vec<String>,
    pub last_run_at: DateTime<Utc>,
}

/// Executes a workflow's DAG with parallel independent branches.
///
/// Nodes sharing no dependency edge run concurrently up to `max_parallel`;
/// a dependency edge is a strict barrier. A node failure propagates to its
/// dependents without invoking their compute step, while sibling branches
/// keep running to their own terminal status.
pub struct WorkflowExecutor {
    max_parallel: usize,
    max_cached_rows: usize,
}

impl WorkflowExecutor {
    pub fn new(max_parallel: usize, max_cached_rows: usize) -> Self {
        Self {
            max_parallel: max_parallel.max(1),
            max_cached_rows,
        }
    }

    /// Run every node of `workflow_name` in dependency order.
    ///
    /// Structural failures (`CyclicGraph`, `InvalidConfig`) abort before any
    /// node executes and leave `last_run_at` untouched. Node-level compute
    /// failures are recorded per node and never abort the run.
    pub async fn execute(
        &self,
        store: &WorkflowStore,
        registry: &NodeRegistry,
        event_bus: &EventBus,
        workflow_name: &str,
    ) -> Result<RunOutcome, EngineError> {
        let run_id = Uuid::new_v4();
        let start_time = Instant::now();

        // Claim the workflow: rejects a concurrent run and resets node state.
        let snapshot = store.begin_run(workflow_name).await?;

        let plan = match build_plan(&snapshot) {
            Ok(plan) => plan,
            Err(e) => {
                store.abort_run(workflow_name).await;
                return Err(e);
            }
        };

        // Instantiate every compute step up front so an unknown node type
        // also aborts before execution starts.
        let mut computes: HashMap<String, Box<dyn Compute>> = HashMap::new();
        for node in &snapshot.nodes {
            match registry.create(&node.kind) {
                Ok(compute) => {
                    computes.insert(node.name.clone(), compute);
                }
                Err(e) => {
                    store.abort_run(workflow_name).await;
                    return Err(e);
                }
            }
        }

        tracing::info!("Starting run {} of workflow '{}'", run_id, workflow_name);
        event_bus.emit(ExecutionEvent::RunStarted {
            run_id,
            workflow: workflow_name.to_string(),
            timestamp: Utc::now(),
        });

        let node_types: HashMap<String, &'static str> = snapshot
            .nodes
            .iter()
            .map(|n| (n.name.clone(), n.kind.type_id()))
            .collect();

        let mut statuses: HashMap<String, NodeStatus> = plan
            .order
            .iter()
            .map(|name| (name.clone(), NodeStatus::Pending))
            .collect();
        let mut outputs: HashMap<String, Arc<Frame>> = HashMap::new();
        // Each task resolves to (node, result, duration_ms); a panic inside
        // a compute step resolves to a node failure, never a run failure.
        let mut running: FuturesUnordered<
            futures::future::BoxFuture<'static, (String, Result<Frame, String>, u64)>,
        > = FuturesUnordered::new();

        loop {
            // Propagate failures downstream. One pass in topological order
            // cascades fully because dependencies precede their dependents.
            for name in &plan.order {
                if statuses[name] != NodeStatus::Pending {
                    continue;
                }
                let failed_dep = plan.dependencies[name]
                    .iter()
                    .find(|dep| statuses[dep.as_str()] == NodeStatus::Failed);
                if let Some(dep) = failed_dep {
                    let error = format!("upstream dependency '{}' failed", dep);
                    tracing::warn!("Node '{}' skipped: {}", name, error);
                    statuses.insert(name.clone(), NodeStatus::Failed);
                    store.set_node_failed(workflow_name, name, error.clone()).await;
                    event_bus.emit(ExecutionEvent::NodeFailed {
                        run_id,
                        node: name.clone(),
                        error,
                        timestamp: Utc::now(),
                    });
                }
            }

            // Nodes whose dependencies have all succeeded are ready.
            let ready: Vec<String> = plan
                .order
                .iter()
                .filter(|name| {
                    statuses[name.as_str()] == NodeStatus::Pending
                        && plan.dependencies[name.as_str()]
                            .iter()
                            .all(|dep| statuses[dep.as_str()] == NodeStatus::Success)
                })
                .cloned()
                .collect();

            for name in ready {
                if running.len() >= self.max_parallel {
                    break;
                }

                let compute = computes
                    .remove(&name)
                    .expect("compute instantiated for every planned node");
                let inputs: HashMap<String, Arc<Frame>> = plan.dependencies[&name]
                    .iter()
                    .map(|dep| (dep.clone(), outputs[dep].clone()))
                    .collect();

                statuses.insert(name.clone(), NodeStatus::Running);
                store.set_node_running(workflow_name, &name).await;
                event_bus.emit(ExecutionEvent::NodeStarted {
                    run_id,
                    node: name.clone(),
                    node_type: node_types[&name].to_string(),
                    timestamp: Utc::now(),
                });

                let handle = tokio::spawn(async move {
                    let start = Instant::now();
                    let result = compute.compute(ComputeContext::new(inputs)).await;
                    (result, start.elapsed().as_millis() as u64)
                });
                running.push(Box::pin(async move {
                    match handle.await {
                        Ok((result, duration_ms)) => {
                            (name, result.map_err(|e| e.to_string()), duration_ms)
                        }
                        Err(e) => (name, Err(format!("compute task panicked: {}", e)), 0),
                    }
                }));
            }

            // Nothing running and nothing became ready: every node is
            // terminal (or blocked behind a failure already propagated).
            if running.is_empty() {
                break;
            }

            if let Some((name, result, duration_ms)) = running.next().await {
                match result {
                    Ok(frame) => {
                        let rows = frame.n_rows();
                        tracing::info!(
                            "Node '{}' completed in {}ms ({} rows)",
                            name,
                            duration_ms,
                            rows
                        );
                        let frame = Arc::new(frame);
                        let cached = (rows <= self.max_cached_rows).then(|| frame.clone());
                        store.set_node_success(workflow_name, &name, cached).await;
                        event_bus.emit(ExecutionEvent::NodeSucceeded {
                            run_id,
                            node: name.clone(),
                            rows,
                            duration_ms,
                            timestamp: Utc::now(),
                        });
                        outputs.insert(name.clone(), frame);
                        statuses.insert(name, NodeStatus::Success);
                    }
                    Err(error) => {
                        tracing::error!("Node '{}' failed: {}", name, error);
                        store.set_node_failed(workflow_name, &name, error.clone()).await;
                        event_bus.emit(ExecutionEvent::NodeFailed {
                            run_id,
                            node: name.clone(),
                            error,
                            timestamp: Utc::now(),
                        });
                        statuses.insert(name, NodeStatus::Failed);
                    }
                }
            }
        }

        let completed_at = Utc::now();
        let failed_nodes: Vec<String> = plan
            .order
            .iter()
            .filter(|name| statuses[name.as_str()] == NodeStatus::Failed)
            .cloned()
            .collect();
        let success = failed_nodes.is_empty();

        store
            .finish_run(workflow_name, failed_nodes.clone(), completed_at)
            .await;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        tracing::info!(
            "Run {} of '{}' finished in {}ms: {}",
            run_id,
            workflow_name,
            duration_ms,
            if success { "success" } else { "failed" }
        );
        event_bus.emit(ExecutionEvent::RunCompleted {
            run_id,
            workflow: workflow_name.to_string(),
            success,
            duration_ms,
            timestamp: Utc::now(),
        });

        let status = if !success {
            WorkflowStatus::Failed
        } else if plan.order.is_empty() {
            WorkflowStatus::Idle
        } else {
            WorkflowStatus::Success
        };

        Ok(RunOutcome {
            run_id,
            status,
            failed_nodes,
            last_run_at: completed_at,
        })
    }
}
