use crate::dag::build_plan;
use crate::registry::NodeRegistry;
use crate::store::WorkflowStore;
use serde_json::{Map, Value as JsonValue};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tabcore::{ComputeContext, EngineError, Frame};

/// Materializes a bounded row sample of a single node's output.
///
/// Workflow-state-neutral: node statuses, workflow status and `last_run_at`
/// are never mutated. When the node's output survives from the latest run
/// the sample is a direct slice; otherwise the node and any dependencies
/// lacking output are recomputed into a transient map owned by this call,
/// so a preview can never race an in-flight run on shared node state.
pub struct PreviewService {
    max_cached_rows: usize,
}

impl PreviewService {
    pub fn new(max_cached_rows: usize) -> Self {
        Self { max_cached_rows }
    }

    /// Up to `limit` rows of `node_name`'s output as JSON row objects.
    /// An empty result is valid; `limit` must be at least 1.
    pub async fn preview(
        &self,
        store: &WorkflowStore,
        registry: &NodeRegistry,
        workflow_name: &str,
        node_name: &str,
        limit: usize,
    ) -> Result<Vec<Map<String, JsonValue>>, EngineError> {
        if limit == 0 {
            return Err(EngineError::InvalidConfig(
                "preview limit must be positive".into(),
            ));
        }

        let snapshot = store.snapshot(workflow_name).await?;
        let target = snapshot.find_node(node_name).ok_or_else(|| {
            EngineError::NotFound(format!(
                "node '{}' in workflow '{}'",
                node_name, workflow_name
            ))
        })?;

        // Fast path: output cached from the most recent run.
        if let Some(output) = &target.output {
            return Ok(output.head(limit));
        }

        // Recompute the target and any of its ancestors lacking output.
        let plan = build_plan(&snapshot)?;
        let needed = ancestors_and_self(node_name, &plan.dependencies);

        let mut frames: HashMap<String, Arc<Frame>> = HashMap::new();
        for node in &snapshot.nodes {
            if needed.contains(node.name.as_str()) {
                if let Some(output) = &node.output {
                    frames.insert(node.name.clone(), output.clone());
                }
            }
        }

        for name in plan.order.iter().filter(|n| needed.contains(n.as_str())) {
            if frames.contains_key(name) {
                continue;
            }
            let spec = snapshot
                .find_node(name)
                .expect("planned node exists in snapshot");
            let compute = registry.create(&spec.kind)?;
            let inputs: HashMap<String, Arc<Frame>> = plan.dependencies[name]
                .iter()
                .map(|dep| (dep.clone(), frames[dep].clone()))
                .collect();

            tracing::debug!("Preview recomputing node '{}'", name);
            let frame = compute.compute(ComputeContext::new(inputs)).await?;
            frames.insert(name.clone(), Arc::new(frame));
        }

        let output = frames.remove(node_name).expect("target was computed");

        // Opportunistic write-back, keyed to the snapshot's run generation:
        // the store drops it if a run has started or completed since the
        // snapshot was taken, or if the frame exceeds the cache cap.
        if output.n_rows() <= self.max_cached_rows {
            store
                .cache_output(workflow_name, node_name, output.clone(), snapshot.run_generation)
                .await;
        }

        Ok(output.head(limit))
    }
}

/// Transitive dependency closure of `target`, target included.
fn ancestors_and_self<'a>(
    target: &'a str,
    dependencies: &'a HashMap<String, Vec<String>>,
) -> HashSet<&'a str> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack = vec![target];
    while let Some(name) = stack.pop() {
        if seen.insert(name) {
            if let Some(deps) = dependencies.get(name) {
                stack.extend(deps.iter().map(|d| d.as_str()));
            }
        }
    }
    seen
}
