use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap};
use tabcore::{EngineError, Workflow};

/// Dependency graph of a workflow plus its deterministic execution order.
pub struct ExecutionPlan {
    /// Node names in topological order. Ties between independent nodes are
    /// broken by insertion order, so the order is stable across runs.
    pub order: Vec<String>,
    /// Upstream node names per node, in declaration order.
    pub dependencies: HashMap<String, Vec<String>>,
}

/// Build the execution plan for a workflow's node set.
///
/// Fails with `InvalidConfig` if a node references a dependency that does
/// not exist, and with `CyclicGraph` if the dependency relation contains a
/// cycle. Either failure aborts before any node executes.
pub fn build_plan(workflow: &Workflow) -> Result<ExecutionPlan, EngineError> {
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut index_of: HashMap<&str, NodeIndex> = HashMap::new();

    // Graph indices follow insertion order; the Kahn walk below relies on
    // that for deterministic tie-breaking.
    for node in &workflow.nodes {
        let idx = graph.add_node(node.name.clone());
        index_of.insert(node.name.as_str(), idx);
    }

    let mut dependencies: HashMap<String, Vec<String>> = HashMap::new();
    for node in &workflow.nodes {
        let deps: Vec<String> = node
            .kind
            .dependencies()
            .iter()
            .map(|d| d.to_string())
            .collect();
        for dep in &deps {
            let from = index_of.get(dep.as_str()).ok_or_else(|| {
                EngineError::InvalidConfig(format!(
                    "node '{}' depends on unknown node '{}'",
                    node.name, dep
                ))
            })?;
            let to = index_of[node.name.as_str()];
            graph.add_edge(*from, to, ());
        }
        dependencies.insert(node.name.clone(), deps);
    }

    // Kahn's algorithm over a BTreeSet ready set: NodeIndex ordering is
    // insertion ordering, so the smallest ready index always runs first.
    let mut in_degree: HashMap<NodeIndex, usize> = graph
        .node_indices()
        .map(|idx| {
            (
                idx,
                graph
                    .neighbors_directed(idx, petgraph::Direction::Incoming)
                    .count(),
            )
        })
        .collect();

    let mut ready: BTreeSet<NodeIndex> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&idx, _)| idx)
        .collect();

    let mut order = Vec::with_capacity(workflow.nodes.len());
    while let Some(&idx) = ready.iter().next() {
        ready.remove(&idx);
        order.push(graph[idx].clone());

        for succ in graph.neighbors_directed(idx, petgraph::Direction::Outgoing) {
            let deg = in_degree.get_mut(&succ).expect("successor is in graph");
            *deg -= 1;
            if *deg == 0 {
                ready.insert(succ);
            }
        }
    }

    if order.len() != workflow.nodes.len() {
        return Err(EngineError::CyclicGraph);
    }

    Ok(ExecutionPlan {
        order,
        dependencies,
    })
}
