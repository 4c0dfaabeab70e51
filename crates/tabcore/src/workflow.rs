use crate::{Cell, Frame};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub type WorkflowId = Uuid;
pub type NodeId = Uuid;

/// Terminal and transient states of a single node within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeStatus::Success | NodeStatus::Failed)
    }
}

/// Workflow status derived from node statuses and the run-in-flight flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Idle,
    Running,
    Success,
    Failed,
}

/// Join strategy for duplicate-free keyed joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JoinHow {
    #[default]
    Inner,
    Left,
}

/// Comparison operator of a declarative row filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Node variant plus its type-specific configuration.
///
/// Dependencies are derived from the variant: a source reads from disk and
/// has none, a join consumes exactly the two nodes it names, a filter the
/// one node it names. New variants extend this enum and register a factory
/// for their type id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum NodeKind {
    #[serde(rename = "source.csv")]
    Source { file_path: String },

    #[serde(rename = "transform.join")]
    Join {
        left: String,
        right: String,
        on: Vec<String>,
        #[serde(default)]
        how: JoinHow,
    },

    #[serde(rename = "transform.filter")]
    Filter {
        input: String,
        column: String,
        op: FilterOp,
        value: Cell,
    },
}

impl NodeKind {
    /// Stable type identifier, also the registry key.
    pub fn type_id(&self) -> &'static str {
        match self {
            NodeKind::Source { .. } => "source.csv",
            NodeKind::Join { .. } => "transform.join",
            NodeKind::Filter { .. } => "transform.filter",
        }
    }

    /// Upstream node names this variant consumes, in declaration order.
    pub fn dependencies(&self) -> Vec<&str> {
        match self {
            NodeKind::Source { .. } => Vec::new(),
            NodeKind::Join { left, right, .. } => vec![left.as_str(), right.as_str()],
            NodeKind::Filter { input, .. } => vec![input.as_str()],
        }
    }
}

/// A node within a workflow: identity, variant config, and the mutable
/// per-run state (status, error detail, cached output).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub status: NodeStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Cached tabular output of the most recent computation. Shared by
    /// reference so the executor and preview service can hand out slices
    /// without copying rows. Not serialized.
    #[serde(skip)]
    pub output: Option<Arc<Frame>>,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            kind,
            status: NodeStatus::Pending,
            error: None,
            created_at: Utc::now(),
            output: None,
        }
    }
}

/// A named, independently runnable DAG of nodes.
///
/// Node insertion order is preserved in `nodes`; the DAG builder uses it to
/// break ties between independent nodes so execution order is reproducible.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub failed_nodes: Vec<String>,
    pub nodes: Vec<NodeSpec>,
    /// True while a run owns this workflow's node statuses. Guards against
    /// two runs racing on the same nodes; not serialized.
    #[serde(skip)]
    pub run_in_flight: bool,
    /// Incremented each time a run claims this workflow. Stale writers
    /// (a preview computed against an older snapshot) compare against it
    /// before touching cached outputs; not serialized.
    #[serde(skip)]
    pub run_generation: u64,
}

impl Workflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
            last_run_at: None,
            failed_nodes: Vec::new(),
            nodes: Vec::new(),
            run_in_flight: false,
            run_generation: 0,
        }
    }

    pub fn find_node(&self, name: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn find_node_mut(&mut self, name: &str) -> Option<&mut NodeSpec> {
        self.nodes.iter_mut().find(|n| n.name == name)
    }

    /// Derived workflow status. A workflow is `running` exactly while a run
    /// holds it; otherwise the latest terminal node statuses decide.
    pub fn status(&self) -> WorkflowStatus {
        if self.run_in_flight {
            return WorkflowStatus::Running;
        }
        if self.nodes.is_empty() {
            return WorkflowStatus::Idle;
        }
        if self.nodes.iter().any(|n| n.status == NodeStatus::Failed) {
            return WorkflowStatus::Failed;
        }
        if self.nodes.iter().all(|n| n.status == NodeStatus::Success) {
            return WorkflowStatus::Success;
        }
        WorkflowStatus::Idle
    }
}
