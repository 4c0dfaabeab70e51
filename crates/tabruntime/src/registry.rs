use std::collections::HashMap;
use std::sync::Arc;
use tabcore::{Compute, EngineError, NodeKind, Workflow};

/// Factory trait implemented once per node variant.
///
/// `validate` runs when a node is added to a workflow and is the single
/// place a variant's config schema is enforced; `create` instantiates the
/// compute step at execution time.
pub trait NodeFactory: Send + Sync {
    /// Type identifier this factory serves (e.g. "source.csv").
    fn node_type(&self) -> &str;

    /// Check the variant's configuration against the workflow it is
    /// joining. Rejections leave the workflow's node set untouched.
    fn validate(&self, name: &str, kind: &NodeKind, workflow: &Workflow)
        -> Result<(), EngineError>;

    /// Build the compute step for a validated node.
    fn create(&self, kind: &NodeKind) -> Result<Box<dyn Compute>, EngineError>;

    /// Optional human-facing metadata, shown by the CLI node listing.
    fn metadata(&self) -> NodeTypeInfo {
        NodeTypeInfo::default()
    }
}

/// Metadata about a registered node type.
#[derive(Debug, Clone, Default)]
pub struct NodeTypeInfo {
    pub description: String,
    pub category: String,
}

/// Registry of available node variants, keyed by type identifier.
pub struct NodeRegistry {
    factories: HashMap<String, Arc<dyn NodeFactory>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register(&mut self, factory: Arc<dyn NodeFactory>) {
        let node_type = factory.node_type().to_string();
        tracing::info!("Registering node type: {}", node_type);
        self.factories.insert(node_type, factory);
    }

    fn factory_for(&self, kind: &NodeKind) -> Result<&Arc<dyn NodeFactory>, EngineError> {
        self.factories.get(kind.type_id()).ok_or_else(|| {
            EngineError::InvalidConfig(format!("unknown node type: {}", kind.type_id()))
        })
    }

    /// Validate a node's config before it is appended to `workflow`.
    pub fn validate(
        &self,
        name: &str,
        kind: &NodeKind,
        workflow: &Workflow,
    ) -> Result<(), EngineError> {
        self.factory_for(kind)?.validate(name, kind, workflow)
    }

    /// Instantiate the compute step for a node.
    pub fn create(&self, kind: &NodeKind) -> Result<Box<dyn Compute>, EngineError> {
        self.factory_for(kind)?.create(kind)
    }

    pub fn list_node_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.factories.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn get_metadata(&self, node_type: &str) -> Option<NodeTypeInfo> {
        self.factories.get(node_type).map(|f| f.metadata())
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
