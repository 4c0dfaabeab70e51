use crate::{ComputeError, Frame};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Inputs handed to a node's compute step: the already-computed frame of
/// each upstream dependency, keyed by node name.
#[derive(Clone, Default)]
pub struct ComputeContext {
    pub inputs: HashMap<String, Arc<Frame>>,
}

impl ComputeContext {
    pub fn new(inputs: HashMap<String, Arc<Frame>>) -> Self {
        Self { inputs }
    }

    /// Get a required upstream frame or fail the compute.
    pub fn require_input(&self, name: &str) -> Result<&Arc<Frame>, ComputeError> {
        self.inputs
            .get(name)
            .ok_or_else(|| ComputeError::Schema(format!("missing upstream input '{}'", name)))
    }
}

/// Compute contract every node variant implements.
///
/// A compute step is pure with respect to workflow state: it consumes the
/// frames of its dependencies and either produces a new frame or fails with
/// a `ComputeError`. Status bookkeeping lives in the executor.
#[async_trait]
pub trait Compute: Send + Sync {
    /// Type identifier, matching the registry key (e.g. "source.csv").
    fn node_type(&self) -> &str;

    async fn compute(&self, ctx: ComputeContext) -> Result<Frame, ComputeError>;
}
