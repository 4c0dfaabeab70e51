//! Core abstractions for the tabular workflow engine
//!
//! This crate provides the fundamental types every other component depends
//! on: the `Frame` tabular value, the workflow/node data model, the compute
//! contract, the error taxonomy, and the execution event bus.

mod error;
mod events;
mod frame;
mod node;
mod workflow;

pub use error::{ComputeError, EngineError};
pub use events::{EventBus, ExecutionEvent, RunId};
pub use frame::{Cell, Frame};
pub use node::{Compute, ComputeContext};
pub use workflow::{
    FilterOp, JoinHow, NodeId, NodeKind, NodeSpec, NodeStatus, Workflow, WorkflowId,
    WorkflowStatus,
};

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
