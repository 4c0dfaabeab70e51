//! Workflow execution runtime
//!
//! This crate provides the engine behind the HTTP surface: the in-memory
//! workflow store, the DAG builder, the parallel executor with failure
//! propagation, the bounded preview service, and the node registry.

mod dag;
mod executor;
mod preview;
mod registry;
mod runtime;
mod store;

pub use dag::{build_plan, ExecutionPlan};
pub use executor::{RunOutcome, WorkflowExecutor};
pub use preview::PreviewService;
pub use registry::{NodeFactory, NodeRegistry, NodeTypeInfo};
pub use runtime::{Runtime, RuntimeConfig};
pub use store::{NodeSummary, WorkflowStore, WorkflowSummary};
