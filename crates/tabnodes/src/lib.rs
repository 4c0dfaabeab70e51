//! Built-in node library
//!
//! Compute implementations and registry factories for the standard node
//! variants: CSV ingestion, keyed joins and row filters.

mod csv;
mod filter;
mod join;

pub use crate::csv::CsvReadNode;
pub use filter::FilterNode;
pub use join::JoinNode;

use std::sync::Arc;
use tabruntime::NodeRegistry;

/// Register all built-in node types with a registry.
pub fn register_all(registry: &mut NodeRegistry) {
    registry.register(Arc::new(csv::CsvReadNodeFactory));
    registry.register(Arc::new(join::JoinNodeFactory));
    registry.register(Arc::new(filter::FilterNodeFactory));
}
