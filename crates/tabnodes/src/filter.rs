use async_trait::async_trait;
use std::cmp::Ordering;
use tabcore::{
    Cell, Compute, ComputeContext, ComputeError, EngineError, FilterOp, Frame, NodeKind, Workflow,
};
use tabruntime::{NodeFactory, NodeTypeInfo};

/// Transform node: keeps the rows of one upstream frame whose cell in
/// `column` satisfies `op value`.
///
/// The predicate is declarative config, never evaluated text. Matching is
/// typed: `Int` and `Float` compare numerically with each other, strings
/// and booleans only against their own type. A null cell, or a cell whose
/// type cannot be compared with the configured value, never matches.
pub struct FilterNode {
    input: String,
    column: String,
    op: FilterOp,
    value: Cell,
}

impl FilterNode {
    pub fn new(input: impl Into<String>, column: impl Into<String>, op: FilterOp, value: Cell) -> Self {
        Self {
            input: input.into(),
            column: column.into(),
            op,
            value,
        }
    }
}

#[async_trait]
impl Compute for FilterNode {
    fn node_type(&self) -> &str {
        "transform.filter"
    }

    async fn compute(&self, ctx: ComputeContext) -> Result<Frame, ComputeError> {
        let input = ctx.require_input(&self.input)?;
        let index = input.column_index(&self.column).ok_or_else(|| {
            ComputeError::Schema(format!(
                "filter column '{}' missing from input '{}'",
                self.column, self.input
            ))
        })?;

        let mut frame = Frame::new(input.columns().to_vec());
        for row in input.rows() {
            if matches(&row[index], self.op, &self.value) {
                frame.push_row(row.clone());
            }
        }

        tracing::debug!(
            "Filtered '{}' on {} {:?} {:?}: {} of {} rows kept",
            self.input,
            self.column,
            self.op,
            self.value,
            frame.n_rows(),
            input.n_rows()
        );
        Ok(frame)
    }
}

fn matches(cell: &Cell, op: FilterOp, value: &Cell) -> bool {
    if cell.is_null() {
        return false;
    }
    match op {
        FilterOp::Eq => cells_eq(cell, value),
        FilterOp::Ne => !cells_eq(cell, value),
        FilterOp::Gt => compare(cell, value) == Some(Ordering::Greater),
        FilterOp::Gte => matches!(compare(cell, value), Some(Ordering::Greater | Ordering::Equal)),
        FilterOp::Lt => compare(cell, value) == Some(Ordering::Less),
        FilterOp::Lte => matches!(compare(cell, value), Some(Ordering::Less | Ordering::Equal)),
    }
}

fn cells_eq(a: &Cell, b: &Cell) -> bool {
    match (a, b) {
        (Cell::Int(x), Cell::Float(y)) | (Cell::Float(y), Cell::Int(x)) => *x as f64 == *y,
        (Cell::Null, _) | (_, Cell::Null) => false,
        _ => a == b,
    }
}

/// Ordering between comparable cell pairs. Mixed numeric types compare as
/// floats; anything else (bools, cross-type pairs) has no ordering.
fn compare(a: &Cell, b: &Cell) -> Option<Ordering> {
    match (a, b) {
        (Cell::Int(x), Cell::Int(y)) => Some(x.cmp(y)),
        (Cell::Int(x), Cell::Float(y)) => (*x as f64).partial_cmp(y),
        (Cell::Float(x), Cell::Int(y)) => x.partial_cmp(&(*y as f64)),
        (Cell::Float(x), Cell::Float(y)) => x.partial_cmp(y),
        (Cell::Str(x), Cell::Str(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

pub struct FilterNodeFactory;

impl NodeFactory for FilterNodeFactory {
    fn node_type(&self) -> &str {
        "transform.filter"
    }

    fn validate(&self, name: &str, kind: &NodeKind, workflow: &Workflow) -> Result<(), EngineError> {
        let NodeKind::Filter { input, column, value, .. } = kind else {
            return Err(EngineError::InvalidConfig(format!(
                "node '{}': expected transform.filter config, got {}",
                name,
                kind.type_id()
            )));
        };

        if column.trim().is_empty() {
            return Err(EngineError::InvalidConfig(format!(
                "node '{}': filter column must not be empty",
                name
            )));
        }
        if value.is_null() {
            return Err(EngineError::InvalidConfig(format!(
                "node '{}': comparison value must not be null",
                name
            )));
        }
        if workflow.find_node(input).is_none() {
            return Err(EngineError::InvalidConfig(format!(
                "node '{}': dependency '{}' does not exist",
                name, input
            )));
        }
        Ok(())
    }

    fn create(&self, kind: &NodeKind) -> Result<Box<dyn Compute>, EngineError> {
        match kind {
            NodeKind::Filter {
                input,
                column,
                op,
                value,
            } => Ok(Box::new(FilterNode::new(
                input.clone(),
                column.clone(),
                *op,
                value.clone(),
            ))),
            other => Err(EngineError::InvalidConfig(format!(
                "expected transform.filter config, got {}",
                other.type_id()
            ))),
        }
    }

    fn metadata(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            description: "Keep rows whose column value satisfies a predicate".to_string(),
            category: "transform".to_string(),
        }
    }
}
