use async_trait::async_trait;
use std::collections::HashMap;
use tabcore::{
    Cell, Compute, ComputeContext, ComputeError, EngineError, Frame, JoinHow, NodeKind, Workflow,
};
use tabruntime::{NodeFactory, NodeTypeInfo};

/// Transform node: hash join of two upstream frames on one or more key
/// columns.
///
/// Key columns are taken from the left input; right columns whose names
/// collide with a left column are suffixed `_right`. Duplicate key tuples
/// on the right input are a `JoinConflict`: explicit rejection rather than
/// silent row multiplication.
pub struct JoinNode {
    left: String,
    right: String,
    on: Vec<String>,
    how: JoinHow,
}

impl JoinNode {
    pub fn new(
        left: impl Into<String>,
        right: impl Into<String>,
        on: Vec<String>,
        how: JoinHow,
    ) -> Self {
        Self {
            left: left.into(),
            right: right.into(),
            on,
            how,
        }
    }
}

#[async_trait]
impl Compute for JoinNode {
    fn node_type(&self) -> &str {
        "transform.join"
    }

    async fn compute(&self, ctx: ComputeContext) -> Result<Frame, ComputeError> {
        let left = ctx.require_input(&self.left)?;
        let right = ctx.require_input(&self.right)?;

        let left_keys = key_indices(left, &self.on, &self.left)?;
        let right_keys = key_indices(right, &self.on, &self.right)?;

        // Right columns carried into the output: everything but the keys.
        let carried: Vec<usize> = (0..right.n_cols())
            .filter(|i| !right_keys.contains(i))
            .collect();

        let mut columns: Vec<String> = left.columns().to_vec();
        for &i in &carried {
            let name = &right.columns()[i];
            if left.has_column(name) {
                columns.push(format!("{}_right", name));
            } else {
                columns.push(name.clone());
            }
        }

        // Index the right input by key tuple; a second row with the same
        // tuple is a conflict.
        let mut by_key: HashMap<String, &Vec<Cell>> = HashMap::new();
        for row in right.rows() {
            let key = key_of(row, &right_keys);
            if by_key.insert(key, row).is_some() {
                let detail: Vec<String> = right_keys
                    .iter()
                    .map(|&i| format!("{}={:?}", right.columns()[i], row[i]))
                    .collect();
                return Err(ComputeError::JoinConflict(format!(
                    "duplicate key in input '{}': {}",
                    self.right,
                    detail.join(", ")
                )));
            }
        }

        let mut frame = Frame::new(columns);
        for row in left.rows() {
            let key = key_of(row, &left_keys);
            match by_key.get(&key) {
                Some(right_row) => {
                    let mut out = row.clone();
                    out.extend(carried.iter().map(|&i| right_row[i].clone()));
                    frame.push_row(out);
                }
                None => match self.how {
                    JoinHow::Inner => {}
                    JoinHow::Left => {
                        let mut out = row.clone();
                        out.extend(carried.iter().map(|_| Cell::Null));
                        frame.push_row(out);
                    }
                },
            }
        }

        tracing::debug!(
            "Joined '{}' with '{}' on {:?}: {} rows",
            self.left,
            self.right,
            self.on,
            frame.n_rows()
        );
        Ok(frame)
    }
}

fn key_indices(frame: &Frame, on: &[String], input: &str) -> Result<Vec<usize>, ComputeError> {
    on.iter()
        .map(|col| {
            frame.column_index(col).ok_or_else(|| {
                ComputeError::Schema(format!(
                    "join key '{}' missing from input '{}'",
                    col, input
                ))
            })
        })
        .collect()
}

fn key_of(row: &[Cell], indices: &[usize]) -> String {
    let mut key = String::new();
    for &i in indices {
        key.push_str(&row[i].key_repr());
        key.push('\u{1f}');
    }
    key
}

pub struct JoinNodeFactory;

impl NodeFactory for JoinNodeFactory {
    fn node_type(&self) -> &str {
        "transform.join"
    }

    fn validate(&self, name: &str, kind: &NodeKind, workflow: &Workflow) -> Result<(), EngineError> {
        let NodeKind::Join { left, right, on, .. } = kind else {
            return Err(EngineError::InvalidConfig(format!(
                "node '{}': expected transform.join config, got {}",
                name,
                kind.type_id()
            )));
        };

        if on.is_empty() {
            return Err(EngineError::InvalidConfig(format!(
                "node '{}': at least one join key is required",
                name
            )));
        }
        for dep in [left, right] {
            if workflow.find_node(dep).is_none() {
                return Err(EngineError::InvalidConfig(format!(
                    "node '{}': dependency '{}' does not exist",
                    name, dep
                )));
            }
        }
        if left == right {
            return Err(EngineError::InvalidConfig(format!(
                "node '{}': left and right inputs must differ",
                name
            )));
        }
        Ok(())
    }

    fn create(&self, kind: &NodeKind) -> Result<Box<dyn Compute>, EngineError> {
        match kind {
            NodeKind::Join {
                left,
                right,
                on,
                how,
            } => Ok(Box::new(JoinNode::new(
                left.clone(),
                right.clone(),
                on.clone(),
                *how,
            ))),
            other => Err(EngineError::InvalidConfig(format!(
                "expected transform.join config, got {}",
                other.type_id()
            ))),
        }
    }

    fn metadata(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            description: "Join two upstream frames on key columns".to_string(),
            category: "transform".to_string(),
        }
    }
}
