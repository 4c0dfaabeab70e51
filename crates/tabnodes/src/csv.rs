use async_trait::async_trait;
use tabcore::{
    Cell, Compute, ComputeContext, ComputeError, EngineError, Frame, NodeKind, Workflow,
};
use tabruntime::{NodeFactory, NodeTypeInfo};

/// Source node: reads a delimited file into a frame.
///
/// The header row names the columns; every field is type-inferred with
/// `Cell::parse`. Missing or unreadable files fail with an io error, ragged
/// rows with a parse error.
pub struct CsvReadNode {
    file_path: String,
}

impl CsvReadNode {
    pub fn new(file_path: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }
}

#[async_trait]
impl Compute for CsvReadNode {
    fn node_type(&self) -> &str {
        "source.csv"
    }

    async fn compute(&self, _ctx: ComputeContext) -> Result<Frame, ComputeError> {
        let mut reader = csv::Reader::from_path(&self.file_path).map_err(|e| {
            map_csv_error(e, &self.file_path)
        })?;

        let columns: Vec<String> = reader
            .headers()
            .map_err(|e| map_csv_error(e, &self.file_path))?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut frame = Frame::new(columns);
        for record in reader.records() {
            let record = record.map_err(|e| map_csv_error(e, &self.file_path))?;
            frame.push_row(record.iter().map(Cell::parse).collect());
        }

        tracing::debug!(
            "Read {} rows x {} columns from {}",
            frame.n_rows(),
            frame.n_cols(),
            self.file_path
        );
        Ok(frame)
    }
}

fn map_csv_error(e: csv::Error, path: &str) -> ComputeError {
    match e.kind() {
        csv::ErrorKind::Io(io) => ComputeError::Io(format!("{}: {}", path, io)),
        _ => ComputeError::Parse(format!("{}: {}", path, e)),
    }
}

pub struct CsvReadNodeFactory;

impl NodeFactory for CsvReadNodeFactory {
    fn node_type(&self) -> &str {
        "source.csv"
    }

    fn validate(
        &self,
        name: &str,
        kind: &NodeKind,
        _workflow: &Workflow,
    ) -> Result<(), EngineError> {
        match kind {
            NodeKind::Source { file_path } if file_path.trim().is_empty() => {
                Err(EngineError::InvalidConfig(format!(
                    "node '{}': file_path must not be empty",
                    name
                )))
            }
            NodeKind::Source { .. } => Ok(()),
            other => Err(EngineError::InvalidConfig(format!(
                "node '{}': expected source.csv config, got {}",
                name,
                other.type_id()
            ))),
        }
    }

    fn create(&self, kind: &NodeKind) -> Result<Box<dyn Compute>, EngineError> {
        match kind {
            NodeKind::Source { file_path } => Ok(Box::new(CsvReadNode::new(file_path.clone()))),
            other => Err(EngineError::InvalidConfig(format!(
                "expected source.csv config, got {}",
                other.type_id()
            ))),
        }
    }

    fn metadata(&self) -> NodeTypeInfo {
        NodeTypeInfo {
            description: "Read a delimited file into a tabular frame".to_string(),
            category: "source".to_string(),
        }
    }
}
