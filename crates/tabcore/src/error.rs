use thiserror::Error;

/// Failure of a single node's compute step.
///
/// These are recovered locally by the executor: the failing node and its
/// downstream dependents are marked failed, sibling branches keep running.
#[derive(Error, Debug, Clone)]
pub enum ComputeError {
    #[error("io error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("join conflict: {0}")]
    JoinConflict(String),
}

impl ComputeError {
    pub fn kind(&self) -> &'static str {
        match self {
            ComputeError::Io(_) => "IOError",
            ComputeError::Parse(_) => "ParseError",
            ComputeError::Schema(_) => "SchemaError",
            ComputeError::JoinConflict(_) => "JoinConflict",
        }
    }
}

/// Engine-level errors surfaced to API callers as structured
/// `{kind, message}` payloads.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    Conflict(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("dependency cycle detected")]
    CyclicGraph,

    #[error("workflow already running: {0}")]
    AlreadyRunning(String),

    #[error(transparent)]
    Compute(#[from] ComputeError),
}

impl EngineError {
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::NotFound(_) => "NotFound",
            EngineError::Conflict(_) => "Conflict",
            EngineError::InvalidConfig(_) => "InvalidConfig",
            EngineError::CyclicGraph => "CyclicGraph",
            EngineError::AlreadyRunning(_) => "AlreadyRunning",
            EngineError::Compute(e) => e.kind(),
        }
    }
}
