use thiserror::Error;

// Unified error type for elai

#[derive(Error, Debug)]
pub enum ElaiError {
    #[error("matrix market line {line}: {reason}")]
    MatrixMarket { line: usize, reason: String },
    #[error("unsupported matrix market style: {0}")]
    UnsupportedFormat(String),
    #[error("size mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("unknown krylov method: {0}")]
    UnknownSolver(String),
    #[error("unknown preconditioner: {0}")]
    UnknownPreconditioner(String),
    #[error("communication error: {0}")]
    Comm(String),
    #[error("marshalling error: {0}")]
    Marshal(String),
    #[error("invalid ordering: {0}")]
    Ordering(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ElaiError>;
