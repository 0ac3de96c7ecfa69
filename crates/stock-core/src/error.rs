use thiserror::Error;

/// Per-security failure conditions. All variants are recoverable at the
/// batch level: the caller logs the failure and continues with the next
/// security.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Missing input: {0}")]
    MissingInput(String),

    #[error("Insufficient history: need {required} bars, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not evaluable: {0}")]
    NotEvaluable(String),
}
