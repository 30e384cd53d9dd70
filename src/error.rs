use thiserror::Error;

/// Errors raised by the scoring pipeline and its collaborators.
///
/// Ineligible contests and degenerate normalization channels are not errors:
/// the aggregator reports the former as `None`, the normalizer reports the
/// latter alongside the normalized vector.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Data source failure: {0}")]
    DataSource(String),

    #[error("Persistence failure for contest {contest_id}: {message}")]
    Persistence { contest_id: i64, message: String },

    #[error("Feature schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    #[error("Invalid model artifact: {0}")]
    InvalidModel(String),

    #[error("Invalid normalization keys: {0}")]
    InvalidKeys(String),

    #[error("Dimension mismatch: expected {expected} channels, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("Model produced a non-finite output: {0}")]
    NonFiniteOutput(f64),

    #[error("Cannot fit normalization keys over an empty corpus")]
    EmptyCorpus,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for PipelineError {
    fn from(err: rusqlite::Error) -> Self {
        PipelineError::DataSource(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
