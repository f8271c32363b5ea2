//! Error taxonomy for a merge run.
//!
//! Every stage returns `Result<_, MergeError>`. The job runner logs the error,
//! rolls back uncommitted work, releases the connection and hands the error
//! back to whoever triggered the run.

use std::fmt;

/// Boxed error used where the underlying failure is not always a SQLite error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Step of the load stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    EnsureSchema,
    Reset,
    /// Inserting rows of a batch (0-based batch index)
    Insert { batch: usize },
    /// Committing a batch (0-based batch index)
    Commit { batch: usize },
}

impl fmt::Display for LoadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStage::EnsureSchema => write!(f, "create table"),
            LoadStage::Reset => write!(f, "truncate"),
            LoadStage::Insert { batch } => write!(f, "insert batch {}", batch + 1),
            LoadStage::Commit { batch } => write!(f, "commit batch {}", batch + 1),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("cannot connect to '{target}': {source}")]
    Connection {
        target: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to read table '{table}': {source}")]
    Extraction {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("table '{table}' has no join column '{column}'")]
    MissingJoinColumn { table: String, column: &'static str },

    #[error("row {row}, column '{column}': cannot cast {value} to {expected}: {reason}")]
    Coercion {
        row: usize,
        column: &'static str,
        value: String,
        expected: &'static str,
        reason: String,
    },

    #[error("failed to {stage} on '{table}': {source}")]
    Load {
        table: String,
        stage: LoadStage,
        #[source]
        source: rusqlite::Error,
    },

    #[error("run failed: {0:#}")]
    Run(anyhow::Error),
}

impl MergeError {
    /// Short label of the error class, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            MergeError::Connection { .. } => "ConnectionError",
            MergeError::Extraction { .. } => "ExtractionError",
            MergeError::MissingJoinColumn { .. } | MergeError::Coercion { .. } => "TransformError",
            MergeError::Load { .. } => "LoadError",
            MergeError::Run(_) => "RunError",
        }
    }
}

impl From<anyhow::Error> for MergeError {
    fn from(err: anyhow::Error) -> Self {
        MergeError::Run(err)
    }
}
