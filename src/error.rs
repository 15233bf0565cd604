use std::path::PathBuf;

use thiserror::Error;

/// Failures of a reading source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("reading source exhausted")]
    Exhausted,

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed reading at line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures loading, training or running a classifier
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to access model artifact {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model artifact {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize model: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("invalid model: {0}")]
    Invalid(String),

    #[error("training failed: {0}")]
    Training(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),
}

/// Reasons a tick was aborted. The previously published snapshot stays current.
#[derive(Debug, Error)]
pub enum TickError {
    #[error("reading source failed: {0}")]
    Source(#[from] SourceError),

    #[error("inference failed: {0}")]
    Inference(#[from] ModelError),
}
