use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by suite storage.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("suite not found: {0}")]
    SuiteNotFound(String),

    #[error("test case not found: {0}")]
    TestCaseNotFound(String),

    #[error("suite '{suite_id}' changed concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        suite_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unsupported workspace format '{0}' (expected: yaml, yml, json)")]
    UnsupportedFormat(String),
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
