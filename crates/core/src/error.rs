use std::path::PathBuf;
use thiserror::Error;

pub type AttributionResult<T> = Result<T, AttributionError>;

#[derive(Error, Debug)]
pub enum AttributionError {
    #[error("Load error ({}): {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("Schema error: column '{column}' not found in {}", path.display())]
    Schema { column: String, path: PathBuf },

    #[error("Division by zero: {0}")]
    DivideByZero(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AttributionError {
    pub fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn schema(column: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Schema {
            column: column.into(),
            path: path.into(),
        }
    }
}

impl From<::config::ConfigError> for AttributionError {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
