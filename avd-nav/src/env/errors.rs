use thiserror::Error;

use crate::dataset::DatasetError;

#[derive(Error, Debug)]
pub enum EnvError {
    /// Invalid setup, or a call the current lifecycle state does not allow.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    /// No target reference images to composite.
    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("shape mismatch for {field}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        field: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("dataset error: {0}")]
    Dataset(#[from] DatasetError),
}

impl EnvError {
    pub fn not_found(what: &'static str, key: impl Into<String>) -> Self {
        EnvError::NotFound {
            what,
            key: key.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        EnvError::Configuration(msg.into())
    }
}
