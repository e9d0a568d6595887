use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{what} not found: {key}")]
    NotFound { what: &'static str, key: String },

    #[error("unknown instance name: {0}")]
    UnknownInstance(String),

    #[error("malformed dataset entry: {0}")]
    Malformed(String),
}

impl DatasetError {
    pub fn not_found(what: &'static str, key: impl Into<String>) -> Self {
        DatasetError::NotFound {
            what,
            key: key.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            return DatasetError::not_found("file", path.display().to_string());
        }
        DatasetError::Io { path, source }
    }
}
