//! Error types for save-state persistence.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("file system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported save version: {0}")]
    VersionUnsupported(u32),

    #[error("resource not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, IoError>;

impl IoError {
    #[must_use]
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Self::Serialization(msg.into())
    }

    #[must_use]
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    #[must_use]
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound(resource.into())
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
