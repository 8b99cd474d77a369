//! Error taxonomy shared by every component of the pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// A required file or directory does not exist.
    #[error("input not found: {0}")]
    InputNotFound(String),

    /// A table is missing expected columns or has an unusable shape.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// A raw subject token could not be mapped to a canonical id.
    #[error("could not resolve subject identity from '{0}'")]
    IdentityResolutionFailed(String),

    /// Missing or invalid configuration. Aborts the run.
    #[error("invalid configuration: {0}")]
    ConfigurationInvalid(String),

    /// Hard failure reported by a stage or its backend.
    #[error("stage failed: {0}")]
    StageFailed(String),

    /// A required external tool is missing. Aborts the run.
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InputNotFound,
    MalformedInput,
    IdentityResolutionFailed,
    ConfigurationInvalid,
    StageFailed,
    DependencyUnavailable,
    Io,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputNotFound(_) => ErrorKind::InputNotFound,
            Self::MalformedInput(_) => ErrorKind::MalformedInput,
            Self::IdentityResolutionFailed(_) => ErrorKind::IdentityResolutionFailed,
            Self::ConfigurationInvalid(_) => ErrorKind::ConfigurationInvalid,
            Self::StageFailed(_) => ErrorKind::StageFailed,
            Self::DependencyUnavailable(_) => ErrorKind::DependencyUnavailable,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}
