//! Error types for artifact mirror core operations.
//!
//! This module defines the error types used throughout the `artifact-mirror-core` crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::validation::ValidationErrors;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in artifact mirror core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A source artifact reference could not be turned into an artifact.
    #[error("invalid source artifact {source_artifact:?}: {reason}")]
    InvalidSourceArtifact {
        /// The offending reference.
        source_artifact: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A file could not be read or written.
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A YAML document could not be parsed or rendered.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The document parsed but violates a configuration invariant.
    #[error("{0}")]
    Validation(#[from] ValidationErrors),
}

impl Error {
    /// Creates an [`Error::Io`] for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
