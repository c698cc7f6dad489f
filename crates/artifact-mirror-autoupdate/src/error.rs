//! Error types for autoupdate runs.

use std::path::PathBuf;

use artifact_mirror_core::ValidationErrors;
use artifact_mirror_registry::RegistryError;
use thiserror::Error;

/// Result type for autoupdate operations.
pub type Result<T> = std::result::Result<T, AutoUpdateError>;

/// Errors that can occur while discovering or proposing updates.
#[derive(Debug, Error)]
pub enum AutoUpdateError {
    /// An entry or strategy failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// Building or writing the config model failed.
    #[error(transparent)]
    Config(#[from] artifact_mirror_core::Error),

    /// Tag discovery or version handling failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A GitHub API call failed.
    #[error("GitHub {operation} failed: {source}")]
    Github {
        /// What was being attempted.
        operation: String,
        /// Underlying error.
        #[source]
        source: RegistryError,
    },

    /// A discovered repository has no configured artifact reference.
    #[error("found image {repository} but it is not present in Artifacts")]
    UnmappedArtifact {
        /// The discovered repository.
        repository: String,
    },

    /// An image reference found by a strategy could not be parsed.
    #[error("invalid image reference {image:?}: {reason}")]
    InvalidImage {
        /// The reference as found.
        image: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An external command could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// The executable.
        program: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An external command exited unsuccessfully.
    #[error("`{command}` failed: {stderr}")]
    CommandFailed {
        /// The command line.
        command: String,
        /// Captured standard error.
        stderr: String,
    },

    /// A YAML document could not be parsed or rendered.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A file could not be read or written.
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl AutoUpdateError {
    /// Creates a GitHub error for `operation`.
    pub fn github(operation: impl Into<String>, source: RegistryError) -> Self {
        Self::Github {
            operation: operation.into(),
            source,
        }
    }

    /// Creates an IO error for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unmapped_message_names_repository() {
        let err = AutoUpdateError::UnmappedArtifact {
            repository: "rancher/fleet".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "found image rancher/fleet but it is not present in Artifacts"
        );
    }

    #[test]
    fn test_github_error_keeps_operation() {
        let err = AutoUpdateError::github(
            "list releases",
            RegistryError::HttpError {
                url: "https://api.github.com/repos/o/r/releases".to_string(),
                status: 404,
                body: "Not Found".to_string(),
            },
        );
        let message = err.to_string();
        assert!(message.starts_with("GitHub list releases failed"));
        assert!(message.contains("Not Found"));
    }
}
