//! Error types for registry operations.

use thiserror::Error;

/// Errors that can occur while discovering tags.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The server could not be reached. Never retried.
    #[error("Failed to connect to {url}: {message}")]
    ConnectionFailed {
        /// Request URL.
        url: String,
        /// Underlying transport error.
        message: String,
    },

    /// The server answered with a status that is not retried.
    #[error("Request to {url} failed with status {status} and body {body}")]
    HttpError {
        /// Request URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, kept for diagnosis.
        body: String,
    },

    /// Every attempt returned a retryable status.
    #[error("Request to {url} failed after {attempts} attempts (last status {status})")]
    RetriesExhausted {
        /// Request URL.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// Status of the final attempt.
        status: u16,
    },

    /// No client is registered for the reference's host.
    #[error("Unrecognized registry: {host}")]
    UnrecognizedRegistry {
        /// Registry host.
        host: String,
    },

    /// The image reference could not be split into host and repository.
    #[error("Invalid reference format: {reference}")]
    InvalidReference {
        /// Reference string.
        reference: String,
    },

    /// A version string or constraint could not be parsed.
    #[error("Invalid version {version:?}: {message}")]
    InvalidVersion {
        /// The offending version or constraint.
        version: String,
        /// Parser message.
        message: String,
    },

    /// A version filter expression did not compile.
    #[error("Invalid version filter {pattern:?}: {source}")]
    InvalidFilter {
        /// The expression.
        pattern: String,
        /// Underlying error.
        #[source]
        source: regex::Error,
    },

    /// The registry returned no tags, or none survived filtering.
    #[error("No tags found for {repository}{}", filter_suffix(.filter.as_deref()))]
    NoTagsFound {
        /// Repository queried.
        repository: String,
        /// Filter applied, if any.
        filter: Option<String>,
    },

    /// A response body was not the expected JSON.
    #[error("JSON error: {source}")]
    JsonError {
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {message}")]
    ClientBuild {
        /// Error message.
        message: String,
    },
}

fn filter_suffix(filter: Option<&str>) -> String {
    filter.map_or_else(String::new, |f| format!(" matching version filter {f:?}"))
}

impl RegistryError {
    /// Returns true if the failure came from a server that kept
    /// misbehaving, as opposed to one that refused the request.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }

    /// Returns true if the failure is permanent: a refused request or an
    /// unknown registry.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::HttpError { .. } | Self::UnrecognizedRegistry { .. } | Self::InvalidReference { .. }
        )
    }
}

impl From<reqwest::Error> for RegistryError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map_or_else(|| "unknown".to_string(), ToString::to_string);
        if err.is_builder() {
            Self::ClientBuild {
                message: err.to_string(),
            }
        } else {
            Self::ConnectionFailed {
                url,
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError { source: err }
    }
}
