//! Configuration types for the HTTP layer.

use std::fmt;
use std::time::Duration;

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Per-request timeout.
    pub timeout: Duration,

    /// User agent string.
    pub user_agent: String,
}

impl HttpConfig {
    /// Creates a configuration with a 30 second timeout.
    ///
    /// # Examples
    ///
    /// ```
    /// use artifact_mirror_registry::HttpConfig;
    ///
    /// let config = HttpConfig::new();
    /// assert!(config.user_agent.starts_with("artifact-mirror/"));
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("artifact-mirror/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Secrets used for authenticated registry and GitHub calls.
///
/// Passed explicitly to every component that needs them; nothing in the
/// library reads the environment.
#[derive(Clone, Default)]
pub struct Credentials {
    github_token: Option<String>,
}

impl Credentials {
    /// Creates empty credentials.
    #[must_use]
    pub const fn new() -> Self {
        Self { github_token: None }
    }

    /// Sets the GitHub token. An empty token counts as unset.
    #[must_use]
    pub fn with_github_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.github_token = if token.is_empty() { None } else { Some(token) };
        self
    }

    /// Returns the GitHub token, if any.
    #[must_use]
    pub fn github_token(&self) -> Option<&str> {
        self.github_token.as_deref()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("github_token", &self.github_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_config_builders() {
        let config = HttpConfig::new()
            .with_timeout(Duration::from_secs(5))
            .with_user_agent("test-agent");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "test-agent");
    }

    #[test]
    fn test_credentials_empty_token_is_unset() {
        assert_eq!(Credentials::new().with_github_token("").github_token(), None);
        assert_eq!(
            Credentials::new().with_github_token("ghp_x").github_token(),
            Some("ghp_x")
        );
    }

    #[test]
    fn test_credentials_debug_redacts_token() {
        let debug = format!("{:?}", Credentials::new().with_github_token("secret"));
        assert!(!debug.contains("secret"));
        assert!(debug.contains("redacted"));
    }
}
