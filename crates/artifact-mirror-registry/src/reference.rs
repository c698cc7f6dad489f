//! Splitting bare image references into registry coordinates.

use std::fmt;

use crate::error::RegistryError;

/// Host used for references without an explicit registry.
pub const DOCKER_HUB_HOST: &str = "docker.io";

/// Namespace Docker Hub serves official images from.
pub const DOCKER_HUB_LIBRARY: &str = "library";

/// Returns true if `host` names Docker Hub.
#[must_use]
pub fn is_docker_hub_host(host: &str) -> bool {
    matches!(host, "docker.io" | "index.docker.io" | "registry.hub.docker.com")
}

/// Where a repository lives: registry host, namespace and repository path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageLocation {
    /// Registry host, `docker.io` for implicit Docker Hub references.
    pub host: String,
    /// Namespace, possibly empty.
    pub namespace: String,
    /// Repository path, possibly containing `/`.
    pub repository: String,
}

impl ImageLocation {
    /// Parses a reference without a tag.
    ///
    /// - `org/app` is a Docker Hub repository.
    /// - `host.tld/app` has a host and no namespace.
    /// - `host.tld/org/a/b` has host `host.tld`, namespace `org` and
    ///   repository `a/b`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidReference`] for references with fewer
    /// than two segments, empty segments, or three or more segments without
    /// a host.
    ///
    /// # Examples
    ///
    /// ```
    /// use artifact_mirror_registry::ImageLocation;
    ///
    /// let location = ImageLocation::parse("gcr.io/cloud-provider-vsphere/csi/release/syncer")?;
    /// assert_eq!(location.host, "gcr.io");
    /// assert_eq!(location.namespace, "cloud-provider-vsphere");
    /// assert_eq!(location.repository, "csi/release/syncer");
    /// # Ok::<(), artifact_mirror_registry::RegistryError>(())
    /// ```
    pub fn parse(reference: &str) -> Result<Self, RegistryError> {
        let invalid = || RegistryError::InvalidReference {
            reference: reference.to_string(),
        };

        let segments: Vec<&str> = reference.split('/').collect();
        if segments.len() < 2 || segments.iter().any(|s| s.is_empty()) {
            return Err(invalid());
        }

        let first_is_host = segments[0].contains('.');
        match (segments.len(), first_is_host) {
            (2, false) => Ok(Self {
                host: DOCKER_HUB_HOST.to_string(),
                namespace: segments[0].to_string(),
                repository: segments[1].to_string(),
            }),
            (2, true) if is_docker_hub_host(segments[0]) => Ok(Self {
                host: segments[0].to_string(),
                namespace: DOCKER_HUB_LIBRARY.to_string(),
                repository: segments[1].to_string(),
            }),
            (2, true) => Ok(Self {
                host: segments[0].to_string(),
                namespace: String::new(),
                repository: segments[1].to_string(),
            }),
            (_, true) => Ok(Self {
                host: segments[0].to_string(),
                namespace: segments[1].to_string(),
                repository: segments[2..].join("/"),
            }),
            (_, false) => Err(invalid()),
        }
    }

    /// Returns `namespace/repository`, or just the repository when the
    /// namespace is empty.
    #[must_use]
    pub fn path(&self) -> String {
        if self.namespace.is_empty() {
            self.repository.clone()
        } else {
            format!("{}/{}", self.namespace, self.repository)
        }
    }
}

impl fmt::Display for ImageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.host, self.path())
    }
}
