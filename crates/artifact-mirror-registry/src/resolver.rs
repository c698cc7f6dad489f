//! Picks the tag-listing client for a reference.
//!
//! Routes are `(predicate, factory)` pairs checked in order; the first
//! predicate that accepts the reference's host builds the client. Adding a
//! registry flavor means adding a route.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::client::{DockerHubClient, GhcrClient, QuayClient, SuseClient, TagLister, V2Client};
use crate::config::Credentials;
use crate::error::RegistryError;
use crate::reference::{is_docker_hub_host, ImageLocation};
use crate::retry::RetryingClient;

type Predicate = Box<dyn Fn(&str) -> bool + Send + Sync>;
type Factory = Box<dyn Fn(&RetryingClient, &Credentials, &str) -> Box<dyn TagLister> + Send + Sync>;

struct Route {
    name: &'static str,
    accepts: Predicate,
    build: Factory,
}

/// Lists the tags of a bare image reference.
#[async_trait]
pub trait TagSource: Send + Sync {
    /// Returns every tag of `reference`, e.g. `quay.io/org/app`.
    ///
    /// # Errors
    ///
    /// Returns an error if the reference is malformed, its registry is
    /// unknown, or listing fails.
    async fn list_tags(&self, reference: &str) -> Result<Vec<String>, RegistryError>;
}

/// Route table from registry host to client.
pub struct RegistryResolver {
    http: RetryingClient,
    credentials: Credentials,
    routes: Vec<Route>,
}

impl std::fmt::Debug for RegistryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryResolver")
            .field("routes", &self.route_names())
            .finish_non_exhaustive()
    }
}

impl RegistryResolver {
    /// Creates a resolver with the built-in routes:
    /// Docker Hub, quay.io, registry.suse.com, ghcr.io, gcr.io and its
    /// regional hosts, and registry.k8s.io.
    #[must_use]
    pub fn new(http: RetryingClient, credentials: Credentials) -> Self {
        let resolver = Self {
            http,
            credentials,
            routes: Vec::new(),
        };
        resolver
            .with_route(
                "dockerhub",
                is_docker_hub_host,
                |http, _, _| Box::new(DockerHubClient::new(http.clone())),
            )
            .with_route(
                "quay",
                |host| host == "quay.io",
                |http, _, _| Box::new(QuayClient::new(http.clone())),
            )
            .with_route(
                "suse",
                |host| host == "registry.suse.com",
                |http, _, _| Box::new(SuseClient::new(http.clone())),
            )
            .with_route(
                "ghcr",
                |host| host == "ghcr.io",
                |http, credentials, _| {
                    Box::new(GhcrClient::new(http.clone(), credentials.github_token()))
                },
            )
            .with_route(
                "gcr",
                |host| host == "gcr.io" || host.ends_with(".gcr.io"),
                |http, _, host| Box::new(V2Client::new(http.clone(), host)),
            )
            .with_route(
                "k8s",
                |host| host == "registry.k8s.io",
                |http, _, host| Box::new(V2Client::new(http.clone(), host)),
            )
    }

    /// Appends a route, checked after every existing one.
    #[must_use]
    pub fn with_route(
        mut self,
        name: &'static str,
        accepts: impl Fn(&str) -> bool + Send + Sync + 'static,
        build: impl Fn(&RetryingClient, &Credentials, &str) -> Box<dyn TagLister>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.routes.push(Route {
            name,
            accepts: Box::new(accepts),
            build: Box::new(build),
        });
        self
    }

    /// Returns the route names in priority order.
    #[must_use]
    pub fn route_names(&self) -> Vec<&'static str> {
        self.routes.iter().map(|r| r.name).collect()
    }

    /// Builds the client for `location`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnrecognizedRegistry`] if no route accepts
    /// the host.
    pub fn resolve(&self, location: &ImageLocation) -> Result<Box<dyn TagLister>, RegistryError> {
        let route = self
            .routes
            .iter()
            .find(|route| (route.accepts)(&location.host))
            .ok_or_else(|| RegistryError::UnrecognizedRegistry {
                host: location.host.clone(),
            })?;
        debug!(route = route.name, location = %location, "resolved registry client");
        Ok((route.build)(&self.http, &self.credentials, &location.host))
    }

    /// Returns a Docker Hub client sharing this resolver's HTTP client.
    #[must_use]
    pub fn docker_hub(&self) -> DockerHubClient {
        DockerHubClient::new(self.http.clone())
    }
}

#[async_trait]
impl TagSource for RegistryResolver {
    async fn list_tags(&self, reference: &str) -> Result<Vec<String>, RegistryError> {
        let location = ImageLocation::parse(reference)?;
        let tags = self.resolve(&location)?.list_tags(&location).await?;
        debug!(reference, count = tags.len(), "listed tags");
        Ok(tags)
    }
}

/// Shared handle to a tag source.
pub type SharedTagSource = Arc<dyn TagSource>;
