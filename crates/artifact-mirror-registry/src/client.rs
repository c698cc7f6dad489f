//! Tag-listing clients, one per registry API flavor.
//!
//! Every client implements [`TagLister`] and pages through its API until
//! the registry signals there is nothing left.

use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::RegistryError;
use crate::reference::ImageLocation;
use crate::retry::RetryingClient;
use crate::transport::HttpRequest;

/// Page size requested from paginated APIs.
pub const PAGE_SIZE: u32 = 100;

/// Lists every tag of a repository.
#[async_trait]
pub trait TagLister: Send + Sync {
    /// Returns all tags of the repository at `location`, across all pages.
    ///
    /// # Errors
    ///
    /// Returns an error if any page cannot be fetched or parsed.
    async fn list_tags(&self, location: &ImageLocation) -> Result<Vec<String>, RegistryError>;
}

fn build_url(base: &str, params: &[(&str, String)]) -> Result<String, RegistryError> {
    Url::parse_with_params(base, params)
        .map(String::from)
        .map_err(|_| RegistryError::InvalidReference {
            reference: base.to_string(),
        })
}

#[derive(Debug, Deserialize)]
struct NamedEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DockerHubPage {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    results: Vec<NamedEntry>,
}

#[derive(Debug, Deserialize)]
struct QuayPage {
    #[serde(default)]
    has_additional: bool,
    #[serde(default)]
    tags: Vec<NamedEntry>,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Docker Hub: `page`/`page_size` pagination, continued while `next` is set.
#[derive(Debug, Clone)]
pub struct DockerHubClient {
    http: RetryingClient,
    registry_url: String,
    hub_url: String,
}

impl DockerHubClient {
    /// Creates a client against the public Docker Hub.
    #[must_use]
    pub fn new(http: RetryingClient) -> Self {
        Self {
            http,
            registry_url: "https://registry.hub.docker.com".to_string(),
            hub_url: "https://hub.docker.com".to_string(),
        }
    }

    /// Lists every repository name in `namespace`, following `next` links.
    ///
    /// # Errors
    ///
    /// Returns an error if any page cannot be fetched or parsed.
    pub async fn list_repositories(&self, namespace: &str) -> Result<Vec<String>, RegistryError> {
        let mut next = Some(build_url(
            &format!("{}/v2/namespaces/{namespace}/repositories", self.hub_url),
            &[("page_size", PAGE_SIZE.to_string())],
        )?);
        let mut names = Vec::new();
        while let Some(url) = next.take() {
            let page: DockerHubPage = self.http.get_json(&HttpRequest::get(url)).await?;
            names.extend(page.results.into_iter().map(|r| r.name));
            next = page.next.filter(|n| !n.is_empty());
        }
        debug!(namespace, count = names.len(), "listed Docker Hub repositories");
        Ok(names)
    }
}

#[async_trait]
impl TagLister for DockerHubClient {
    async fn list_tags(&self, location: &ImageLocation) -> Result<Vec<String>, RegistryError> {
        let base = format!(
            "{}/v2/namespaces/{}/repositories/{}/tags",
            self.registry_url, location.namespace, location.repository
        );
        let mut tags = Vec::new();
        let mut page_number = 1u32;
        loop {
            let url = build_url(
                &base,
                &[
                    ("page", page_number.to_string()),
                    ("page_size", PAGE_SIZE.to_string()),
                ],
            )?;
            let page: DockerHubPage = self.http.get_json(&HttpRequest::get(url)).await?;
            tags.extend(page.results.into_iter().map(|r| r.name));
            if page.next.as_deref().unwrap_or_default().is_empty() {
                break;
            }
            page_number += 1;
        }
        Ok(tags)
    }
}

/// Quay: `page`/`page_size` pagination, continued while `has_additional`.
#[derive(Debug, Clone)]
pub struct QuayClient {
    http: RetryingClient,
    base_url: String,
}

impl QuayClient {
    /// Creates a client against quay.io.
    #[must_use]
    pub fn new(http: RetryingClient) -> Self {
        Self {
            http,
            base_url: "https://quay.io".to_string(),
        }
    }
}

#[async_trait]
impl TagLister for QuayClient {
    async fn list_tags(&self, location: &ImageLocation) -> Result<Vec<String>, RegistryError> {
        let base = format!(
            "{}/api/v1/repository/{}/{}/tag/",
            self.base_url, location.namespace, location.repository
        );
        let mut tags = Vec::new();
        let mut page_number = 1u32;
        loop {
            let url = build_url(
                &base,
                &[
                    ("page", page_number.to_string()),
                    ("page_size", PAGE_SIZE.to_string()),
                ],
            )?;
            let page: QuayPage = self.http.get_json(&HttpRequest::get(url)).await?;
            tags.extend(page.tags.into_iter().map(|t| t.name));
            if !page.has_additional {
                break;
            }
            page_number += 1;
        }
        Ok(tags)
    }
}

/// Plain registry v2 API: one unpaginated `tags/list` call.
#[derive(Debug, Clone)]
pub struct V2Client {
    http: RetryingClient,
    base_url: String,
}

impl V2Client {
    /// Creates a client for `https://<host>`.
    #[must_use]
    pub fn new(http: RetryingClient, host: &str) -> Self {
        Self {
            http,
            base_url: format!("https://{host}"),
        }
    }
}

#[async_trait]
impl TagLister for V2Client {
    async fn list_tags(&self, location: &ImageLocation) -> Result<Vec<String>, RegistryError> {
        let url = format!("{}/v2/{}/tags/list", self.base_url, location.path());
        let list: TagList = self.http.get_json(&HttpRequest::get(url)).await?;
        Ok(list.tags.unwrap_or_default())
    }
}

/// SUSE registry: exchanges an anonymous pull token before `tags/list`.
#[derive(Debug, Clone)]
pub struct SuseClient {
    http: RetryingClient,
    base_url: String,
}

impl SuseClient {
    /// Service name the SUSE token endpoint expects.
    pub const SERVICE: &'static str = "SUSE Linux Docker Registry";

    /// Creates a client against registry.suse.com.
    #[must_use]
    pub fn new(http: RetryingClient) -> Self {
        Self {
            http,
            base_url: "https://registry.suse.com".to_string(),
        }
    }

    async fn token(&self, location: &ImageLocation) -> Result<String, RegistryError> {
        let url = build_url(
            &format!("{}/auth", self.base_url),
            &[
                ("service", Self::SERVICE.to_string()),
                ("scope", format!("repository:{}:pull", location.path())),
            ],
        )?;
        let token: TokenResponse = self.http.get_json(&HttpRequest::get(url)).await?;
        Ok(token.access_token)
    }
}

#[async_trait]
impl TagLister for SuseClient {
    async fn list_tags(&self, location: &ImageLocation) -> Result<Vec<String>, RegistryError> {
        let token = self.token(location).await?;
        let url = format!("{}/v2/{}/tags/list", self.base_url, location.path());
        let list: TagList = self
            .http
            .get_json(&HttpRequest::get(url).with_bearer(&token))
            .await?;
        Ok(list.tags.unwrap_or_default())
    }
}

/// GitHub container registry: bearer auth, `Link: rel="next"` pagination.
#[derive(Debug, Clone)]
pub struct GhcrClient {
    http: RetryingClient,
    base_url: String,
    token: String,
}

impl GhcrClient {
    /// Creates a client authenticating with `github_token`.
    #[must_use]
    pub fn new(http: RetryingClient, github_token: Option<&str>) -> Self {
        let token = base64::engine::general_purpose::STANDARD.encode(github_token.unwrap_or_default());
        Self {
            http,
            base_url: "https://ghcr.io".to_string(),
            token,
        }
    }
}

#[async_trait]
impl TagLister for GhcrClient {
    async fn list_tags(&self, location: &ImageLocation) -> Result<Vec<String>, RegistryError> {
        let mut next = Some(format!("{}/v2/{}/tags/list", self.base_url, location.path()));
        let mut tags = Vec::new();
        while let Some(url) = next.take() {
            let response = self
                .http
                .send(&HttpRequest::get(url).with_bearer(&self.token))
                .await?;
            let list: TagList = response.json()?;
            tags.extend(list.tags.unwrap_or_default());
            next = response
                .header("Link")
                .and_then(next_link)
                .map(|link| {
                    if link.starts_with("http://") || link.starts_with("https://") {
                        link
                    } else {
                        format!("{}{link}", self.base_url)
                    }
                });
        }
        Ok(tags)
    }
}

/// Extracts the `rel="next"` target from an RFC 5988 `Link` header.
///
/// # Examples
///
/// ```
/// use artifact_mirror_registry::client::next_link;
///
/// let header = r#"</v2/epinio/epinio-server/tags/list?last=v1.10.0&n=200>; rel="next""#;
/// assert_eq!(
///     next_link(header).as_deref(),
///     Some("/v2/epinio/epinio-server/tags/list?last=v1.10.0&n=200"),
/// );
/// ```
#[must_use]
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let is_next = pieces.any(|param| {
            let param = param.trim();
            param == r#"rel="next""# || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .filter(|t| !t.is_empty())
            .map(ToString::to_string)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::mock::MockTransport;
    use crate::retry::RetryPolicy;
    use crate::transport::HttpResponse;

    fn http(transport: &Arc<MockTransport>) -> RetryingClient {
        RetryingClient::new(transport.clone())
            .with_policy(RetryPolicy::new().with_base_delay(Duration::ZERO))
    }

    fn location(reference: &str) -> ImageLocation {
        ImageLocation::parse(reference).unwrap()
    }

    #[tokio::test]
    async fn test_docker_hub_paginates_until_next_is_empty() {
        let transport = Arc::new(
            MockTransport::new()
                .with_json(200, r#"{"next":"https://x/?page=2","results":[{"name":"v1"},{"name":"v2"}]}"#)
                .with_json(200, r#"{"next":null,"results":[{"name":"v3"}]}"#),
        );
        let tags = DockerHubClient::new(http(&transport))
            .list_tags(&location("flannel/flannel"))
            .await
            .unwrap();

        assert_eq!(tags, vec!["v1", "v2", "v3"]);
        assert_eq!(
            transport.urls(),
            vec![
                "https://registry.hub.docker.com/v2/namespaces/flannel/repositories/flannel/tags?page=1&page_size=100",
                "https://registry.hub.docker.com/v2/namespaces/flannel/repositories/flannel/tags?page=2&page_size=100",
            ]
        );
    }

    #[tokio::test]
    async fn test_docker_hub_list_repositories_follows_next() {
        let transport = Arc::new(
            MockTransport::new()
                .with_json(200, r#"{"next":"https://hub.docker.com/v2/namespaces/rancher/repositories?page=2&page_size=100","results":[{"name":"a"}]}"#)
                .with_json(200, r#"{"next":"","results":[{"name":"b"}]}"#),
        );
        let names = DockerHubClient::new(http(&transport))
            .list_repositories("rancher")
            .await
            .unwrap();

        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(
            transport.urls()[1],
            "https://hub.docker.com/v2/namespaces/rancher/repositories?page=2&page_size=100"
        );
    }

    #[tokio::test]
    async fn test_quay_paginates_until_has_additional_is_false() {
        let transport = Arc::new(
            MockTransport::new()
                .with_json(200, r#"{"has_additional":true,"tags":[{"name":"v1"}]}"#)
                .with_json(200, r#"{"has_additional":false,"tags":[{"name":"v2"}]}"#),
        );
        let tags = QuayClient::new(http(&transport))
            .list_tags(&location("quay.io/skopeo/stable"))
            .await
            .unwrap();

        assert_eq!(tags, vec!["v1", "v2"]);
        assert_eq!(
            transport.urls()[1],
            "https://quay.io/api/v1/repository/skopeo/stable/tag/?page=2&page_size=100"
        );
    }

    #[tokio::test]
    async fn test_v2_client_with_and_without_namespace() {
        let transport = Arc::new(
            MockTransport::new()
                .with_json(200, r#"{"name":"pause","tags":["3.9","3.10"]}"#)
                .with_json(200, r#"{"name":"x","tags":null}"#),
        );
        let client = V2Client::new(http(&transport), "registry.k8s.io");

        let tags = client.list_tags(&location("registry.k8s.io/pause")).await.unwrap();
        assert_eq!(tags, vec!["3.9", "3.10"]);

        let tags = client
            .list_tags(&location("registry.k8s.io/sig-storage/csi-attacher"))
            .await
            .unwrap();
        assert!(tags.is_empty());

        assert_eq!(
            transport.urls(),
            vec![
                "https://registry.k8s.io/v2/pause/tags/list",
                "https://registry.k8s.io/v2/sig-storage/csi-attacher/tags/list",
            ]
        );
    }

    #[tokio::test]
    async fn test_suse_exchanges_token_first() {
        let transport = Arc::new(
            MockTransport::new()
                .with_json(200, r#"{"access_token":"tok"}"#)
                .with_json(200, r#"{"tags":["15.5","15.6"]}"#),
        );
        let tags = SuseClient::new(http(&transport))
            .list_tags(&location("registry.suse.com/bci/bci-base"))
            .await
            .unwrap();

        assert_eq!(tags, vec!["15.5", "15.6"]);
        let requests = transport.requests();
        assert_eq!(
            requests[0].url,
            "https://registry.suse.com/auth?service=SUSE+Linux+Docker+Registry&scope=repository%3Abci%2Fbci-base%3Apull"
        );
        assert_eq!(requests[1].url, "https://registry.suse.com/v2/bci/bci-base/tags/list");
        assert_eq!(requests[1].header("Authorization"), Some("Bearer tok"));
    }

    #[tokio::test]
    async fn test_ghcr_follows_link_header() {
        let transport = Arc::new(
            MockTransport::new()
                .with_response(
                    HttpResponse::new(200, r#"{"tags":["v1"]}"#).with_header(
                        "Link",
                        r#"</v2/epinio/epinio-server/tags/list?last=v1&n=200>; rel="next""#,
                    ),
                )
                .with_json(200, r#"{"tags":["v2"]}"#),
        );
        let tags = GhcrClient::new(http(&transport), Some("secret"))
            .list_tags(&location("ghcr.io/epinio/epinio-server"))
            .await
            .unwrap();

        assert_eq!(tags, vec!["v1", "v2"]);
        let requests = transport.requests();
        assert_eq!(
            requests[1].url,
            "https://ghcr.io/v2/epinio/epinio-server/tags/list?last=v1&n=200"
        );
        assert_eq!(requests[0].header("Authorization"), Some("Bearer c2VjcmV0"));
    }

    #[tokio::test]
    async fn test_page_failure_is_propagated() {
        let transport = Arc::new(
            MockTransport::new()
                .with_json(200, r#"{"has_additional":true,"tags":[{"name":"v1"}]}"#)
                .with_json(401, "unauthorized"),
        );
        let err = QuayClient::new(http(&transport))
            .list_tags(&location("quay.io/org/app"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::HttpError { status: 401, .. }));
    }

    #[test]
    fn test_next_link() {
        assert_eq!(next_link(""), None);
        assert_eq!(next_link(r#"</a>; rel="prev""#), None);
        assert_eq!(
            next_link(r#"</a>; rel="prev", </b>; rel="next""#).as_deref(),
            Some("/b")
        );
    }
}
