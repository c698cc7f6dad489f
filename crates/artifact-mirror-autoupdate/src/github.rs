//! GitHub REST collaborator.
//!
//! Strategies read releases and files through [`ReleaseSource`]; the
//! orchestrator opens pull requests through [`PullRequestService`]. Both are
//! implemented by [`GithubClient`] over the retrying HTTP client, so tests
//! can substitute either side.

use artifact_mirror_registry::client::next_link;
use artifact_mirror_registry::{HttpRequest, RegistryError, RetryingClient};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::error::{AutoUpdateError, Result};

/// Public GitHub API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

const RELEASES_PER_PAGE: &str = "100";

/// A GitHub release, reduced to the fields strategies use.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    /// Tag the release points at.
    #[serde(default)]
    pub tag_name: String,
    /// Whether the release is a draft.
    #[serde(default)]
    pub draft: bool,
    /// Whether the release is a prerelease.
    #[serde(default)]
    pub prerelease: bool,
}

impl Release {
    /// Creates a published, non-prerelease release.
    pub fn published(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            draft: false,
            prerelease: false,
        }
    }

    /// Returns true for drafts and prereleases.
    #[must_use]
    pub const fn is_unpublished(&self) -> bool {
        self.draft || self.prerelease
    }
}

/// An existing pull request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    /// Pull request number.
    pub number: u64,
    /// Browser URL.
    pub html_url: String,
}

/// Body of a create-pull-request call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPullRequest {
    /// Title.
    pub title: String,
    /// Head branch, without owner.
    pub head: String,
    /// Base branch.
    pub base: String,
    /// Markdown body.
    pub body: String,
    /// Whether maintainers may push to the head branch.
    pub maintainer_can_modify: bool,
}

/// Reviewers split into individual users and `org/team` teams.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reviewers {
    /// User logins.
    #[serde(rename = "reviewers")]
    pub users: Vec<String>,
    /// Team slugs, without the organization.
    #[serde(rename = "team_reviewers")]
    pub teams: Vec<String>,
}

impl Reviewers {
    /// Splits reviewer strings: `org/team` becomes team `team`, anything
    /// else is a user login.
    ///
    /// # Examples
    ///
    /// ```
    /// use artifact_mirror_autoupdate::github::Reviewers;
    ///
    /// let reviewers = Reviewers::from_entries(&["alice".into(), "rancher/mirror-team".into()]);
    /// assert_eq!(reviewers.users, ["alice"]);
    /// assert_eq!(reviewers.teams, ["mirror-team"]);
    /// ```
    #[must_use]
    pub fn from_entries(entries: &[String]) -> Self {
        let mut reviewers = Self::default();
        for entry in entries {
            match entry.split_once('/') {
                Some((_, team)) => reviewers.teams.push(team.to_string()),
                None => reviewers.users.push(entry.clone()),
            }
        }
        reviewers
    }

    /// Returns true if there is nobody to request.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.teams.is_empty()
    }
}

/// Read access to a repository's releases and files.
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Lists every release, following pagination.
    ///
    /// # Errors
    ///
    /// Returns an error if any page cannot be fetched.
    async fn list_releases(&self, owner: &str, repo: &str) -> Result<Vec<Release>>;

    /// Returns the release GitHub marks as latest.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository has no latest release.
    async fn latest_release(&self, owner: &str, repo: &str) -> Result<Release>;

    /// Returns the text of `path` at `git_ref`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist at that ref.
    async fn file_contents(&self, owner: &str, repo: &str, path: &str, git_ref: &str)
        -> Result<String>;
}

/// Pull request operations used by the orchestrator.
#[async_trait]
pub trait PullRequestService: Send + Sync {
    /// Lists pull requests in any state with the given head and base.
    ///
    /// `head` is `owner:branch`.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        head: &str,
        base: &str,
    ) -> Result<Vec<PullRequest>>;

    /// Opens a pull request.
    ///
    /// # Errors
    ///
    /// Returns an error if GitHub rejects the request.
    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pull_request: &NewPullRequest,
    ) -> Result<PullRequest>;

    /// Requests reviews on pull request `number`.
    ///
    /// # Errors
    ///
    /// Returns an error if GitHub rejects the request.
    async fn request_reviewers(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        reviewers: &Reviewers,
    ) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

/// GitHub REST client.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: RetryingClient,
    api_base: String,
    token: Option<String>,
}

impl GithubClient {
    /// Creates an unauthenticated client against the public API.
    #[must_use]
    pub fn new(http: RetryingClient) -> Self {
        Self {
            http,
            api_base: DEFAULT_API_BASE.to_string(),
            token: None,
        }
    }

    /// Authenticates every request with `token`.
    #[must_use]
    pub fn with_token(mut self, token: Option<&str>) -> Self {
        self.token = token.filter(|t| !t.is_empty()).map(ToString::to_string);
        self
    }

    /// Points the client at another API endpoint.
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<String> {
        let raw = format!("{}{path}", self.api_base);
        let parsed = if query.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, query)
        };
        parsed
            .map(|url| url.to_string())
            .map_err(|e| {
                AutoUpdateError::github(
                    "request",
                    RegistryError::InvalidReference {
                        reference: format!("{raw}: {e}"),
                    },
                )
            })
    }

    fn prepare(&self, request: HttpRequest) -> HttpRequest {
        let request = request
            .with_header("Accept", "application/vnd.github+json")
            .with_header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(token) => request.with_bearer(token),
            None => request,
        }
    }
}

#[async_trait]
impl ReleaseSource for GithubClient {
    async fn list_releases(&self, owner: &str, repo: &str) -> Result<Vec<Release>> {
        let mut next = Some(self.url(
            &format!("/repos/{owner}/{repo}/releases"),
            &[("per_page", RELEASES_PER_PAGE)],
        )?);
        let mut releases = Vec::new();
        while let Some(url) = next.take() {
            let response = self
                .http
                .send(&self.prepare(HttpRequest::get(url)))
                .await
                .map_err(|e| AutoUpdateError::github("list releases", e))?;
            let page: Vec<Release> = response
                .json()
                .map_err(|e| AutoUpdateError::github("list releases", e))?;
            releases.extend(page);
            next = response.header("Link").and_then(next_link);
        }
        debug!(owner, repo, count = releases.len(), "listed releases");
        Ok(releases)
    }

    async fn latest_release(&self, owner: &str, repo: &str) -> Result<Release> {
        let url = self.url(&format!("/repos/{owner}/{repo}/releases/latest"), &[])?;
        self.http
            .get_json(&self.prepare(HttpRequest::get(url)))
            .await
            .map_err(|e| AutoUpdateError::github("get latest release", e))
    }

    async fn file_contents(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        git_ref: &str,
    ) -> Result<String> {
        let operation = format!("get {path} at {git_ref}");
        let url = self.url(
            &format!("/repos/{owner}/{repo}/contents/{}", path.trim_start_matches('/')),
            &[("ref", git_ref)],
        )?;
        let contents: ContentsResponse = self
            .http
            .get_json(&self.prepare(HttpRequest::get(url)))
            .await
            .map_err(|e| AutoUpdateError::github(operation.clone(), e))?;
        decode_contents(&contents).ok_or_else(|| {
            AutoUpdateError::github(
                operation,
                RegistryError::InvalidReference {
                    reference: format!("{path}: undecodable {} content", contents.encoding),
                },
            )
        })
    }
}

fn decode_contents(contents: &ContentsResponse) -> Option<String> {
    match contents.encoding.as_str() {
        "base64" => {
            let compact: String = contents.content.split_whitespace().collect();
            let bytes = base64::engine::general_purpose::STANDARD.decode(compact).ok()?;
            String::from_utf8(bytes).ok()
        }
        "" | "utf-8" => Some(contents.content.clone()),
        _ => None,
    }
}

#[async_trait]
impl PullRequestService for GithubClient {
    async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        head: &str,
        base: &str,
    ) -> Result<Vec<PullRequest>> {
        let url = self.url(
            &format!("/repos/{owner}/{repo}/pulls"),
            &[("head", head), ("base", base), ("state", "all")],
        )?;
        self.http
            .get_json(&self.prepare(HttpRequest::get(url)))
            .await
            .map_err(|e| AutoUpdateError::github("list pull requests", e))
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        pull_request: &NewPullRequest,
    ) -> Result<PullRequest> {
        let url = self.url(&format!("/repos/{owner}/{repo}/pulls"), &[])?;
        let request = HttpRequest::post_json(url, pull_request)
            .map_err(|e| AutoUpdateError::github("create pull request", e))?;
        self.http
            .get_json(&self.prepare(request))
            .await
            .map_err(|e| AutoUpdateError::github("create pull request", e))
    }

    async fn request_reviewers(
        &self,
        owner: &str,
        repo: &str,
        number: u64,
        reviewers: &Reviewers,
    ) -> Result<()> {
        if reviewers.is_empty() {
            return Ok(());
        }
        let url = self.url(
            &format!("/repos/{owner}/{repo}/pulls/{number}/requested_reviewers"),
            &[],
        )?;
        let request = HttpRequest::post_json(url, reviewers)
            .map_err(|e| AutoUpdateError::github("request reviewers", e))?;
        self.http
            .send(&self.prepare(request))
            .await
            .map_err(|e| AutoUpdateError::github("request reviewers", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use artifact_mirror_registry::mock::MockTransport;
    use artifact_mirror_registry::{HttpResponse, Method, RetryPolicy};

    use super::*;

    fn client(transport: &Arc<MockTransport>) -> GithubClient {
        let http = RetryingClient::new(transport.clone())
            .with_policy(RetryPolicy::new().with_base_delay(Duration::ZERO));
        GithubClient::new(http).with_token(Some("secret"))
    }

    #[tokio::test]
    async fn test_list_releases_follows_link_header() {
        let transport = Arc::new(
            MockTransport::new()
                .with_response(
                    HttpResponse::new(200, r#"[{"tag_name":"v1.1.0"},{"tag_name":"v1.2.0-rc1","prerelease":true}]"#)
                        .with_header(
                            "Link",
                            r#"<https://api.github.com/repositories/1/releases?per_page=100&page=2>; rel="next""#,
                        ),
                )
                .with_json(200, r#"[{"tag_name":"v1.0.0","draft":false}]"#),
        );

        let releases = client(&transport).list_releases("rancher", "fleet").await.unwrap();

        assert_eq!(releases.len(), 3);
        assert!(releases[1].is_unpublished());
        assert_eq!(releases[2].tag_name, "v1.0.0");
        let urls = transport.urls();
        assert_eq!(urls[0], "https://api.github.com/repos/rancher/fleet/releases?per_page=100");
        assert!(urls[1].ends_with("page=2"));
    }

    #[tokio::test]
    async fn test_requests_carry_token_and_api_headers() {
        let transport = Arc::new(MockTransport::new().with_json(200, r#"{"tag_name":"v2.0.0"}"#));

        let release = client(&transport).latest_release("o", "r").await.unwrap();

        assert_eq!(release, Release::published("v2.0.0"));
        let request = &transport.requests()[0];
        assert_eq!(request.header("Authorization"), Some("Bearer secret"));
        assert_eq!(request.header("Accept"), Some("application/vnd.github+json"));
    }

    #[tokio::test]
    async fn test_file_contents_decodes_wrapped_base64() {
        // "rancher/fleet:v0.1.0\n" split across two lines as GitHub does.
        let body = r#"{"encoding":"base64","content":"cmFuY2hlci9mbGVl\ndDp2MC4xLjAK\n"}"#;
        let transport = Arc::new(MockTransport::new().with_json(200, body));

        let text = client(&transport)
            .file_contents("rancher", "fleet", "images.txt", "v0.1.0")
            .await
            .unwrap();

        assert_eq!(text, "rancher/fleet:v0.1.0\n");
        assert_eq!(
            transport.urls()[0],
            "https://api.github.com/repos/rancher/fleet/contents/images.txt?ref=v0.1.0"
        );
    }

    #[tokio::test]
    async fn test_list_pull_requests_encodes_head() {
        let transport = Arc::new(
            MockTransport::new().with_json(200, r#"[{"number":7,"html_url":"https://github.com/o/r/pull/7"}]"#),
        );

        let pulls = client(&transport)
            .list_pull_requests("o", "r", "o:autoupdate/fleet/abcd2345", "master")
            .await
            .unwrap();

        assert_eq!(pulls[0].number, 7);
        let url = &transport.urls()[0];
        assert!(url.contains("head=o%3Aautoupdate%2Ffleet%2Fabcd2345"));
        assert!(url.contains("state=all"));
    }

    #[tokio::test]
    async fn test_request_reviewers_posts_users_and_teams() {
        let transport = Arc::new(MockTransport::new().with_json(201, "{}"));
        let reviewers = Reviewers::from_entries(&["alice".into(), "rancher/team".into()]);

        client(&transport).request_reviewers("o", "r", 7, &reviewers).await.unwrap();

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Post);
        let body: serde_json::Value = serde_json::from_slice(request.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["reviewers"][0], "alice");
        assert_eq!(body["team_reviewers"][0], "team");
    }

    #[tokio::test]
    async fn test_no_reviewers_sends_nothing() {
        let transport = Arc::new(MockTransport::new());
        client(&transport)
            .request_reviewers("o", "r", 7, &Reviewers::default())
            .await
            .unwrap();
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_not_found_is_wrapped() {
        let transport = Arc::new(MockTransport::new().with_json(404, r#"{"message":"Not Found"}"#));
        let err = client(&transport).latest_release("o", "r").await.unwrap_err();
        assert!(matches!(err, AutoUpdateError::Github { ref operation, .. } if operation == "get latest release"));
    }
}
