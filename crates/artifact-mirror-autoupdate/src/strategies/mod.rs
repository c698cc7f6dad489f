//! Update strategies.
//!
//! A strategy reports the desired current state of a set of artifacts as
//! seen by one upstream source. It never computes a delta; the orchestrator
//! diffs the result against `config.yaml`.

mod github_release;
mod helm_latest;
mod registry;
mod tagged_images_file;

use std::collections::BTreeMap;
use std::sync::Arc;

use artifact_mirror_core::{Artifact, Validate};
use artifact_mirror_registry::SharedTagSource;
use async_trait::async_trait;

use crate::entry::{strip_docker_io, ArtifactRef};
use crate::error::{AutoUpdateError, Result};
use crate::github::ReleaseSource;
use crate::helm::HelmTemplater;

pub use github_release::GithubRelease;
pub use helm_latest::{collect_images, parse_image_reference, Environment, HelmLatest};
pub use registry::Registry;
pub use tagged_images_file::{parse_images_file, GithubTaggedImagesFile};

/// The upstream collaborators strategies read from.
#[derive(Clone)]
pub struct StrategyContext {
    /// GitHub releases and file contents.
    pub releases: Arc<dyn ReleaseSource>,
    /// Registry tag listings.
    pub tags: SharedTagSource,
    /// Chart rendering.
    pub helm: Arc<dyn HelmTemplater>,
}

impl std::fmt::Debug for StrategyContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyContext").finish_non_exhaustive()
    }
}

/// A producer of desired-state artifacts.
#[async_trait]
pub trait UpdateStrategy: Validate + Send + Sync {
    /// Short name used in logs.
    fn kind(&self) -> &'static str;

    /// Returns one artifact per configured reference, carrying every tag
    /// the upstream source currently offers.
    ///
    /// # Errors
    ///
    /// Returns an error if the upstream source fails or reports an image
    /// that no configured reference selects.
    async fn discover(&self, context: &StrategyContext) -> Result<Vec<Artifact>>;
}

/// Repository to tags, in first-seen order without duplicates.
pub type TagsByRepository = BTreeMap<String, Vec<String>>;

pub(crate) fn insert_tag(discovered: &mut TagsByRepository, repository: &str, tag: &str) {
    let tags = discovered.entry(repository.to_string()).or_default();
    if !tags.iter().any(|t| t == tag) {
        tags.push(tag.to_string());
    }
}

/// Builds one artifact per reference, all carrying `tags`.
pub(crate) fn artifacts_with_tags(refs: &[ArtifactRef], tags: &[String]) -> Result<Vec<Artifact>> {
    refs.iter().map(|r| r.to_artifact(tags.to_vec())).collect()
}

/// Assigns discovered repositories to the references selecting them.
///
/// Fails on the first repository no reference selects.
pub(crate) fn map_discovered(
    refs: &[ArtifactRef],
    discovered: TagsByRepository,
) -> Result<Vec<Artifact>> {
    let mut artifacts = Vec::new();
    for (repository, tags) in discovered {
        let selected: Vec<&ArtifactRef> = refs.iter().filter(|r| r.selects(&repository)).collect();
        if selected.is_empty() {
            return Err(AutoUpdateError::UnmappedArtifact {
                repository: strip_docker_io(&repository).to_string(),
            });
        }
        for artifact_ref in selected {
            artifacts.push(artifact_ref.to_artifact(tags.clone())?);
        }
    }
    Ok(artifacts)
}

/// Fakes for strategy and orchestrator tests.
#[cfg(test)]
pub(crate) mod fakes {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use artifact_mirror_registry::{RegistryError, TagSource};

    use super::*;
    use crate::github::Release;
    use crate::helm::TemplateRequest;

    #[derive(Default)]
    pub struct FakeReleases {
        pub releases: Vec<Release>,
        pub latest: Option<Release>,
        pub files: HashMap<String, String>,
        pub fetched: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReleaseSource for FakeReleases {
        async fn list_releases(&self, _owner: &str, _repo: &str) -> Result<Vec<Release>> {
            Ok(self.releases.clone())
        }

        async fn latest_release(&self, _owner: &str, _repo: &str) -> Result<Release> {
            self.latest.clone().ok_or_else(|| {
                AutoUpdateError::github(
                    "get latest release",
                    RegistryError::HttpError {
                        url: "latest".to_string(),
                        status: 404,
                        body: "Not Found".to_string(),
                    },
                )
            })
        }

        async fn file_contents(
            &self,
            _owner: &str,
            _repo: &str,
            _path: &str,
            git_ref: &str,
        ) -> Result<String> {
            if let Ok(mut fetched) = self.fetched.lock() {
                fetched.push(git_ref.to_string());
            }
            Ok(self.files.get(git_ref).cloned().unwrap_or_default())
        }
    }

    #[derive(Default)]
    pub struct FakeTags {
        pub tags: HashMap<String, Vec<String>>,
    }

    #[async_trait]
    impl TagSource for FakeTags {
        async fn list_tags(&self, reference: &str) -> std::result::Result<Vec<String>, RegistryError> {
            self.tags
                .get(reference)
                .cloned()
                .ok_or_else(|| RegistryError::UnrecognizedRegistry {
                    host: reference.to_string(),
                })
        }
    }

    #[derive(Default)]
    pub struct FakeHelm {
        pub outputs: HashMap<String, String>,
        pub requests: Mutex<Vec<TemplateRequest>>,
    }

    #[async_trait]
    impl HelmTemplater for FakeHelm {
        async fn render(&self, _repo_url: &str, requests: &[TemplateRequest]) -> Result<Vec<String>> {
            if let Ok(mut seen) = self.requests.lock() {
                seen.extend(requests.iter().cloned());
            }
            Ok(requests
                .iter()
                .map(|r| self.outputs.get(&r.release_name()).cloned().unwrap_or_default())
                .collect())
        }
    }

    pub fn context(releases: FakeReleases, tags: FakeTags, helm: FakeHelm) -> StrategyContext {
        StrategyContext {
            releases: Arc::new(releases),
            tags: Arc::new(tags),
            helm: Arc::new(helm),
        }
    }

    pub fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }
}
