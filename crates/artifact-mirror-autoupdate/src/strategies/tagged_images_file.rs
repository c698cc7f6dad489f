use artifact_mirror_core::{Artifact, Validate, ValidationError, ValidationErrors};
use artifact_mirror_registry::version::parse_version;
use artifact_mirror_registry::{RegistryError, VersionConstraint};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{insert_tag, map_discovered, StrategyContext, TagsByRepository, UpdateStrategy};
use crate::entry::{strip_docker_io, validate_refs, ArtifactRef};
use crate::error::{AutoUpdateError, Result};

/// Reads a `repository:tag` list committed at every matching release tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct GithubTaggedImagesFile {
    /// Repository owner.
    #[serde(default)]
    pub owner: String,
    /// Repository name.
    #[serde(default)]
    pub repository: String,
    /// Path of the image list within the repository.
    #[serde(default)]
    pub images_file_path: String,
    /// Semver range release tags must satisfy.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version_constraint: String,
    /// Artifacts the listed repositories map to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactRef>,
}

impl GithubTaggedImagesFile {
    fn constraint(&self) -> std::result::Result<Option<VersionConstraint>, RegistryError> {
        if self.version_constraint.is_empty() {
            return Ok(None);
        }
        VersionConstraint::parse(&self.version_constraint).map(Some)
    }
}

/// Parses an image list: one `repository:tag` per line, blank lines
/// ignored, a `docker.io/` prefix stripped.
///
/// # Errors
///
/// Returns [`AutoUpdateError::InvalidImage`] for a line that does not split
/// into exactly two parts on `:`.
///
/// # Examples
///
/// ```
/// use artifact_mirror_autoupdate::strategies::parse_images_file;
///
/// let images = parse_images_file("docker.io/rancher/fleet:v0.10.1\n\nrancher/gitjob:v0.9.0\n")?;
/// assert_eq!(images[0], ("rancher/fleet".to_string(), "v0.10.1".to_string()));
/// assert_eq!(images.len(), 2);
/// # Ok::<(), artifact_mirror_autoupdate::AutoUpdateError>(())
/// ```
pub fn parse_images_file(contents: &str) -> Result<Vec<(String, String)>> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let parts: Vec<&str> = line.split(':').collect();
            match parts.as_slice() {
                [repository, tag] => Ok((strip_docker_io(repository).to_string(), (*tag).to_string())),
                _ => Err(AutoUpdateError::InvalidImage {
                    image: line.to_string(),
                    reason: "did not split into two on \":\"".to_string(),
                }),
            }
        })
        .collect()
}

impl Validate for GithubTaggedImagesFile {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.owner.is_empty() {
            errors.add(ValidationError::required("Owner"));
        }
        if self.repository.is_empty() {
            errors.add(ValidationError::required("Repository"));
        }
        if self.images_file_path.is_empty() {
            errors.add(ValidationError::required("ImagesFilePath"));
        }
        validate_refs("Artifacts", &self.artifacts, &mut errors);
        if let Err(e) = self.constraint() {
            errors.add(ValidationError::format(
                "VersionConstraint",
                format!("invalid VersionConstraint: {e}"),
            ));
        }
        errors.into_result()
    }
}

#[async_trait]
impl UpdateStrategy for GithubTaggedImagesFile {
    fn kind(&self) -> &'static str {
        "GithubTaggedImagesFile"
    }

    async fn discover(&self, context: &StrategyContext) -> Result<Vec<Artifact>> {
        let constraint = self.constraint()?;
        let releases = context
            .releases
            .list_releases(&self.owner, &self.repository)
            .await?;

        let mut discovered = TagsByRepository::new();
        for release in releases {
            if release.is_unpublished() || release.tag_name.is_empty() {
                continue;
            }
            let Ok(version) = parse_version(&release.tag_name) else {
                debug!(tag = %release.tag_name, "skipping release without a version tag");
                continue;
            };
            if constraint.as_ref().is_some_and(|c| !c.matches(&version)) {
                continue;
            }

            let contents = context
                .releases
                .file_contents(
                    &self.owner,
                    &self.repository,
                    &self.images_file_path,
                    &release.tag_name,
                )
                .await?;
            for (repository, tag) in parse_images_file(&contents)? {
                insert_tag(&mut discovered, &repository, &tag);
            }
        }
        debug!(
            owner = %self.owner,
            repository = %self.repository,
            images = discovered.len(),
            "read tagged image files"
        );
        map_discovered(&self.artifacts, discovered)
    }
}
