use artifact_mirror_core::{Artifact, Validate, ValidationError, ValidationErrors};
use artifact_mirror_registry::version::{extract_version, satisfies};
use artifact_mirror_registry::{RegistryError, VersionConstraint};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{artifacts_with_tags, StrategyContext, UpdateStrategy};
use crate::entry::{validate_refs, ArtifactRef};
use crate::error::Result;

/// Uses GitHub release tags as image tags.
///
/// Either every published release or only the latest one is considered.
/// `VersionRegex` selects releases and, through its first capture group,
/// the part of the tag used as the image tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct GithubRelease {
    /// Repository owner.
    #[serde(default)]
    pub owner: String,
    /// Repository name.
    #[serde(default)]
    pub repository: String,
    /// Artifacts receiving the tags.
    #[serde(default)]
    pub artifacts: Vec<ArtifactRef>,
    /// Only consider the release GitHub marks as latest.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub latest_only: bool,
    /// Semver range extracted versions must satisfy.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version_constraint: String,
    /// Expression release tags must match.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version_regex: String,
}

impl GithubRelease {
    fn regex(&self) -> std::result::Result<Option<Regex>, RegistryError> {
        if self.version_regex.is_empty() {
            return Ok(None);
        }
        Regex::new(&self.version_regex)
            .map(Some)
            .map_err(|source| RegistryError::InvalidFilter {
                pattern: self.version_regex.clone(),
                source,
            })
    }

    fn constraint(&self) -> std::result::Result<Option<VersionConstraint>, RegistryError> {
        if self.version_constraint.is_empty() {
            return Ok(None);
        }
        VersionConstraint::parse(&self.version_constraint).map(Some)
    }

    async fn release_versions(&self, context: &StrategyContext) -> Result<Vec<String>> {
        let regex = self.regex()?;
        let constraint = self.constraint()?;
        let releases = context
            .releases
            .list_releases(&self.owner, &self.repository)
            .await?;

        let mut versions: Vec<String> = Vec::new();
        for release in releases {
            if release.is_unpublished() {
                continue;
            }
            let Some(version) = extract_version(&release.tag_name, regex.as_ref()) else {
                continue;
            };
            if let Some(constraint) = &constraint {
                match satisfies(&version, constraint) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        debug!(tag = %release.tag_name, error = %e, "skipping unparsable release version");
                        continue;
                    }
                }
            }
            if !versions.contains(&version) {
                versions.push(version);
            }
        }
        Ok(versions)
    }

    async fn latest_version(&self, context: &StrategyContext) -> Result<Vec<String>> {
        let regex = self.regex()?;
        let release = context
            .releases
            .latest_release(&self.owner, &self.repository)
            .await?;
        Ok(extract_version(&release.tag_name, regex.as_ref())
            .into_iter()
            .collect())
    }
}

impl Validate for GithubRelease {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.owner.is_empty() {
            errors.add(ValidationError::required("Owner"));
        }
        if self.repository.is_empty() {
            errors.add(ValidationError::required("Repository"));
        }
        if self.artifacts.is_empty() {
            errors.add(
                ValidationError::empty("Artifacts")
                    .with_message("must specify at least one element for Artifacts"),
            );
        }
        validate_refs("Artifacts", &self.artifacts, &mut errors);
        if self.latest_only && !self.version_constraint.is_empty() {
            errors.add(ValidationError::conflict(
                "VersionConstraint",
                "must not specify VersionConstraint when LatestOnly=true",
            ));
        }
        if let Err(e) = self.constraint() {
            errors.add(ValidationError::format(
                "VersionConstraint",
                format!("invalid VersionConstraint: {e}"),
            ));
        }
        if let Err(e) = self.regex() {
            errors.add(ValidationError::format(
                "VersionRegex",
                format!("invalid VersionRegex: {e}"),
            ));
        }
        errors.into_result()
    }
}

#[async_trait]
impl UpdateStrategy for GithubRelease {
    fn kind(&self) -> &'static str {
        "GithubRelease"
    }

    async fn discover(&self, context: &StrategyContext) -> Result<Vec<Artifact>> {
        let tags = if self.latest_only {
            self.latest_version(context).await?
        } else {
            self.release_versions(context).await?
        };
        debug!(
            owner = %self.owner,
            repository = %self.repository,
            tags = tags.len(),
            "discovered release tags"
        );
        artifacts_with_tags(&self.artifacts, &tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::Release;
    use crate::strategies::fakes::{context, strings, FakeHelm, FakeReleases, FakeTags};

    fn strategy() -> GithubRelease {
        GithubRelease {
            owner: "rancher".to_string(),
            repository: "fleet".to_string(),
            artifacts: vec![
                ArtifactRef::new("rancher/fleet"),
                ArtifactRef::new("rancher/fleet-agent"),
            ],
            ..GithubRelease::default()
        }
    }

    fn releases() -> FakeReleases {
        FakeReleases {
            releases: vec![
                Release::published("v0.10.1"),
                Release {
                    tag_name: "v0.11.0-rc.1".to_string(),
                    draft: false,
                    prerelease: true,
                },
                Release {
                    tag_name: "v0.11.0".to_string(),
                    draft: true,
                    prerelease: false,
                },
                Release::published("v0.9.5"),
                Release::published("chart-1.0.0"),
            ],
            latest: Some(Release::published("v0.10.1")),
            ..FakeReleases::default()
        }
    }

    async fn discover(strategy: &GithubRelease) -> Vec<Artifact> {
        strategy
            .discover(&context(releases(), FakeTags::default(), FakeHelm::default()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_all_published_releases() {
        let artifacts = discover(&strategy()).await;
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].tags(), strings(&["v0.10.1", "v0.9.5", "chart-1.0.0"]));
        assert_eq!(artifacts[1].source_artifact(), "rancher/fleet-agent");
    }

    #[tokio::test]
    async fn test_constraint_skips_unparsable_and_older() {
        let strategy = GithubRelease {
            version_constraint: ">=0.10.0".to_string(),
            ..strategy()
        };
        let artifacts = discover(&strategy).await;
        assert_eq!(artifacts[0].tags(), ["v0.10.1"]);
    }

    #[tokio::test]
    async fn test_regex_capture_group_becomes_tag() {
        let strategy = GithubRelease {
            version_regex: r"^chart-(\d+\.\d+\.\d+)$".to_string(),
            ..strategy()
        };
        let artifacts = discover(&strategy).await;
        assert_eq!(artifacts[0].tags(), ["1.0.0"]);
    }

    #[tokio::test]
    async fn test_latest_only() {
        let strategy = GithubRelease {
            latest_only: true,
            ..strategy()
        };
        let artifacts = discover(&strategy).await;
        assert_eq!(artifacts[0].tags(), ["v0.10.1"]);
    }

    #[test]
    fn test_validation() {
        assert!(strategy().is_valid());

        let errors = GithubRelease::default().validate().unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"Owner"));
        assert!(fields.contains(&"Repository"));
        assert!(fields.contains(&"Artifacts"));

        let conflicting = GithubRelease {
            latest_only: true,
            version_constraint: ">=1.0.0".to_string(),
            ..strategy()
        };
        assert!(conflicting
            .validate()
            .unwrap_err()
            .iter()
            .any(|e| e.message == "must not specify VersionConstraint when LatestOnly=true"));

        let bad_regex = GithubRelease {
            version_regex: "(".to_string(),
            ..strategy()
        };
        assert!(bad_regex
            .validate()
            .unwrap_err()
            .iter()
            .any(|e| e.field == "VersionRegex"));

        let bad_constraint = GithubRelease {
            version_constraint: ">=banana".to_string(),
            ..strategy()
        };
        assert!(!bad_constraint.is_valid());
    }
}
