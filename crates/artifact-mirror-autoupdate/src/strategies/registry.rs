use artifact_mirror_core::{Artifact, Validate, ValidationError, ValidationErrors};
use artifact_mirror_registry::version::{filter_tags, latest};
use artifact_mirror_registry::RegistryError;
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{artifacts_with_tags, StrategyContext, UpdateStrategy};
use crate::entry::{validate_refs, ArtifactRef};
use crate::error::Result;

/// Uses the tags the upstream registry lists for the first artifact.
///
/// Every artifact in one entry is assumed to share that tag space.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Registry {
    /// Artifacts receiving the tags; the first one is queried.
    #[serde(default)]
    pub artifacts: Vec<ArtifactRef>,
    /// Keep only the highest version.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub latest: bool,
    /// Expression tags must match.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version_filter: String,
}

impl Registry {
    fn filter(&self) -> std::result::Result<Option<Regex>, RegistryError> {
        if self.version_filter.is_empty() {
            return Ok(None);
        }
        Regex::new(&self.version_filter)
            .map(Some)
            .map_err(|source| RegistryError::InvalidFilter {
                pattern: self.version_filter.clone(),
                source,
            })
    }
}

impl Validate for Registry {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.artifacts.is_empty() {
            errors.add(
                ValidationError::empty("Artifacts").with_message("must specify at least one artifact"),
            );
        }
        validate_refs("Artifacts", &self.artifacts, &mut errors);
        if let Err(e) = self.filter() {
            errors.add(ValidationError::format(
                "VersionFilter",
                format!("invalid version filter regex: {e}"),
            ));
        }
        errors.into_result()
    }
}

#[async_trait]
impl UpdateStrategy for Registry {
    fn kind(&self) -> &'static str {
        "Registry"
    }

    async fn discover(&self, context: &StrategyContext) -> Result<Vec<Artifact>> {
        let Some(first) = self.artifacts.first() else {
            return Ok(Vec::new());
        };
        let repository = first.source_artifact.as_str();

        let all_tags = context.tags.list_tags(repository).await?;
        if all_tags.is_empty() {
            return Err(RegistryError::NoTagsFound {
                repository: repository.to_string(),
                filter: None,
            }
            .into());
        }

        let filter = self.filter()?;
        let mut tags = filter_tags(&all_tags, filter.as_ref());
        if tags.is_empty() {
            return Err(RegistryError::NoTagsFound {
                repository: repository.to_string(),
                filter: Some(self.version_filter.clone()),
            }
            .into());
        }

        if self.latest {
            tags = vec![latest(&tags)?];
        }
        debug!(repository, listed = all_tags.len(), kept = tags.len(), "discovered registry tags");
        artifacts_with_tags(&self.artifacts, &tags)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::error::AutoUpdateError;
    use crate::strategies::fakes::{context, strings, FakeHelm, FakeReleases, FakeTags};

    fn tags(repository: &str, values: &[&str]) -> FakeTags {
        FakeTags {
            tags: HashMap::from([(repository.to_string(), strings(values))]),
        }
    }

    async fn discover(strategy: &Registry, source: FakeTags) -> Result<Vec<Artifact>> {
        strategy
            .discover(&context(FakeReleases::default(), source, FakeHelm::default()))
            .await
    }

    fn strategy() -> Registry {
        Registry {
            artifacts: vec![
                ArtifactRef::new("library/ubuntu"),
                ArtifactRef::new("library/ubuntu").with_target_artifact_name("ubuntu"),
            ],
            ..Registry::default()
        }
    }

    #[tokio::test]
    async fn test_every_ref_gets_the_first_refs_tags() {
        let artifacts = discover(&strategy(), tags("library/ubuntu", &["20.04", "22.04"]))
            .await
            .unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].tags(), ["20.04", "22.04"]);
        assert_eq!(artifacts[1].target_artifact_name(), "ubuntu");
        assert_eq!(artifacts[1].tags(), ["20.04", "22.04"]);
    }

    #[tokio::test]
    async fn test_filter_then_latest_keeps_original_spelling() {
        let strategy = Registry {
            latest: true,
            version_filter: r"^v\d+\.\d+\.\d+$".to_string(),
            ..strategy()
        };
        let source = tags("library/ubuntu", &["v1.9.0", "v1.10.0", "v1.11.0-rc1", "latest"]);

        let artifacts = discover(&strategy, source).await.unwrap();
        assert_eq!(artifacts[0].tags(), ["v1.10.0"]);
    }

    #[tokio::test]
    async fn test_latest_without_filter_fails_on_non_versions() {
        let strategy = Registry {
            latest: true,
            ..strategy()
        };
        let err = discover(&strategy, tags("library/ubuntu", &["20.04", "latest"]))
            .await
            .unwrap_err();
        assert!(matches!(err, AutoUpdateError::Registry(RegistryError::InvalidVersion { .. })));
    }

    #[tokio::test]
    async fn test_no_tags() {
        let err = discover(&strategy(), tags("library/ubuntu", &[])).await.unwrap_err();
        assert!(matches!(
            err,
            AutoUpdateError::Registry(RegistryError::NoTagsFound { filter: None, .. })
        ));

        let filtered = Registry {
            version_filter: "^never$".to_string(),
            ..strategy()
        };
        let err = discover(&filtered, tags("library/ubuntu", &["20.04"])).await.unwrap_err();
        assert!(matches!(
            err,
            AutoUpdateError::Registry(RegistryError::NoTagsFound { filter: Some(_), .. })
        ));
    }

    #[test]
    fn test_validation() {
        assert!(strategy().is_valid());
        assert!(!Registry::default().is_valid());
        let bad = Registry {
            version_filter: "[".to_string(),
            ..strategy()
        };
        let errors = bad.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.message.starts_with("invalid version filter regex")));
    }
}
