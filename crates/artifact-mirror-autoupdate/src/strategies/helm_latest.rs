use std::collections::BTreeMap;

use artifact_mirror_core::{Artifact, Validate, ValidationError, ValidationErrors};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::debug;

use super::{insert_tag, map_discovered, StrategyContext, TagsByRepository, UpdateStrategy};
use crate::entry::{strip_docker_io, validate_refs, ArtifactRef};
use crate::error::{AutoUpdateError, Result};
use crate::helm::TemplateRequest;

/// `--set` values applied when rendering a chart.
pub type Environment = Vec<String>;

/// Finds images by rendering the latest version of Helm charts.
///
/// Every mapping key named `image` with a string value in the rendered
/// output is taken as an image reference. Fields that merely share the
/// name are picked up too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct HelmLatest {
    /// Artifacts the discovered repositories map to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<ArtifactRef>,
    /// Chart repository URL.
    #[serde(default)]
    pub helm_repo: String,
    /// Chart name to named environments.
    #[serde(default)]
    pub charts: BTreeMap<String, BTreeMap<String, Environment>>,
    /// Repositories to ignore.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_denylist: Vec<String>,
}

impl HelmLatest {
    fn requests(&self) -> Vec<TemplateRequest> {
        self.charts
            .iter()
            .flat_map(|(chart, environments)| {
                environments.iter().map(move |(environment, values)| TemplateRequest {
                    chart: chart.clone(),
                    environment: environment.clone(),
                    values: values.clone(),
                })
            })
            .collect()
    }
}

/// Splits an image reference into repository and tag.
///
/// A trailing `@digest` is dropped and a `docker.io/` prefix stripped.
///
/// # Errors
///
/// Returns [`AutoUpdateError::InvalidImage`] unless the reference splits
/// into exactly two parts on `:`.
///
/// # Examples
///
/// ```
/// use artifact_mirror_autoupdate::strategies::parse_image_reference;
///
/// let (repository, tag) = parse_image_reference("docker.io/rancher/shell:v0.1.24@sha256:abc")?;
/// assert_eq!(repository, "rancher/shell");
/// assert_eq!(tag, "v0.1.24");
/// # Ok::<(), artifact_mirror_autoupdate::AutoUpdateError>(())
/// ```
pub fn parse_image_reference(image: &str) -> Result<(String, String)> {
    let without_digest = image.split('@').next().unwrap_or_default();
    let parts: Vec<&str> = without_digest.split(':').collect();
    match parts.as_slice() {
        [repository, tag] => Ok((strip_docker_io(repository).to_string(), (*tag).to_string())),
        _ => Err(AutoUpdateError::InvalidImage {
            image: image.to_string(),
            reason: "failed to split into two parts on \":\"".to_string(),
        }),
    }
}

/// Walks `value`, recording every string under an `image` key.
///
/// # Errors
///
/// Returns an error if an `image` string is not a valid reference.
pub fn collect_images(value: &Value, discovered: &mut TagsByRepository) -> Result<()> {
    match value {
        Value::Mapping(mapping) => {
            for (key, child) in mapping {
                match (key.as_str(), child) {
                    (Some("image"), Value::String(image)) => {
                        let (repository, tag) = parse_image_reference(image)?;
                        insert_tag(discovered, &repository, &tag);
                    }
                    _ => collect_images(child, discovered)?,
                }
            }
        }
        Value::Sequence(sequence) => {
            for child in sequence {
                collect_images(child, discovered)?;
            }
        }
        Value::Tagged(tagged) => collect_images(&tagged.value, discovered)?,
        _ => {}
    }
    Ok(())
}

impl Validate for HelmLatest {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.helm_repo.is_empty() {
            errors.add(ValidationError::required("HelmRepo"));
        }
        if self.charts.is_empty() {
            errors.add(
                ValidationError::empty("Charts")
                    .with_message("must specify at least one chart in Charts"),
            );
        }
        for (chart, environments) in &self.charts {
            if environments.is_empty() {
                errors.add(ValidationError::empty(format!("Charts.{chart}")).with_message(
                    format!("chart {chart:?} must have at least one environment"),
                ));
            }
        }
        validate_refs("Artifacts", &self.artifacts, &mut errors);
        errors.into_result()
    }
}

#[async_trait]
impl UpdateStrategy for HelmLatest {
    fn kind(&self) -> &'static str {
        "HelmLatest"
    }

    async fn discover(&self, context: &StrategyContext) -> Result<Vec<Artifact>> {
        let requests = self.requests();
        let outputs = context.helm.render(&self.helm_repo, &requests).await?;

        let mut discovered = TagsByRepository::new();
        for (request, output) in requests.iter().zip(&outputs) {
            for document in serde_yaml::Deserializer::from_str(output) {
                let value = Value::deserialize(document)?;
                collect_images(&value, &mut discovered)?;
            }
            debug!(release = %request.release_name(), images = discovered.len(), "scanned chart");
        }

        discovered.retain(|repository, _| {
            !self
                .image_denylist
                .iter()
                .any(|denied| strip_docker_io(denied) == repository)
        });
        map_discovered(&self.artifacts, discovered)
    }
}
