//! The artifact model.
//!
//! An [`Artifact`] is one mirrorable source reference together with the tags
//! to mirror and the rules that decide where, and whether, each tag is
//! mirrored. Its identity is the pair `(source artifact, target artifact
//! name)` captured by [`ArtifactKey`].

use std::collections::BTreeSet;
use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::Repository;
use crate::error::{Error, Result};
use crate::regsync::SyncDirective;

/// Registry host whose artifacts get `appco-` prefixed target names.
pub const APPCO_HOST: &str = "dp.apps.rancher.io";

/// Prefix stripped from both sides when detecting self-mirroring.
pub const DOCKER_IO_PREFIX: &str = "docker.io/";

/// Which tags of an artifact are withheld from mirroring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DoNotMirror {
    /// Every tag is mirrored.
    #[default]
    Unset,
    /// No tag is mirrored.
    AllTags,
    /// The named tags are not mirrored.
    ExcludedTags(BTreeSet<String>),
}

impl DoNotMirror {
    /// Returns true if nothing is excluded.
    #[must_use]
    pub const fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Returns true if `tag` must not be mirrored.
    #[must_use]
    pub fn excludes(&self, tag: &str) -> bool {
        match self {
            Self::Unset => false,
            Self::AllTags => true,
            Self::ExcludedTags(tags) => tags.contains(tag),
        }
    }
}

impl Serialize for DoNotMirror {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Unset => serializer.serialize_none(),
            Self::AllTags => serializer.serialize_bool(true),
            Self::ExcludedTags(tags) => serializer.collect_seq(tags),
        }
    }
}

struct DoNotMirrorVisitor;

impl<'de> Visitor<'de> for DoNotMirrorVisitor {
    type Value = DoNotMirror;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DoNotMirror must be null, a bool, or a list of tags")
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> std::result::Result<Self::Value, E> {
        Ok(if value {
            DoNotMirror::AllTags
        } else {
            DoNotMirror::Unset
        })
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
        Ok(DoNotMirror::Unset)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
        Ok(DoNotMirror::Unset)
    }

    fn visit_some<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> std::result::Result<Self::Value, D::Error> {
        deserializer.deserialize_any(Self)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error> {
        let mut tags = BTreeSet::new();
        while let Some(tag) = seq.next_element::<String>()? {
            if tags.contains(&tag) {
                return Err(de::Error::custom(format!(
                    "DoNotMirror entry {tag:?} is duplicated"
                )));
            }
            tags.insert(tag);
        }
        Ok(DoNotMirror::ExcludedTags(tags))
    }
}

impl<'de> Deserialize<'de> for DoNotMirror {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(DoNotMirrorVisitor)
    }
}

/// Identity of an artifact: two artifacts with equal keys are the same
/// artifact regardless of their tags.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArtifactKey {
    /// Source reference without a tag.
    pub source_artifact: String,
    /// Resolved target artifact name.
    pub target_artifact_name: String,
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source_artifact, self.target_artifact_name)
    }
}

/// One mirrorable artifact.
///
/// Construct with [`Artifact::new`], which derives the default target name
/// and rejects references with fewer than two path segments.
///
/// # Examples
///
/// ```rust
/// use artifact_mirror_core::Artifact;
///
/// let artifact = Artifact::new("quay.io/org/app", vec!["v1".to_string()])?;
/// assert_eq!(artifact.target_artifact_name(), "mirrored-org-app");
///
/// let appco = Artifact::new("dp.apps.rancher.io/containers/openjdk", vec![])?;
/// assert_eq!(appco.target_artifact_name(), "appco-openjdk");
/// # Ok::<(), artifact_mirror_core::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ArtifactDocument", into = "ArtifactDocument")]
pub struct Artifact {
    source_artifact: String,
    tags: Vec<String>,
    specified_target_artifact_name: Option<String>,
    default_target_artifact_name: String,
    do_not_mirror: DoNotMirror,
    target_repositories: Vec<String>,
}

impl Artifact {
    /// Creates an artifact with default mirroring rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSourceArtifact`] if `source_artifact` has
    /// fewer than two `/`-separated segments.
    pub fn new(source_artifact: impl Into<String>, tags: Vec<String>) -> Result<Self> {
        let source_artifact = source_artifact.into();
        let default_target_artifact_name = default_target_artifact_name(&source_artifact)?;
        Ok(Self {
            source_artifact,
            tags,
            specified_target_artifact_name: None,
            default_target_artifact_name,
            do_not_mirror: DoNotMirror::Unset,
            target_repositories: Vec::new(),
        })
    }

    /// Sets the target artifact name.
    #[must_use]
    pub fn with_target_artifact_name(mut self, name: impl Into<String>) -> Self {
        self.set_target_artifact_name(name);
        self
    }

    /// Sets which tags are withheld from mirroring.
    #[must_use]
    pub fn with_do_not_mirror(mut self, do_not_mirror: DoNotMirror) -> Self {
        self.do_not_mirror = do_not_mirror;
        self
    }

    /// Restricts mirroring to the repositories with these base URLs.
    #[must_use]
    pub fn with_target_repositories(mut self, target_repositories: Vec<String>) -> Self {
        self.target_repositories = target_repositories;
        self
    }

    /// Replaces the tag list, keeping every other attribute.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Returns the source reference without a tag.
    #[must_use]
    pub fn source_artifact(&self) -> &str {
        &self.source_artifact
    }

    /// Returns the tags in their current order.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Returns the resolved target artifact name.
    #[must_use]
    pub fn target_artifact_name(&self) -> &str {
        self.specified_target_artifact_name
            .as_deref()
            .unwrap_or(&self.default_target_artifact_name)
    }

    /// Returns the explicit target name override, if any.
    #[must_use]
    pub fn specified_target_artifact_name(&self) -> Option<&str> {
        self.specified_target_artifact_name.as_deref()
    }

    /// Returns the target name derived from the source reference.
    #[must_use]
    pub fn default_target_artifact_name(&self) -> &str {
        &self.default_target_artifact_name
    }

    /// Returns the exclusion rules.
    #[must_use]
    pub const fn do_not_mirror(&self) -> &DoNotMirror {
        &self.do_not_mirror
    }

    /// Returns the base URLs this artifact is restricted to.
    #[must_use]
    pub fn target_repositories(&self) -> &[String] {
        &self.target_repositories
    }

    /// Returns the identity key of this artifact.
    #[must_use]
    pub fn key(&self) -> ArtifactKey {
        ArtifactKey {
            source_artifact: self.source_artifact.clone(),
            target_artifact_name: self.target_artifact_name().to_string(),
        }
    }

    /// Overrides the target artifact name.
    ///
    /// A value equal to the default (or empty) clears the override, so the
    /// default name is never written out explicitly.
    pub fn set_target_artifact_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.specified_target_artifact_name =
            if name.is_empty() || name == self.default_target_artifact_name {
                None
            } else {
                Some(name)
            };
    }

    /// Appends `tag` unless it is already present. Returns true if added.
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.tags.contains(&tag) {
            false
        } else {
            self.tags.push(tag);
            true
        }
    }

    /// Sorts the tags lexicographically.
    pub fn sort_tags(&mut self) {
        self.tags.sort();
    }

    /// Returns `source:tag` for every tag.
    #[must_use]
    pub fn full_references(&self) -> Vec<String> {
        self.tags
            .iter()
            .map(|tag| format!("{}:{tag}", self.source_artifact))
            .collect()
    }

    /// Returns true if this artifact would be mirrored onto itself in
    /// `repository`.
    #[must_use]
    pub fn mirrors_onto_itself(&self, repository: &Repository) -> bool {
        let target = format!("{}/{}", repository.base_url, self.target_artifact_name());
        strip_docker_io(&self.source_artifact) == strip_docker_io(&target)
    }

    /// Returns true if `repository` should receive this artifact.
    #[must_use]
    pub fn targets(&self, repository: &Repository) -> bool {
        if self.target_repositories.is_empty() {
            repository.default_target
        } else {
            self.target_repositories.contains(&repository.base_url)
        }
    }

    /// Expands this artifact into sync directives across `repositories`.
    ///
    /// Repositories not targeted by the artifact, and repositories that
    /// would receive the artifact as itself, are skipped. Directives come
    /// out in repository-then-tag order and each `(source, target)` pair
    /// appears at most once.
    #[must_use]
    pub fn to_sync_directives(&self, repositories: &[Repository]) -> Vec<SyncDirective> {
        if self.do_not_mirror == DoNotMirror::AllTags {
            return Vec::new();
        }

        let mut seen = BTreeSet::new();
        let mut directives = Vec::new();
        for repository in repositories {
            if !self.targets(repository) || self.mirrors_onto_itself(repository) {
                continue;
            }
            for directive in self.sync_directives_for(repository) {
                if seen.insert((directive.source.clone(), directive.target.clone())) {
                    directives.push(directive);
                }
            }
        }
        directives
    }

    /// Expands this artifact into one sync directive per mirrored tag for a
    /// single repository, without applying any targeting rules.
    #[must_use]
    pub fn sync_directives_for(&self, repository: &Repository) -> Vec<SyncDirective> {
        self.tags
            .iter()
            .filter(|tag| !self.do_not_mirror.excludes(tag))
            .map(|tag| {
                SyncDirective::image(
                    format!("{}:{tag}", self.source_artifact),
                    format!(
                        "{}/{}:{tag}",
                        repository.base_url,
                        self.target_artifact_name()
                    ),
                )
            })
            .collect()
    }
}

fn strip_docker_io(reference: &str) -> &str {
    reference
        .strip_prefix(DOCKER_IO_PREFIX)
        .unwrap_or(reference)
}

fn default_target_artifact_name(source_artifact: &str) -> Result<String> {
    let parts: Vec<&str> = source_artifact.split('/').collect();
    if parts.len() < 2 {
        return Err(Error::InvalidSourceArtifact {
            source_artifact: source_artifact.to_string(),
            reason: format!("split into {} parts (>=2 parts expected)", parts.len()),
        });
    }
    let name = parts[parts.len() - 1];
    if parts[0] == APPCO_HOST {
        Ok(format!("appco-{name}"))
    } else {
        Ok(format!("mirrored-{}-{name}", parts[parts.len() - 2]))
    }
}

/// On-disk shape of an artifact in `config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ArtifactDocument {
    #[serde(default, skip_serializing_if = "DoNotMirror::is_unset")]
    do_not_mirror: DoNotMirror,
    source_artifact: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_artifact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    target_repositories: Vec<String>,
}

impl TryFrom<ArtifactDocument> for Artifact {
    type Error = Error;

    fn try_from(document: ArtifactDocument) -> Result<Self> {
        let mut artifact = Self::new(document.source_artifact, document.tags)?
            .with_do_not_mirror(document.do_not_mirror)
            .with_target_repositories(document.target_repositories);
        if let Some(name) = document.target_artifact_name {
            artifact.set_target_artifact_name(name);
        }
        Ok(artifact)
    }
}

impl From<Artifact> for ArtifactDocument {
    fn from(artifact: Artifact) -> Self {
        Self {
            do_not_mirror: artifact.do_not_mirror,
            source_artifact: artifact.source_artifact,
            tags: artifact.tags,
            target_artifact_name: artifact.specified_target_artifact_name,
            target_repositories: artifact.target_repositories,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    fn repository(base_url: &str, default_target: bool) -> Repository {
        Repository::new(base_url).with_default_target(default_target)
    }

    #[test]
    fn test_default_target_artifact_name() {
        let artifact = Artifact::new("quay.io/org/app", vec![]).unwrap();
        assert_eq!(artifact.target_artifact_name(), "mirrored-org-app");

        let artifact = Artifact::new("gcr.io/org/a/b/c", vec![]).unwrap();
        assert_eq!(artifact.target_artifact_name(), "mirrored-b-c");

        let artifact = Artifact::new("dp.apps.rancher.io/containers/openjdk", vec![]).unwrap();
        assert_eq!(artifact.target_artifact_name(), "appco-openjdk");
    }

    #[test]
    fn test_new_rejects_single_segment() {
        let err = Artifact::new("ubuntu", vec![]).unwrap_err();
        assert!(matches!(err, Error::InvalidSourceArtifact { .. }));
        assert!(err.to_string().contains("split into 1 parts"));
    }

    #[test]
    fn test_set_target_artifact_name_to_default_clears_override() {
        let mut artifact = Artifact::new("rancher/cis-operator", vec![]).unwrap();
        artifact.set_target_artifact_name("custom-name");
        assert_eq!(artifact.specified_target_artifact_name(), Some("custom-name"));

        artifact.set_target_artifact_name("mirrored-rancher-cis-operator");
        assert_eq!(artifact.specified_target_artifact_name(), None);
        assert_eq!(artifact.target_artifact_name(), "mirrored-rancher-cis-operator");
    }

    #[test]
    fn test_key_uses_resolved_target_name() {
        let plain = Artifact::new("rancher/app", vec![]).unwrap();
        let renamed = plain.clone().with_target_artifact_name("other");
        assert_ne!(plain.key(), renamed.key());
        assert_eq!(plain.key(), plain.clone().with_tags(tags(&["v9"])).key());
    }

    #[test]
    fn test_full_references() {
        let artifact = Artifact::new("library/ubuntu", tags(&["20.04", "22.04"])).unwrap();
        assert_eq!(
            artifact.full_references(),
            vec!["library/ubuntu:20.04", "library/ubuntu:22.04"]
        );
    }

    #[test]
    fn test_self_exclusion() {
        let cases = [
            ("docker.io/test-org/test-artifact", "docker.io/test-org", false),
            ("docker.io/test-org/test-artifact", "some.other.registry/test-org", true),
            ("test-org/test-artifact", "docker.io/test-org", false),
            ("test-org/test-artifact", "some.other.registry/test-org", true),
            ("some.other.registry/test-org/test-artifact", "docker.io/test-org", true),
            ("some.other.registry/test-org/test-artifact", "some.other.registry/test-org", false),
        ];
        for (source, base_url, expected_present) in cases {
            let artifact = Artifact::new(source, tags(&["v1.0.0"]))
                .unwrap()
                .with_target_artifact_name("test-artifact");
            let directives = artifact.to_sync_directives(&[repository(base_url, true)]);
            if expected_present {
                assert_eq!(directives.len(), 1, "{source} -> {base_url}");
                assert_eq!(directives[0].source, format!("{source}:v1.0.0"));
                assert_eq!(
                    directives[0].target,
                    format!("{base_url}/test-artifact:v1.0.0")
                );
            } else {
                assert!(directives.is_empty(), "{source} -> {base_url}");
            }
        }
    }

    #[test]
    fn test_self_exclusion_other_registry_gets_every_tag() {
        let artifact = Artifact::new("test-org/img", tags(&["a", "b"]))
            .unwrap()
            .with_target_artifact_name("img");
        assert!(artifact
            .to_sync_directives(&[repository("docker.io/test-org", true)])
            .is_empty());
        assert_eq!(
            artifact
                .to_sync_directives(&[repository("other.registry/test-org", true)])
                .len(),
            2
        );
    }

    #[test]
    fn test_do_not_mirror_all_tags() {
        let artifact = Artifact::new("rancher/app", tags(&["v1", "v2"]))
            .unwrap()
            .with_do_not_mirror(DoNotMirror::AllTags);
        let repositories = [
            repository("registry.one/rancher", true),
            repository("registry.two/rancher", true),
        ];
        assert!(artifact.to_sync_directives(&repositories).is_empty());
    }

    #[test]
    fn test_do_not_mirror_excluded_tags() {
        let artifact = Artifact::new("rancher/app", tags(&["v1", "v2"]))
            .unwrap()
            .with_do_not_mirror(DoNotMirror::ExcludedTags(
                std::iter::once("v2".to_string()).collect(),
            ));
        let directives = artifact.to_sync_directives(&[repository("registry.one/rancher", true)]);
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].source, "rancher/app:v1");
    }

    #[test]
    fn test_targeting_defaults() {
        let artifact = Artifact::new("rancher/app", tags(&["v1"])).unwrap();
        let repositories = [
            repository("registry.one/rancher", true),
            repository("registry.two/rancher", false),
        ];
        let directives = artifact.to_sync_directives(&repositories);
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].target, "registry.one/rancher/mirrored-rancher-app:v1");
    }

    #[test]
    fn test_targeting_explicit_repositories() {
        let artifact = Artifact::new("rancher/app", tags(&["v1"]))
            .unwrap()
            .with_target_repositories(vec!["registry.two/rancher".to_string()]);
        let repositories = [
            repository("registry.one/rancher", true),
            repository("registry.two/rancher", false),
        ];
        let directives = artifact.to_sync_directives(&repositories);
        assert_eq!(directives.len(), 1);
        assert_eq!(directives[0].target, "registry.two/rancher/mirrored-rancher-app:v1");
    }

    #[test]
    fn test_directives_are_not_duplicated() {
        let artifact = Artifact::new("rancher/app", tags(&["v1", "v1"])).unwrap();
        let repositories = [
            repository("registry.one/rancher", true),
            repository("registry.one/rancher", true),
        ];
        assert_eq!(artifact.to_sync_directives(&repositories).len(), 1);
    }

    #[test]
    fn test_directive_order_is_repository_then_tag() {
        let artifact = Artifact::new("rancher/app", tags(&["v2", "v1"])).unwrap();
        let repositories = [
            repository("b.registry/rancher", true),
            repository("a.registry/rancher", true),
        ];
        let targets: Vec<_> = artifact
            .to_sync_directives(&repositories)
            .into_iter()
            .map(|d| d.target)
            .collect();
        assert_eq!(
            targets,
            vec![
                "b.registry/rancher/mirrored-rancher-app:v2",
                "b.registry/rancher/mirrored-rancher-app:v1",
                "a.registry/rancher/mirrored-rancher-app:v2",
                "a.registry/rancher/mirrored-rancher-app:v1",
            ]
        );
    }

    #[test]
    fn test_deserialize_do_not_mirror_shapes() {
        let artifact: Artifact =
            serde_yaml::from_str("SourceArtifact: rancher/app\nTags: [v1]\nDoNotMirror: true\n")
                .unwrap();
        assert_eq!(artifact.do_not_mirror(), &DoNotMirror::AllTags);

        let artifact: Artifact =
            serde_yaml::from_str("SourceArtifact: rancher/app\nDoNotMirror: false\n").unwrap();
        assert_eq!(artifact.do_not_mirror(), &DoNotMirror::Unset);

        let artifact: Artifact =
            serde_yaml::from_str("SourceArtifact: rancher/app\nDoNotMirror: [v1, v2]\n").unwrap();
        assert!(artifact.do_not_mirror().excludes("v2"));
        assert!(!artifact.do_not_mirror().excludes("v3"));

        let artifact: Artifact = serde_yaml::from_str("SourceArtifact: rancher/app\n").unwrap();
        assert!(artifact.do_not_mirror().is_unset());
    }

    #[test]
    fn test_deserialize_rejects_invalid_do_not_mirror() {
        let result: std::result::Result<Artifact, _> =
            serde_yaml::from_str("SourceArtifact: rancher/app\nDoNotMirror: nope\n");
        assert!(result.is_err());

        let result: std::result::Result<Artifact, _> =
            serde_yaml::from_str("SourceArtifact: rancher/app\nDoNotMirror: [v1, v1]\n");
        let message = result.unwrap_err().to_string();
        assert!(message.contains("duplicated"), "{message}");
    }

    #[test]
    fn test_deserialize_rejects_invalid_source() {
        let result: std::result::Result<Artifact, _> = serde_yaml::from_str("SourceArtifact: app\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_omits_defaults() {
        let artifact = Artifact::new("rancher/app", tags(&["v1"]))
            .unwrap()
            .with_target_artifact_name("mirrored-rancher-app");
        let yaml = serde_yaml::to_string(&artifact).unwrap();
        assert_eq!(yaml, "SourceArtifact: rancher/app\nTags:\n- v1\n");
    }

    #[test]
    fn test_serialize_keeps_overrides() {
        let artifact = Artifact::new("rancher/app", tags(&["v1"]))
            .unwrap()
            .with_target_artifact_name("app")
            .with_do_not_mirror(DoNotMirror::AllTags)
            .with_target_repositories(vec!["registry.one/rancher".to_string()]);
        let yaml = serde_yaml::to_string(&artifact).unwrap();
        assert_eq!(
            yaml,
            "DoNotMirror: true\nSourceArtifact: rancher/app\nTags:\n- v1\nTargetArtifactName: app\nTargetRepositories:\n- registry.one/rancher\n"
        );
    }
}
