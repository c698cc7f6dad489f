//! The `config.yaml` document.
//!
//! A [`Config`] lists every artifact to mirror and every repository it may
//! be mirrored to. It is the single source of truth from which the
//! downstream sync file is generated.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::accumulator::ArtifactAccumulator;
use crate::artifact::Artifact;
use crate::error::{Error, Result};
use crate::regsync::{RegsyncConfig, RegsyncCred, RegsyncDefaults};
use crate::validation::{Validate, ValidationError, ValidationErrors};

/// A mirror target.
///
/// Credential fields are passed through to the sync file untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Repository {
    /// Base URL target references are built from, e.g. `docker.io/rancher`.
    pub base_url: String,
    /// Whether artifacts without explicit target repositories go here.
    #[serde(default)]
    pub default_target: bool,
    /// Value of the sync file's `pass` field.
    #[serde(default)]
    pub password: String,
    /// Value of the sync file's `registry` field.
    #[serde(default)]
    pub registry: String,
    /// Value of the sync file's `repoAuth` field.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub repo_auth: bool,
    /// Value of the sync file's `reqConcurrent` field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_concurrent: Option<u32>,
    /// Value of the sync file's `user` field.
    #[serde(default)]
    pub username: String,
}

impl Repository {
    /// Creates a repository that is not a default target.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Sets whether this repository is a default target.
    #[must_use]
    pub const fn with_default_target(mut self, default_target: bool) -> Self {
        self.default_target = default_target;
        self
    }

    /// Sets the registry credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        registry: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.registry = registry.into();
        self.username = username.into();
        self.password = password.into();
        self
    }

    fn to_cred(&self) -> RegsyncCred {
        RegsyncCred {
            pass: self.password.clone(),
            registry: self.registry.clone(),
            repo_auth: self.repo_auth,
            req_concurrent: self.req_concurrent,
            user: self.username.clone(),
        }
    }
}

/// The whole `config.yaml` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    /// Artifacts to mirror.
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    /// Repositories to mirror to.
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

impl Config {
    /// Parses and validates a config document.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed, an artifact has an invalid
    /// source reference or `DoNotMirror` shape, or two artifacts share an
    /// identity.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config = Self::parse(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a config document without checking identities, so callers
    /// can report duplicates alongside other findings.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed or an artifact has an
    /// invalid source reference or `DoNotMirror` shape.
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Reads, parses and validates the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or fails
    /// [`Config::from_yaml`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config = Self::from_yaml(&contents)?;
        debug!(
            path = %path.display(),
            artifacts = config.artifacts.len(),
            repositories = config.repositories.len(),
            "loaded config"
        );
        Ok(config)
    }

    /// Renders the document as YAML in canonical order.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_yaml(&mut self) -> Result<String> {
        self.sort();
        Ok(serde_yaml::to_string(self)?)
    }

    /// Sorts and rewrites the whole file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn write(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let contents = self.to_yaml()?;
        std::fs::write(path, contents).map_err(|e| Error::io(path, e))
    }

    /// Sorts tags within each artifact, artifacts by identity and
    /// repositories by base URL. Both list sorts are stable.
    pub fn sort(&mut self) {
        for artifact in &mut self.artifacts {
            artifact.sort_tags();
        }
        self.artifacts.sort_by_key(Artifact::key);
        self.repositories
            .sort_by(|a, b| a.base_url.cmp(&b.base_url));
    }

    /// Returns an accumulator seeded with every configured artifact.
    #[must_use]
    pub fn accumulator(&self) -> ArtifactAccumulator {
        self.artifacts.iter().cloned().collect()
    }

    /// Replaces the artifact list with the accumulator's merged artifacts.
    pub fn replace_artifacts(&mut self, accumulator: &ArtifactAccumulator) {
        self.artifacts = accumulator.artifacts();
    }

    /// Derives the sync tool document.
    ///
    /// Credentials are deduplicated and ordered by registry; directives
    /// follow artifact list order.
    #[must_use]
    pub fn to_regsync_config(&self) -> RegsyncConfig {
        let mut creds: Vec<RegsyncCred> = self
            .repositories
            .iter()
            .map(Repository::to_cred)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        creds.sort_by(|a, b| a.registry.cmp(&b.registry));

        let sync = self
            .artifacts
            .iter()
            .flat_map(|artifact| artifact.to_sync_directives(&self.repositories))
            .collect();

        RegsyncConfig {
            creds,
            defaults: RegsyncDefaults::default(),
            sync,
            version: None,
        }
    }
}

impl Validate for Config {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut seen = BTreeSet::new();
        for artifact in &self.artifacts {
            let key = artifact.key();
            if !seen.insert(key.clone()) {
                errors.add(ValidationError::duplicate(
                    "Artifacts",
                    format!(
                        "SourceArtifact {:?} with TargetArtifactName {:?} is configured more than once",
                        key.source_artifact, key.target_artifact_name
                    ),
                ));
            }
        }
        errors.into_result()
    }
}
