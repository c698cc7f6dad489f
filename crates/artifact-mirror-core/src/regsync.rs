//! Configuration document of the downstream sync tool (regsync).
//!
//! Only the fields this project writes are modelled. Keys are emitted in
//! alphabetical order to keep the generated file stable.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Banner written at the top of every generated sync file.
pub const GENERATED_BANNER: &str = "##################################################\n\
# THIS FILE IS AUTO-GENERATED. DO NOT MODIFY IT.\n\
##################################################\n";

/// User agent the sync tool presents to registries.
pub const DEFAULT_USER_AGENT: &str = "rancher-artifact-mirror";

/// Directive kind understood by the sync tool for images and Helm charts.
pub const IMAGE_KIND: &str = "image";

/// The whole sync tool configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegsyncConfig {
    /// One block per distinct registry credential.
    pub creds: Vec<RegsyncCred>,
    /// Defaults applied to every sync entry.
    pub defaults: RegsyncDefaults,
    /// The directives to execute.
    pub sync: Vec<SyncDirective>,
    /// Document version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

/// Credentials for one registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegsyncCred {
    /// Password or token.
    pub pass: String,
    /// Registry host.
    pub registry: String,
    /// Whether credentials are scoped per repository.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub repo_auth: bool,
    /// Maximum concurrent requests against the registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req_concurrent: Option<u32>,
    /// User name.
    pub user: String,
}

/// Settings applied to every sync entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RegsyncDefaults {
    /// User agent header.
    pub user_agent: String,
}

impl Default for RegsyncDefaults {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// One source to target copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncDirective {
    /// Full source reference including the tag.
    pub source: String,
    /// Full target reference including the tag.
    pub target: String,
    /// Directive kind, always `image` for this project.
    #[serde(rename = "type")]
    pub kind: String,
}

impl SyncDirective {
    /// Creates an image directive.
    pub fn image(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind: IMAGE_KIND.to_string(),
        }
    }
}

impl RegsyncConfig {
    /// Renders the document with the generated-file banner.
    ///
    /// # Errors
    ///
    /// Returns an error if YAML serialization fails.
    pub fn render(&self) -> Result<String> {
        let yaml = serde_yaml::to_string(self)?;
        Ok(format!("{GENERATED_BANNER}{yaml}"))
    }
}

/// Reads a sync file written by [`write_config`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not parse.
pub fn read_config(path: impl AsRef<Path>) -> Result<RegsyncConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(serde_yaml::from_str(&contents)?)
}

/// Writes `config` to `path`, replacing the whole file.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn write_config(path: impl AsRef<Path>, config: &RegsyncConfig) -> Result<()> {
    let path = path.as_ref();
    let contents = config.render()?;
    std::fs::write(path, contents).map_err(|e| Error::io(path, e))?;
    tracing::debug!(path = %path.display(), directives = config.sync.len(), "wrote sync file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RegsyncConfig {
        RegsyncConfig {
            creds: vec![RegsyncCred {
                pass: "{{ env \"PASS\" }}".to_string(),
                registry: "docker.io".to_string(),
                repo_auth: false,
                req_concurrent: Some(4),
                user: "{{ env \"USER\" }}".to_string(),
            }],
            defaults: RegsyncDefaults::default(),
            sync: vec![SyncDirective::image(
                "library/ubuntu:22.04",
                "docker.io/rancher/mirrored-library-ubuntu:22.04",
            )],
            version: None,
        }
    }

    #[test]
    fn test_render_starts_with_banner() {
        let rendered = sample().render().unwrap();
        assert!(rendered.starts_with(GENERATED_BANNER));
        assert!(rendered.contains("userAgent: rancher-artifact-mirror"));
        assert!(rendered.contains("reqConcurrent: 4"));
        assert!(!rendered.contains("repoAuth"));
        assert!(!rendered.contains("version"));
        assert!(rendered.contains("type: image"));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("regsync.yaml");

        write_config(&path, &sample()).unwrap();
        let read = read_config(&path).unwrap();
        assert_eq!(read, sample());
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_config(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
