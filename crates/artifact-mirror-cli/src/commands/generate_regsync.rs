//! Generate-regsync command implementation.

use anyhow::{Context, Result};
use tracing::info;

use artifact_mirror_core::{regsync, Config};

use super::Paths;

/// Regenerates the sync file from the config file.
pub fn run(paths: &Paths) -> Result<()> {
    let config = Config::load(&paths.config_path)
        .with_context(|| format!("failed to parse {}", paths.config_path.display()))?;
    let regsync_config = config.to_regsync_config();
    regsync::write_config(&paths.regsync_path, &regsync_config)
        .with_context(|| format!("failed to write {}", paths.regsync_path.display()))?;
    info!(
        path = %paths.regsync_path.display(),
        directives = regsync_config.sync.len(),
        "generated sync file"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generates_directives_for_default_targets() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths {
            config_path: dir.path().join("config.yaml"),
            autoupdate_path: dir.path().join("autoupdate.yaml"),
            regsync_path: dir.path().join("regsync.yaml"),
        };
        std::fs::write(
            &paths.config_path,
            "Artifacts:\n- SourceArtifact: library/ubuntu\n  Tags: ['24.04']\nRepositories:\n- BaseUrl: docker.io/rancher\n  DefaultTarget: true\n  Registry: docker.io\n",
        )
        .unwrap();

        run(&paths).unwrap();

        let written = regsync::read_config(&paths.regsync_path).unwrap();
        assert_eq!(written.sync.len(), 1);
        assert_eq!(written.sync[0].source, "library/ubuntu:24.04");
        assert_eq!(
            written.sync[0].target,
            "docker.io/rancher/mirrored-library-ubuntu:24.04"
        );
    }

    #[test]
    fn test_missing_config_fails() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths {
            config_path: dir.path().join("missing.yaml"),
            autoupdate_path: dir.path().join("autoupdate.yaml"),
            regsync_path: dir.path().join("regsync.yaml"),
        };
        let err = run(&paths).unwrap_err();
        assert!(err.to_string().starts_with("failed to parse"));
    }
}
