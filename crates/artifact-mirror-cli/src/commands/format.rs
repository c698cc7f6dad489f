//! Format command implementation.

use anyhow::{Context, Result};
use tracing::info;

use artifact_mirror_autoupdate::{load_entries, write_entries};
use artifact_mirror_core::Config;

use super::Paths;

/// Rewrites the config and autoupdate files in canonical order.
pub fn run(paths: &Paths) -> Result<()> {
    let mut config = Config::load(&paths.config_path)
        .with_context(|| format!("failed to parse {}", paths.config_path.display()))?;
    config
        .write(&paths.config_path)
        .with_context(|| format!("failed to write {}", paths.config_path.display()))?;
    info!(path = %paths.config_path.display(), "formatted config");

    let mut entries = load_entries(&paths.autoupdate_path)
        .with_context(|| format!("failed to parse {}", paths.autoupdate_path.display()))?;
    write_entries(&paths.autoupdate_path, &mut entries)
        .with_context(|| format!("failed to write {}", paths.autoupdate_path.display()))?;
    info!(path = %paths.autoupdate_path.display(), entries = entries.len(), "formatted autoupdate config");

    Ok(())
}
