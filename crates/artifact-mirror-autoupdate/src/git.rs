//! Git collaborator.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{AutoUpdateError, Result};

/// Working-tree operations needed to propose and validate changes.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Returns true if the working tree has no unstaged changes.
    ///
    /// # Errors
    ///
    /// Returns an error if git cannot be run.
    async fn is_working_tree_clean(&self) -> Result<bool>;

    /// Checks out `base` and creates `branch` from it.
    ///
    /// # Errors
    ///
    /// Returns an error if either checkout fails.
    async fn create_and_checkout_branch(&self, base: &str, branch: &str) -> Result<()>;

    /// Commits every tracked change with `message`.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails.
    async fn commit_all(&self, message: &str) -> Result<()>;

    /// Pushes `branch` to `remote`.
    ///
    /// # Errors
    ///
    /// Returns an error if the push fails.
    async fn push_branch(&self, branch: &str, remote: &str) -> Result<()>;

    /// Returns the merge base of `HEAD` and `branch`.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no common ancestor.
    async fn merge_base(&self, branch: &str) -> Result<String>;

    /// Returns the contents of `path` at `commit`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist at that commit.
    async fn file_at_commit(&self, commit: &str, path: &str) -> Result<String>;
}

/// [`VersionControl`] backed by the `git` executable.
#[derive(Debug, Clone, Default)]
pub struct GitCli {
    workdir: Option<PathBuf>,
}

impl GitCli {
    /// Runs git in the current directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs git in `workdir`.
    #[must_use]
    pub fn with_workdir(mut self, workdir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new("git");
        command.args(args);
        if let Some(workdir) = &self.workdir {
            command.current_dir(workdir);
        }
        command
    }

    async fn output(&self, args: &[&str]) -> Result<std::process::Output> {
        debug!(args = %args.join(" "), "running git");
        self.command(args)
            .output()
            .await
            .map_err(|source| AutoUpdateError::Spawn {
                program: "git".to_string(),
                source,
            })
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = self.output(args).await?;
        if !output.status.success() {
            return Err(AutoUpdateError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn is_working_tree_clean(&self) -> Result<bool> {
        Ok(self.output(&["diff", "--quiet"]).await?.status.success())
    }

    async fn create_and_checkout_branch(&self, base: &str, branch: &str) -> Result<()> {
        self.run(&["checkout", base]).await?;
        self.run(&["checkout", "-b", branch]).await?;
        Ok(())
    }

    async fn commit_all(&self, message: &str) -> Result<()> {
        self.run(&["commit", "--all", "--message", message]).await?;
        Ok(())
    }

    async fn push_branch(&self, branch: &str, remote: &str) -> Result<()> {
        self.run(&["push", remote, branch]).await?;
        Ok(())
    }

    async fn merge_base(&self, branch: &str) -> Result<String> {
        Ok(self.run(&["merge-base", "HEAD", branch]).await?.trim().to_string())
    }

    async fn file_at_commit(&self, commit: &str, path: &str) -> Result<String> {
        let object = format!("{commit}:{path}");
        self.run(&["show", &object]).await
    }
}
