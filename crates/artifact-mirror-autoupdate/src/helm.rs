//! Helm collaborator.
//!
//! [`HelmCli`] shells out to the `helm` executable: it adds the chart
//! repository under a temporary name, renders every requested release with
//! `helm template`, and removes the repository again whether or not
//! rendering succeeded.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{AutoUpdateError, Result};

/// Name the chart repository is registered under while rendering.
pub const TEMP_REPO_NAME: &str = "image-mirror-tools-temp";

/// One `helm template` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRequest {
    /// Chart name within the repository.
    pub chart: String,
    /// Environment name, used in the release name.
    pub environment: String,
    /// `--set` values.
    pub values: Vec<String>,
}

impl TemplateRequest {
    /// Returns the release name, `<chart>-<environment>`.
    #[must_use]
    pub fn release_name(&self) -> String {
        format!("{}-{}", self.chart, self.environment)
    }

    /// Returns the `helm template` arguments.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "template".to_string(),
            self.release_name(),
            format!("{TEMP_REPO_NAME}/{}", self.chart),
        ];
        for value in &self.values {
            args.push("--set".to_string());
            args.push(value.clone());
        }
        args
    }
}

/// Renders charts from a chart repository.
#[async_trait]
pub trait HelmTemplater: Send + Sync {
    /// Renders each request against `repo_url`, returning the multi-document
    /// YAML output of each in request order.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be added or any render fails.
    async fn render(&self, repo_url: &str, requests: &[TemplateRequest]) -> Result<Vec<String>>;
}

/// [`HelmTemplater`] backed by the `helm` executable.
#[derive(Debug, Clone)]
pub struct HelmCli {
    program: String,
}

impl Default for HelmCli {
    fn default() -> Self {
        Self {
            program: "helm".to_string(),
        }
    }
}

impl HelmCli {
    /// Uses `helm` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses another executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    async fn run<S: AsRef<str> + Sync>(&self, args: &[S]) -> Result<String> {
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        let command = format!("{} {}", self.program, args.join(" "));
        debug!(%command, "running helm");
        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|source| AutoUpdateError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(AutoUpdateError::CommandFailed {
                command,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn render_all(&self, requests: &[TemplateRequest]) -> Result<Vec<String>> {
        self.run(&["repo", "update"]).await?;
        let mut documents = Vec::with_capacity(requests.len());
        for request in requests {
            let args = request.args();
            documents.push(self.run(args.as_slice()).await?);
        }
        Ok(documents)
    }
}

#[async_trait]
impl HelmTemplater for HelmCli {
    async fn render(&self, repo_url: &str, requests: &[TemplateRequest]) -> Result<Vec<String>> {
        self.run(&["repo", "add", TEMP_REPO_NAME, repo_url]).await?;
        let rendered = self.render_all(requests).await;
        if let Err(e) = self.run(&["repo", "remove", TEMP_REPO_NAME]).await {
            warn!(error = %e, "failed to remove temporary helm repository");
        }
        rendered
    }
}
