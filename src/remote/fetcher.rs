//! Source fetching - clones a repository into a workspace

use crate::workspace::Workspace;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Errors from fetching source into a workspace
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch from '{url}' failed: {reason}")]
    Failed { url: String, reason: String },

    #[error("fetch from '{url}' timed out after {timeout_secs}s")]
    Timeout { url: String, timeout_secs: u64 },

    #[error("workspace '{0}' has no local directory to fetch into")]
    NoLocalDir(String),

    #[error("fetcher internal error: {0}")]
    Internal(String),
}

/// The revision a fetch resolved to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision(pub String);

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fetches a source tree at a url/reference into a workspace.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Populate `workspace` with the tree at `url`/`reference` and report
    /// the concrete revision that was materialized.
    async fn fetch(
        &self,
        url: &str,
        reference: &str,
        workspace: &dyn Workspace,
    ) -> Result<Revision, FetchError>;
}

/// Fetcher that shells out to the git CLI
#[derive(Debug, Clone)]
pub struct GitCliFetcher {
    /// Path to git executable
    git_path: String,

    /// Timeout for a whole clone in seconds
    timeout_secs: u64,
}

impl GitCliFetcher {
    pub fn new(git_path: String, timeout_secs: u64) -> Self {
        Self {
            git_path,
            timeout_secs,
        }
    }

    async fn run_git(&self, args: &[&str], url: &str) -> Result<Vec<u8>, FetchError> {
        debug!("Spawning git {:?}", args);

        let result = timeout(
            Duration::from_secs(self.timeout_secs),
            Command::new(&self.git_path)
                .args(args)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| FetchError::Timeout {
            url: url.to_string(),
            timeout_secs: self.timeout_secs,
        })?;

        let output = result
            .map_err(|e| FetchError::Internal(format!("Failed to spawn git: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let exit_code = output.status.code().unwrap_or(-1);
            warn!("git exited with code {}: {}", exit_code, stderr.trim());
            return Err(FetchError::Failed {
                url: url.to_string(),
                reason: format!("git exited with code {}: {}", exit_code, stderr.trim()),
            });
        }

        Ok(output.stdout)
    }
}

impl Default for GitCliFetcher {
    fn default() -> Self {
        Self::new("git".to_string(), 300)
    }
}

#[async_trait]
impl SourceFetcher for GitCliFetcher {
    async fn fetch(
        &self,
        url: &str,
        reference: &str,
        workspace: &dyn Workspace,
    ) -> Result<Revision, FetchError> {
        let root = workspace
            .root_dir()
            .ok_or_else(|| FetchError::NoLocalDir(workspace.name().to_string()))?;
        let dest = root.to_string_lossy().into_owned();

        // A shallow clone of the requested reference is all the steps need.
        self.run_git(
            &[
                "clone",
                "--depth",
                "1",
                "--branch",
                reference,
                url,
                &dest,
            ],
            url,
        )
        .await?;

        let stdout = self
            .run_git(&["-C", &dest, "rev-parse", "HEAD"], url)
            .await?;
        let revision = String::from_utf8(stdout)
            .map_err(|e| FetchError::Internal(format!("Failed to decode git output: {}", e)))?
            .trim()
            .to_string();

        debug!("Fetched '{}' at {}", url, revision);
        Ok(Revision(revision))
    }
}
