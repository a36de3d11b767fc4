//! Workspaces - durable staging areas shared across the tasks of one run
//!
//! A workspace is exclusively owned by a single run; content written by one
//! step is visible to later steps only through the same workspace binding.
//! Ordering between writers and readers comes from run_after edges, never
//! from declaration order.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// I/O failures scoped to the step touching the workspace
#[derive(Debug, Error)]
pub enum WorkspaceIoError {
    #[error("path '{0}' escapes the workspace")]
    InvalidPath(String),

    #[error("workspace '{workspace}' has no file at '{path}'")]
    NotFound { workspace: String, path: String },

    #[error("workspace I/O failed at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("workspace '{0}' is not backed by a local directory")]
    NotLocal(String),
}

/// A named, exclusively-owned mutable storage area bound to one run.
///
/// `clear` and `release` are idempotent: calling them on an empty or
/// already-removed area is not an error.
#[async_trait]
pub trait Workspace: Send + Sync {
    fn name(&self) -> &str;

    /// Make the workspace ready for use. Safe to call when it already exists.
    async fn provision(&self) -> Result<(), WorkspaceIoError>;

    /// Remove all content, leaving an empty workspace.
    async fn clear(&self) -> Result<(), WorkspaceIoError>;

    async fn write(&self, path: &str, content: &[u8]) -> Result<(), WorkspaceIoError>;

    async fn read(&self, path: &str) -> Result<Vec<u8>, WorkspaceIoError>;

    async fn exists(&self, path: &str) -> Result<bool, WorkspaceIoError>;

    /// All file paths currently in the workspace, relative, sorted.
    async fn list(&self) -> Result<Vec<String>, WorkspaceIoError>;

    /// Destroy the staging area.
    async fn release(&self) -> Result<(), WorkspaceIoError>;

    /// Local directory backing this workspace, when there is one.
    ///
    /// Fetchers that shell out need a real path to clone into.
    fn root_dir(&self) -> Option<PathBuf> {
        None
    }
}

/// Filesystem-backed workspace rooted at a dedicated directory.
#[derive(Debug, Clone)]
pub struct DirWorkspace {
    name: String,
    root: PathBuf,
}

impl DirWorkspace {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
        }
    }

    /// Resolve a workspace-relative path, rejecting anything that would
    /// escape the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, WorkspaceIoError> {
        let rel = Path::new(path);
        if rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(WorkspaceIoError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(rel))
    }

    fn io_err(path: &Path, source: std::io::Error) -> WorkspaceIoError {
        WorkspaceIoError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl Workspace for DirWorkspace {
    fn name(&self) -> &str {
        &self.name
    }

    async fn provision(&self) -> Result<(), WorkspaceIoError> {
        debug!("Provisioning workspace '{}' at {}", self.name, self.root.display());
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Self::io_err(&self.root, e))
    }

    async fn clear(&self) -> Result<(), WorkspaceIoError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            // Clearing a nonexistent area is a no-op, not an error.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(Self::io_err(&self.root, e)),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Self::io_err(&self.root, e))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| Self::io_err(&path, e))?;
            let result = if file_type.is_dir() {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_file(&path).await
            };
            match result {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(Self::io_err(&path, e)),
            }
        }

        Ok(())
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<(), WorkspaceIoError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_err(parent, e))?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| Self::io_err(&full, e))
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, WorkspaceIoError> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(WorkspaceIoError::NotFound {
                    workspace: self.name.clone(),
                    path: path.to_string(),
                })
            }
            Err(e) => Err(Self::io_err(&full, e)),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool, WorkspaceIoError> {
        let full = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&full)
            .await
            .map_err(|e| Self::io_err(&full, e))?)
    }

    async fn list(&self) -> Result<Vec<String>, WorkspaceIoError> {
        let mut files = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Self::io_err(&dir, e)),
            };
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Self::io_err(&dir, e))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| Self::io_err(&path, e))?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.root) {
                    files.push(rel.to_string_lossy().into_owned());
                }
            }
        }

        files.sort();
        Ok(files)
    }

    async fn release(&self) -> Result<(), WorkspaceIoError> {
        debug!("Releasing workspace '{}' at {}", self.name, self.root.display());
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err(&self.root, e)),
        }
    }

    fn root_dir(&self) -> Option<PathBuf> {
        Some(self.root.clone())
    }
}

/// In-memory workspace for tests and dry runs.
pub struct InMemoryWorkspace {
    name: String,
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryWorkspace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            files: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl Workspace for InMemoryWorkspace {
    fn name(&self) -> &str {
        &self.name
    }

    async fn provision(&self) -> Result<(), WorkspaceIoError> {
        Ok(())
    }

    async fn clear(&self) -> Result<(), WorkspaceIoError> {
        self.files.write().await.clear();
        Ok(())
    }

    async fn write(&self, path: &str, content: &[u8]) -> Result<(), WorkspaceIoError> {
        self.files
            .write()
            .await
            .insert(path.to_string(), content.to_vec());
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, WorkspaceIoError> {
        self.files
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| WorkspaceIoError::NotFound {
                workspace: self.name.clone(),
                path: path.to_string(),
            })
    }

    async fn exists(&self, path: &str) -> Result<bool, WorkspaceIoError> {
        Ok(self.files.read().await.contains_key(path))
    }

    async fn list(&self) -> Result<Vec<String>, WorkspaceIoError> {
        let mut files: Vec<String> = self.files.read().await.keys().cloned().collect();
        files.sort();
        Ok(files)
    }

    async fn release(&self) -> Result<(), WorkspaceIoError> {
        self.files.write().await.clear();
        Ok(())
    }
}
