//! Repository reaper.
//!
//! Deletes the on-disk clone of a repository once every present language
//! has been analyzed. Deleting an already-absent directory is a success:
//! delivery is at-least-once and replicas share the filesystem, so a
//! duplicate completion event must not turn into a fatal error.

use std::path::PathBuf;

use gc_core::{Error, Result};
use tracing::{info, warn};

/// Result of a reap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapOutcome {
    /// The directory tree existed and was removed.
    Deleted,
    /// Nothing on disk; treated as success for duplicate deliveries.
    AlreadyAbsent,
}

/// Deletes repository clone directories under a configured base path.
#[derive(Debug, Clone)]
pub struct Reaper {
    base_path: PathBuf,
}

impl Reaper {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Recursively removes `{base_path}/{repository_id}`.
    pub async fn delete(&self, repository_id: &str) -> Result<ReapOutcome> {
        let path = self.clone_path(repository_id)?;

        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => {
                info!(
                    repository_id = repository_id,
                    path = %path.display(),
                    "Deleted repository clone"
                );
                Ok(ReapOutcome::Deleted)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    repository_id = repository_id,
                    path = %path.display(),
                    "Repository clone already absent"
                );
                Ok(ReapOutcome::AlreadyAbsent)
            }
            Err(source) => Err(Error::Reap { path, source }),
        }
    }

    /// Resolves the clone directory for a repository id.
    ///
    /// The id becomes a single path component; anything that could escape
    /// the base path is rejected before touching the filesystem.
    fn clone_path(&self, repository_id: &str) -> Result<PathBuf> {
        if repository_id.is_empty()
            || repository_id == "."
            || repository_id == ".."
            || repository_id.contains('/')
            || repository_id.contains('\\')
        {
            return Err(Error::InvalidRepositoryId(repository_id.to_string()));
        }
        Ok(self.base_path.join(repository_id))
    }
}
