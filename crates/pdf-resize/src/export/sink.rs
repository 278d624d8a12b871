//! Output destinations

use crate::types::Result;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Where export bytes end up.
///
/// Operations are assumed reliable; the orchestrator does not retry them.
pub trait Sink: Send + Sync + 'static {
    fn exists(&self, path: &Path) -> impl Future<Output = Result<bool>> + Send;

    fn write(&self, path: &Path, bytes: Vec<u8>) -> impl Future<Output = Result<()>> + Send;

    fn create_dir_all(&self, path: &Path) -> impl Future<Output = Result<()>> + Send;

    /// Entries of a directory; a missing directory lists as empty
    fn list_dir(&self, path: &Path) -> impl Future<Output = Result<Vec<PathBuf>>> + Send;

    /// Existence of many paths at once, in input order
    fn exists_all(&self, paths: &[PathBuf]) -> impl Future<Output = Result<Vec<bool>>> + Send {
        async move {
            let mut found = Vec::with_capacity(paths.len());
            for path in paths {
                found.push(self.exists(path).await?);
            }
            Ok(found)
        }
    }
}

/// Local filesystem sink
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSink;

impl Sink for FsSink {
    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn write(&self, path: &Path, bytes: Vec<u8>) -> Result<()> {
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn list_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            paths.push(entry.path());
        }
        paths.sort();
        Ok(paths)
    }
}
