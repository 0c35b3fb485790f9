//! Per-record output directory creation shared by all workers

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Creates each output directory once, however many workers ask for it.
///
/// The lock covers only the check-and-create step, never the download itself.
#[derive(Debug, Default)]
pub struct DirectoryProvisioner {
    created: Mutex<HashSet<PathBuf>>,
}

impl DirectoryProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `path` exists. Existing directories are not an error.
    pub async fn ensure(&self, path: &Path) -> std::io::Result<()> {
        let mut created = self.created.lock().await;
        if created.contains(path) {
            return Ok(());
        }
        if !path.is_dir() {
            debug!("Creating directory {}", path.display());
            tokio::fs::create_dir_all(path).await?;
        }
        created.insert(path.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ensure_same_path() {
        let root = TempDir::new().unwrap();
        let target = root.path().join("123");
        let provisioner = Arc::new(DirectoryProvisioner::new());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let provisioner = provisioner.clone();
            let target = target.clone();
            handles.push(tokio::spawn(async move { provisioner.ensure(&target).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert!(target.is_dir());
        let children: Vec<_> = std::fs::read_dir(root.path()).unwrap().collect();
        assert_eq!(children.len(), 1);
    }

    #[tokio::test]
    async fn test_existing_directory_is_noop() {
        let root = TempDir::new().unwrap();
        let target = root.path().join("already");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep.pdf"), b"data").unwrap();

        let provisioner = DirectoryProvisioner::new();
        provisioner.ensure(&target).await.unwrap();
        provisioner.ensure(&target).await.unwrap();

        assert!(target.join("keep.pdf").exists());
    }

    #[tokio::test]
    async fn test_creates_nested_directories() {
        let root = TempDir::new().unwrap();
        let target = root.path().join("a").join("b");

        DirectoryProvisioner::new().ensure(&target).await.unwrap();
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn test_file_in_the_way_is_an_error() {
        let root = TempDir::new().unwrap();
        let target = root.path().join("blocked");
        std::fs::write(&target, b"not a directory").unwrap();

        assert!(DirectoryProvisioner::new().ensure(&target).await.is_err());
    }
}
