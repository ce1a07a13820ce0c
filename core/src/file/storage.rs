//! Object store for uploaded bytes, rooted in a local directory.

use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `key` under the root. Keys are relative `/`-separated paths
    /// with no `.` or `..` segments.
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let plain = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !plain {
            return Err(Error::Storage(format!("Invalid storage key: {}", key)));
        }
        Ok(self.root.join(relative))
    }

    pub async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Storage(format!("Failed to create {:?}: {}", parent, e)))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| Error::Storage(format!("Failed to write {}: {}", key, e)))?;
        debug!(key, size = bytes.len(), "Object stored");
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| Error::Storage(format!("Failed to read {}: {}", key, e)))
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("Failed to delete {}: {}", key, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn put_get_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp_dir.path().join("uploads"));
        let key = "tasks/1/users/2/0_0_notes.csv";

        store.put(key, b"a,b\n1,2\n").await.unwrap();
        assert!(store.root().join(key).is_file());
        assert_eq!(store.get(key).await.unwrap(), b"a,b\n1,2\n");

        store.delete(key).await.unwrap();
        assert!(store.get(key).await.is_err());
        store.delete(key).await.unwrap();
    }

    #[tokio::test]
    async fn keys_cannot_escape_the_root() {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalObjectStore::new(temp_dir.path());

        for key in ["../outside.txt", "/etc/passwd", "tasks/../../x", "", "./a"] {
            assert!(
                matches!(store.put(key, b"x").await, Err(Error::Storage(_))),
                "{:?}",
                key
            );
        }
    }
}
