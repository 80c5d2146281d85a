//! Shared Directory Storage
//!
//! Local files a node offers to the network, one flat directory per node.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Flat directory of shared files
#[derive(Debug, Clone)]
pub struct SharedDir {
    root: PathBuf,
}

impl SharedDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reject anything that is not a plain, visible file name
    fn path_of(&self, filename: &str) -> Result<PathBuf> {
        let valid = !filename.is_empty()
            && !filename.starts_with('.')
            && !filename.contains(|c: char| matches!(c, '/' | '\\' | '\0'));
        if !valid {
            return Err(Error::InvalidFileName(filename.to_string()));
        }
        Ok(self.root.join(filename))
    }

    /// Names of the regular, non-hidden files, sorted
    ///
    /// Creates the directory on first use.
    pub async fn list(&self) -> Result<Vec<String>> {
        tokio::fs::create_dir_all(&self.root).await?;

        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Read a shared file
    pub async fn read(&self, filename: &str) -> Result<Vec<u8>> {
        let path = self.path_of(filename)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::FileNotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write (or overwrite) a shared file
    pub async fn write(&self, filename: &str, data: &[u8]) -> Result<()> {
        let path = self.path_of(filename)?;
        tokio::fs::create_dir_all(&self.root).await?;
        tokio::fs::write(&path, data).await?;
        Ok(())
    }

    /// Delete a shared file
    pub async fn remove(&self, filename: &str) -> Result<()> {
        let path = self.path_of(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::FileNotFound(filename.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create the node's default file if it is missing
    pub async fn ensure_default_file(&self, node_id: &str) -> Result<String> {
        let filename = format!("file_{}.txt", node_id);
        let path = self.path_of(&filename)?;
        tokio::fs::create_dir_all(&self.root).await?;
        if !tokio::fs::try_exists(&path).await? {
            tokio::fs::write(&path, b"").await?;
        }
        Ok(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_write_read_list() {
        let dir = tempdir().unwrap();
        let shared = SharedDir::new(dir.path().join("alice"));

        assert!(shared.list().await.unwrap().is_empty());

        shared.write("b.txt", b"bravo").await.unwrap();
        shared.write("a.txt", b"alpha").await.unwrap();
        tokio::fs::write(dir.path().join("alice/.hidden"), b"x").await.unwrap();
        tokio::fs::create_dir(dir.path().join("alice/subdir")).await.unwrap();

        assert_eq!(shared.list().await.unwrap(), vec!["a.txt", "b.txt"]);
        assert_eq!(shared.read("a.txt").await.unwrap(), b"alpha");
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let shared = SharedDir::new(dir.path());

        assert!(shared.read("nope.txt").await.unwrap_err().is_not_found());
        assert!(shared.remove("nope.txt").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = tempdir().unwrap();
        let shared = SharedDir::new(dir.path());

        for bad in ["../etc/passwd", "a/b", ".secret", "", ".."] {
            assert!(matches!(
                shared.read(bad).await,
                Err(Error::InvalidFileName(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_default_file_created_once() {
        let dir = tempdir().unwrap();
        let shared = SharedDir::new(dir.path());

        let name = shared.ensure_default_file("alice").await.unwrap();
        assert_eq!(name, "file_alice.txt");
        shared.write(&name, b"kept").await.unwrap();
        shared.ensure_default_file("alice").await.unwrap();

        assert_eq!(shared.read(&name).await.unwrap(), b"kept");
    }
}
