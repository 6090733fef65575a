//! Local directory mirror of the bucket

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{ObjectStore, StorageError};

pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn io_error(path: &Path, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[async_trait]
impl ObjectStore for DirectoryStore {
    async fn list_objects(&self) -> Result<Vec<String>, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| Self::io_error(&self.root, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Self::io_error(&self.root, e))?
        {
            let path = entry.path();
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| Self::io_error(&path, e))?;
            // Symlinks count when they resolve to a file; dangling ones are skipped
            let is_file = if file_type.is_symlink() {
                tokio::fs::metadata(&path)
                    .await
                    .map(|m| m.is_file())
                    .unwrap_or(false)
            } else {
                file_type.is_file()
            };
            if !is_file {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    async fn get_table(&self, name: &str) -> Result<String, StorageError> {
        let path = self.root.join(name);
        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(name.to_string()))
            }
            Err(e) => Err(Self::io_error(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_listing_is_sorted_and_split() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "2023-01-02webstream.csv",
            "2023-01-01webstream.csv",
            "2023-01-01-06-30-00.jpg",
            "2023-01-01-06-31-00.gif",
        ] {
            std::fs::write(dir.path().join(name), "x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let store = DirectoryStore::new(dir.path());
        assert_eq!(
            store.list_csv_files().await.unwrap(),
            ["2023-01-01webstream.csv", "2023-01-02webstream.csv"]
        );
        assert_eq!(
            store.list_image_files().await.unwrap(),
            ["2023-01-01-06-30-00.jpg", "2023-01-01-06-31-00.gif"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_files_are_listed() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("real.csv");
        std::fs::write(&target, "x").unwrap();
        std::os::unix::fs::symlink(&target, dir.path().join("2023-01-01webstream.csv")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.jpg"), dir.path().join("dangling.jpg"))
            .unwrap();

        let store = DirectoryStore::new(dir.path());
        assert_eq!(
            store.list_objects().await.unwrap(),
            ["2023-01-01webstream.csv", "real.csv"]
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path());
        let err = store.get_table("2023-01-01webstream.csv").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_missing_root_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(dir.path().join("absent"));
        let err = store.list_objects().await.unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }
}
