//! Object store access
//!
//! The dashboard only ever reads: it lists object names and downloads CSV
//! bodies. "Not found" is reported as its own error variant so the loader
//! can treat a missing file as an empty dataset without swallowing real
//! failures.

mod directory;
mod gcs;

pub use directory::DirectoryStore;
pub use gcs::GcsStore;

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};

const IMAGE_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".gif"];

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("request for {name} failed with HTTP status {status}")]
    Status { name: String, status: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid listing response: {0}")]
    Listing(String),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

pub fn is_csv(name: &str) -> bool {
    name.to_lowercase().ends_with(".csv")
}

pub fn is_image(name: &str) -> bool {
    let lower = name.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Read-only view of the bucket the device publishes into
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Every object name in the store, in lexicographic order
    async fn list_objects(&self) -> Result<Vec<String>, StorageError>;

    /// Raw CSV body of `name`
    async fn get_table(&self, name: &str) -> Result<String, StorageError>;

    async fn list_csv_files(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.list_objects().await?.into_iter().filter(|n| is_csv(n)).collect())
    }

    async fn list_image_files(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.list_objects().await?.into_iter().filter(|n| is_image(n)).collect())
    }
}

/// Build the store selected by configuration
pub fn from_config(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    match config.backend {
        StorageBackend::Gcs => {
            tracing::info!("Using GCS bucket '{}'", config.bucket);
            Ok(Arc::new(GcsStore::new(&config.bucket)?))
        }
        StorageBackend::Directory => {
            tracing::info!("Using local directory '{}'", config.directory);
            Ok(Arc::new(DirectoryStore::new(&config.directory)))
        }
    }
}
