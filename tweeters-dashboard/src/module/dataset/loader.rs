use std::sync::Arc;
use tweeters_common::{DatasetKind, MessageSnapshot, OccurrenceSnapshot};

use super::parser::{normalize_messages, parse_messages, parse_occurrences};
use crate::storage::{ObjectStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to fetch {name}: {source}")]
    Storage {
        name: String,
        #[source]
        source: StorageError,
    },

    #[error("failed to decode {name}: {source}")]
    Csv {
        name: String,
        #[source]
        source: csv::Error,
    },

    #[error("bad value in {name} row {row}: {message}")]
    Value {
        name: String,
        row: usize,
        message: String,
    },
}

/// Result of [`DatasetLoader::load`]
#[derive(Debug, Clone, PartialEq)]
pub enum Dataset {
    Messages(MessageSnapshot),
    Occurrences(OccurrenceSnapshot),
}

impl Dataset {
    pub fn kind(&self) -> DatasetKind {
        match self {
            Dataset::Messages(s) => s.kind,
            Dataset::Occurrences(s) => s.kind,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Dataset::Messages(s) => s.len(),
            Dataset::Occurrences(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn columns(&self) -> &[String] {
        match self {
            Dataset::Messages(s) => &s.columns,
            Dataset::Occurrences(s) => &s.columns,
        }
    }
}

/// Loads one dataset for one date prefix from the object store
#[derive(Clone)]
pub struct DatasetLoader {
    store: Arc<dyn ObjectStore>,
}

impl DatasetLoader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Fetch and normalize `kind` for `prefix`.
    ///
    /// `None` as prefix means the store holds no dated files at all; the
    /// result is an empty snapshot and nothing is fetched.
    pub async fn load(&self, kind: DatasetKind, prefix: Option<&str>) -> Result<Dataset, LoadError> {
        match kind {
            DatasetKind::Messages => self.load_messages(prefix).await.map(Dataset::Messages),
            DatasetKind::Occurrences => self.load_occurrences(prefix).await.map(Dataset::Occurrences),
        }
    }

    pub async fn load_messages(&self, prefix: Option<&str>) -> Result<MessageSnapshot, LoadError> {
        let owned_prefix = prefix.map(str::to_string);
        let Some((name, body)) = self.fetch(DatasetKind::Messages, prefix).await? else {
            return Ok(MessageSnapshot::empty(owned_prefix));
        };

        let records = normalize_messages(parse_messages(&name, &body)?);
        tracing::info!("Loaded {} displayable messages from {}", records.len(), name);
        Ok(MessageSnapshot::new(owned_prefix, records))
    }

    pub async fn load_occurrences(&self, prefix: Option<&str>) -> Result<OccurrenceSnapshot, LoadError> {
        let owned_prefix = prefix.map(str::to_string);
        let Some((name, body)) = self.fetch(DatasetKind::Occurrences, prefix).await? else {
            return Ok(OccurrenceSnapshot::empty(owned_prefix));
        };

        let records = parse_occurrences(&name, &body)?;
        tracing::info!("Loaded {} occurrences from {}", records.len(), name);
        Ok(OccurrenceSnapshot::new(owned_prefix, records))
    }

    /// Download the CSV body, or `None` when there is nothing to load
    async fn fetch(
        &self,
        kind: DatasetKind,
        prefix: Option<&str>,
    ) -> Result<Option<(String, String)>, LoadError> {
        let Some(prefix) = prefix else {
            tracing::info!("No dated files in store, using empty {} dataset", kind);
            return Ok(None);
        };

        let name = kind.object_name(prefix);
        match self.store.get_table(&name).await {
            Ok(body) => Ok(Some((name, body))),
            Err(StorageError::NotFound(_)) => {
                tracing::info!("No {} file {} found, using empty dataset", kind, name);
                Ok(None)
            }
            Err(source) => Err(LoadError::Storage { name, source }),
        }
    }
}
