//! What the store currently holds: dated CSV prefixes and image names

use serde::Serialize;

use crate::storage::{ObjectStore, StorageError, is_csv, is_image};

/// Marker separating the date prefix from the dataset suffix in CSV names
const DATE_PREFIX_MARKER: &str = "web";

/// Substring identifying animated images
pub const GIF_MARKER: &str = ".gif";

/// Number of thumbnail slots on the page
pub const THUMBNAIL_SLOTS: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Catalog {
    /// Date prefixes, newest first
    pub dates: Vec<String>,
    /// Image names, newest first
    pub images: Vec<String>,
}

impl Catalog {
    pub fn new(csv_names: &[String], image_names: &[String]) -> Self {
        Self {
            dates: date_index(csv_names),
            images: newest_first(image_names),
        }
    }

    /// List the store once and build the catalog
    pub async fn from_store(store: &dyn ObjectStore) -> Result<Self, StorageError> {
        let names = store.list_objects().await?;
        let csv_names: Vec<String> = names.iter().filter(|n| is_csv(n)).cloned().collect();
        let image_names: Vec<String> = names.into_iter().filter(|n| is_image(n)).collect();
        let catalog = Self::new(&csv_names, &image_names);

        tracing::info!(
            "Store catalog: {} dates (latest: {}), {} images",
            catalog.dates.len(),
            catalog.latest_date().unwrap_or("none"),
            catalog.images.len()
        );

        Ok(catalog)
    }

    /// The prefix to load, if the store has any dated files
    pub fn latest_date(&self) -> Option<&str> {
        self.dates.first().map(String::as_str)
    }

    /// Most recent animated image
    pub fn last_gif(&self) -> Option<&str> {
        find_last(&self.images, GIF_MARKER)
    }

    /// Newest images for the thumbnail strip, padded with `None`
    pub fn thumbnails(&self) -> Vec<Option<&str>> {
        (0..THUMBNAIL_SLOTS)
            .map(|i| self.images.get(i).map(String::as_str))
            .collect()
    }
}

/// Date prefixes from CSV names: the text before "web", de-duplicated in
/// listing order, then reversed so the newest comes first. Names without the
/// marker carry no date and are skipped.
pub fn date_index(csv_names: &[String]) -> Vec<String> {
    let mut dates: Vec<String> = Vec::new();
    for name in csv_names {
        let Some(pos) = name.find(DATE_PREFIX_MARKER) else {
            tracing::debug!("Skipping CSV without date prefix: {}", name);
            continue;
        };
        let date = &name[..pos];
        if !dates.iter().any(|d| d == date) {
            dates.push(date.to_string());
        }
    }
    dates.reverse();
    dates
}

pub fn newest_first(names: &[String]) -> Vec<String> {
    names.iter().rev().cloned().collect()
}

/// First name containing `needle`, scanning in the given order
pub fn find_last<'a>(names: &'a [String], needle: &str) -> Option<&'a str> {
    names.iter().map(String::as_str).find(|name| name.contains(needle))
}
