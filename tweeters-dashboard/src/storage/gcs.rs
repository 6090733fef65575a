//! Public Google Cloud Storage bucket over plain HTTPS
//!
//! Listing uses the JSON API (`/storage/v1/b/{bucket}/o`, paged with
//! `nextPageToken`); downloads use the XML endpoint
//! (`/{bucket}/{object}`). The bucket must be publicly readable.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use super::{ObjectStore, StorageError};

const GCS_BASE_URL: &str = "https://storage.googleapis.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const LIST_FIELDS: &str = "items(name),nextPageToken";

#[derive(Debug, Deserialize)]
struct ObjectItem {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<ObjectItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

pub struct GcsStore {
    client: Client,
    bucket: String,
    base_url: String,
}

impl GcsStore {
    pub fn new(bucket: &str) -> Result<Self, StorageError> {
        Self::with_base_url(bucket, GCS_BASE_URL)
    }

    /// Point at a different endpoint, e.g. a local storage emulator
    pub fn with_base_url(bucket: &str, base_url: &str) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("tweeters-dashboard/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            bucket: bucket.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn list_url(&self, page_token: Option<&str>) -> String {
        let mut url = format!(
            "{}/storage/v1/b/{}/o?fields={}",
            self.base_url,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(LIST_FIELDS)
        );
        if let Some(token) = page_token {
            url.push_str("&pageToken=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }

    fn object_url(&self, name: &str) -> String {
        // Keep '/' as a path separator, encode everything inside the segments
        let path = name
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}/{}", self.base_url, urlencoding::encode(&self.bucket), path)
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn list_objects(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = self.list_url(page_token.as_deref());
            tracing::debug!("Listing bucket page: {}", url);

            let response = self.client.get(&url).send().await?;
            if !response.status().is_success() {
                return Err(StorageError::Status {
                    name: format!("bucket listing of {}", self.bucket),
                    status: response.status().as_u16(),
                });
            }

            let body = response.text().await?;
            let page: ListResponse =
                serde_json::from_str(&body).map_err(|e| StorageError::Listing(e.to_string()))?;

            names.extend(page.items.into_iter().map(|item| item.name));

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        tracing::debug!("Bucket {} holds {} objects", self.bucket, names.len());
        Ok(names)
    }

    async fn get_table(&self, name: &str) -> Result<String, StorageError> {
        let url = self.object_url(name);
        tracing::debug!("Downloading {}", url);

        let response = self.client.get(&url).send().await?;
        match response.status() {
            status if status.is_success() => Ok(response.text().await?),
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(name.to_string())),
            status => Err(StorageError::Status {
                name: name.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}
