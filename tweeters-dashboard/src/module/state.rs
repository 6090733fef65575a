//! Application state shared by the refresh scheduler and HTTP handlers
//!
//! Built once at startup by [`AppState::seed`]. Each refresh produces a whole
//! new [`Dashboard`] and replaces the published one; nothing is mutated in
//! place. Refreshes are numbered, and a refresh that finishes after a newer
//! one has already published is discarded.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tweeters_common::{ColumnDef, MessageSnapshot, OccurrenceSnapshot};

use super::dataset::{Catalog, DatasetLoader, LoadError};
use super::view::{ChartSpec, TableRow, histogram, table_columns, table_rows};
use crate::config::DashboardConfig;
use crate::storage::{ObjectStore, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("failed to list store: {0}")]
    Listing(#[from] StorageError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("refresh timed out after {0} seconds")]
    Timeout(u64),
}

/// Everything the page shows, derived from one refresh
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    /// Refresh number that produced this value; 0 before the first success
    pub generation: u64,
    pub prefix: Option<String>,
    pub catalog: Catalog,
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<TableRow>,
    pub chart: ChartSpec,
    pub occurrence_count: usize,
    pub refreshed_at: Option<DateTime<Local>>,
}

impl Dashboard {
    pub fn build(
        generation: u64,
        catalog: Catalog,
        messages: &MessageSnapshot,
        occurrences: &OccurrenceSnapshot,
        refreshed_at: DateTime<Local>,
    ) -> Self {
        Self {
            generation,
            prefix: messages.prefix.clone(),
            catalog,
            columns: table_columns(),
            rows: table_rows(messages),
            chart: histogram(occurrences),
            occurrence_count: occurrences.len(),
            refreshed_at: Some(refreshed_at),
        }
    }

    /// Static chrome only, shown until the first refresh succeeds
    pub fn placeholder() -> Self {
        Self {
            generation: 0,
            prefix: None,
            catalog: Catalog::default(),
            columns: table_columns(),
            rows: Vec::new(),
            chart: histogram(&OccurrenceSnapshot::empty(None)),
            occurrence_count: 0,
            refreshed_at: None,
        }
    }

    /// Species offered by the selector
    pub fn species(&self) -> Vec<String> {
        self.chart.names()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshFailure {
    /// Generation of the refresh that failed
    pub generation: u64,
    pub message: String,
    pub at: DateTime<Local>,
}

/// Last published dashboard plus the most recent failure since then
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Published {
    pub dashboard: Dashboard,
    pub last_error: Option<RefreshFailure>,
}

struct Inner {
    store: Arc<dyn ObjectStore>,
    loader: DatasetLoader,
    config: DashboardConfig,
    /// None until a listing has succeeded
    catalog: RwLock<Option<Catalog>>,
    published: RwLock<Published>,
    next_generation: AtomicU64,
}

#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

impl AppState {
    /// Empty state; nothing has been listed or loaded yet
    pub fn new(store: Arc<dyn ObjectStore>, config: DashboardConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                loader: DatasetLoader::new(store.clone()),
                store,
                config,
                catalog: RwLock::new(None),
                published: RwLock::new(Published {
                    dashboard: Dashboard::placeholder(),
                    last_error: None,
                }),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Startup sequence: list the store, pick the newest date, load both
    /// datasets and publish. A failure leaves the placeholder dashboard up
    /// with an error banner; the scheduler keeps trying.
    pub async fn seed(store: Arc<dyn ObjectStore>, config: DashboardConfig) -> Self {
        let state = Self::new(store, config);
        let generation = state.next_generation();
        match state.refresh_as(generation, true).await {
            Ok(()) => tracing::info!("Dashboard seeded (generation {})", generation),
            Err(e) => {
                tracing::error!("Initial dashboard load failed: {}", e);
                state.record_failure(generation, &e).await;
            }
        }
        state
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    /// Re-list the store and keep the new catalog for later refreshes
    pub async fn reseed(&self) -> Result<Catalog, StorageError> {
        let catalog = Catalog::from_store(self.inner.store.as_ref()).await?;
        *self.inner.catalog.write().await = Some(catalog.clone());
        Ok(catalog)
    }

    /// Reserve the number the next refresh publishes as
    pub fn next_generation(&self) -> u64 {
        self.inner.next_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// One load/derive/publish cycle. Returns the generation it published as.
    pub async fn refresh(&self, relist: bool) -> Result<u64, RefreshError> {
        let generation = self.next_generation();
        self.refresh_as(generation, relist).await?;
        Ok(generation)
    }

    /// Refresh under a generation reserved with [`AppState::next_generation`].
    ///
    /// The cached catalog is used unless `relist` is set or no listing has
    /// succeeded yet.
    pub async fn refresh_as(&self, generation: u64, relist: bool) -> Result<(), RefreshError> {
        let cached = if relist {
            None
        } else {
            self.inner.catalog.read().await.clone()
        };
        let catalog = match cached {
            Some(catalog) => catalog,
            None => self.reseed().await?,
        };

        let prefix = catalog.latest_date();
        let (messages, occurrences) = tokio::try_join!(
            self.inner.loader.load_messages(prefix),
            self.inner.loader.load_occurrences(prefix),
        )?;

        let dashboard = Dashboard::build(generation, catalog, &messages, &occurrences, Local::now());
        tracing::info!(
            "Refresh {}: {} table rows, {} occurrences, {} species",
            generation,
            dashboard.rows.len(),
            dashboard.occurrence_count,
            dashboard.chart.series.len()
        );

        self.publish(dashboard).await;
        Ok(())
    }

    /// Replace the published dashboard unless a newer one is already there
    async fn publish(&self, dashboard: Dashboard) -> bool {
        let mut published = self.inner.published.write().await;
        if dashboard.generation <= published.dashboard.generation {
            tracing::debug!(
                "Discarding refresh {} (generation {} already published)",
                dashboard.generation,
                published.dashboard.generation
            );
            return false;
        }
        if published
            .last_error
            .as_ref()
            .is_some_and(|failure| failure.generation < dashboard.generation)
        {
            published.last_error = None;
        }
        published.dashboard = dashboard;
        true
    }

    /// Keep the current dashboard and remember why the refresh failed.
    /// A failure older than the published dashboard is dropped.
    pub async fn record_failure(&self, generation: u64, error: &RefreshError) -> bool {
        let mut published = self.inner.published.write().await;
        if generation <= published.dashboard.generation {
            tracing::debug!(
                "Ignoring failure of refresh {} (generation {} already published)",
                generation,
                published.dashboard.generation
            );
            return false;
        }
        let newer_failure_recorded = published
            .last_error
            .as_ref()
            .is_some_and(|failure| failure.generation > generation);
        if !newer_failure_recorded {
            published.last_error = Some(RefreshFailure {
                generation,
                message: error.to_string(),
                at: Local::now(),
            });
        }
        true
    }

    pub async fn published(&self) -> Published {
        self.inner.published.read().await.clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::sync::Mutex;

    /// In-memory store whose listing can be made to fail
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub objects: Mutex<BTreeMap<String, String>>,
        pub failing: AtomicBool,
        pub listings: AtomicUsize,
    }

    impl MemoryStore {
        pub fn with(objects: &[(&str, &str)]) -> Arc<Self> {
            let store = Self::default();
            {
                let mut map = store.objects.lock().unwrap();
                for (name, body) in objects {
                    map.insert(name.to_string(), body.to_string());
                }
            }
            Arc::new(store)
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn list_objects(&self) -> Result<Vec<String>, StorageError> {
            self.listings.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(StorageError::Status {
                    name: "listing".to_string(),
                    status: 503,
                });
            }
            Ok(self.objects.lock().unwrap().keys().cloned().collect())
        }

        async fn get_table(&self, name: &str) -> Result<String, StorageError> {
            self.objects
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .ok_or_else(|| StorageError::NotFound(name.to_string()))
        }
    }

    pub(crate) const OCCURRENCES_CSV: &str = "\
,Species,Date Time
0,7. Cardinalis cardinalis (Northern Cardinal),2023-01-01 06:30:00
1,7. Cardinalis cardinalis (Northern Cardinal),2023-01-01 06:30:40
2,2. Cyanocitta cristata (Blue Jay),2023-01-01 14:00:00
";

    pub(crate) const MESSAGES_CSV: &str = "\
,Event Num,Message Type,Date Time,Message,Image Name
0,0,start,2023-01-01 05:00:00,Starting up,
1,1,spotted,2023-01-01 06:30:00,Northern Cardinal,2023-01-01-06-30-00.jpg
2,2,possible,2023-01-01 14:00:00,Blue Jay,2023-01-01-14-00-00.gif
";

    pub(crate) fn sample_store() -> Arc<MemoryStore> {
        MemoryStore::with(&[
            ("2022-12-31webstream.csv", "Event Num,Message Type,Date Time,Message,Image Name\n"),
            ("2023-01-01web_occurrences.csv", OCCURRENCES_CSV),
            ("2023-01-01webstream.csv", MESSAGES_CSV),
            ("2023-01-01-06-30-00.jpg", ""),
            ("2023-01-01-14-00-00.gif", ""),
        ])
    }

    #[tokio::test]
    async fn test_seed_picks_newest_date() {
        let state = AppState::seed(sample_store(), DashboardConfig::default()).await;
        let published = state.published().await;
        let dashboard = &published.dashboard;

        assert!(published.last_error.is_none());
        assert_eq!(dashboard.generation, 1);
        assert_eq!(dashboard.prefix.as_deref(), Some("2023-01-01"));
        assert_eq!(dashboard.catalog.dates, ["2023-01-01", "2022-12-31"]);
        assert_eq!(dashboard.catalog.last_gif(), Some("2023-01-01-14-00-00.gif"));
        assert_eq!(dashboard.rows.len(), 2);
        assert_eq!(dashboard.rows[0].message, "Blue Jay");
        assert_eq!(dashboard.chart.count_at("Northern Cardinal", 6.5), 2);
        assert_eq!(dashboard.chart.count_at("Blue Jay", 14.0), 1);
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent_for_unchanged_data() {
        let state = AppState::seed(sample_store(), DashboardConfig::default()).await;
        let first = state.published().await.dashboard;
        state.refresh(true).await.unwrap();
        let second = state.published().await.dashboard;

        assert_eq!(second.generation, first.generation + 1);
        assert_eq!(first.rows, second.rows);
        assert_eq!(first.columns, second.columns);
        assert_eq!(first.chart, second.chart);
        assert_eq!(
            serde_json::to_string(&first.rows).unwrap(),
            serde_json::to_string(&second.rows).unwrap()
        );
    }

    #[tokio::test]
    async fn test_empty_store_seeds_empty_dashboard() {
        let state = AppState::seed(MemoryStore::with(&[]), DashboardConfig::default()).await;
        let published = state.published().await;
        assert!(published.last_error.is_none());
        assert!(published.dashboard.rows.is_empty());
        assert_eq!(published.dashboard.columns.len(), 5);
        assert!(published.dashboard.chart.is_empty());
        assert!(published.dashboard.prefix.is_none());
    }

    #[tokio::test]
    async fn test_missing_message_file_renders_empty_table() {
        let store = MemoryStore::with(&[("2023-01-01web_occurrences.csv", OCCURRENCES_CSV)]);
        let state = AppState::seed(store, DashboardConfig::default()).await;
        let dashboard = state.published().await.dashboard;
        assert!(dashboard.rows.is_empty());
        assert_eq!(dashboard.columns.len(), 5);
        assert_eq!(dashboard.occurrence_count, 3);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_values() {
        let store = sample_store();
        let state = AppState::seed(store.clone(), DashboardConfig::default()).await;
        let before = state.published().await.dashboard;

        store.failing.store(true, Ordering::SeqCst);
        let generation = state.next_generation();
        let err = state.refresh_as(generation, true).await.unwrap_err();
        assert!(matches!(err, RefreshError::Listing(_)));
        assert!(state.record_failure(generation, &err).await);

        let after = state.published().await;
        assert_eq!(after.dashboard, before);
        assert!(after.last_error.unwrap().message.contains("503"));

        // Recovery clears the banner
        store.failing.store(false, Ordering::SeqCst);
        state.refresh(true).await.unwrap();
        assert!(state.published().await.last_error.is_none());
    }

    #[tokio::test]
    async fn test_refresh_without_relist_uses_seeded_catalog() {
        let store = sample_store();
        let state = AppState::seed(store.clone(), DashboardConfig::default()).await;

        store.objects.lock().unwrap().insert(
            "2023-01-02webstream.csv".to_string(),
            MESSAGES_CSV.to_string(),
        );
        state.refresh(false).await.unwrap();
        assert_eq!(state.published().await.dashboard.prefix.as_deref(), Some("2023-01-01"));

        state.refresh(true).await.unwrap();
        assert_eq!(state.published().await.dashboard.prefix.as_deref(), Some("2023-01-02"));
    }

    #[tokio::test]
    async fn test_stale_generation_is_discarded() {
        let state = AppState::seed(sample_store(), DashboardConfig::default()).await;
        let current = state.published().await.dashboard;

        let mut stale = Dashboard::placeholder();
        stale.generation = current.generation;
        assert!(!state.publish(stale).await);
        assert_eq!(state.published().await.dashboard, current);
    }

    #[tokio::test]
    async fn test_seed_failure_shows_placeholder_and_banner() {
        let store = sample_store();
        store.failing.store(true, Ordering::SeqCst);
        let state = AppState::seed(store, DashboardConfig::default()).await;
        let published = state.published().await;
        assert_eq!(published.dashboard, Dashboard::placeholder());
        assert!(published.last_error.is_some());
    }

    #[tokio::test]
    async fn test_failed_seed_relists_when_ticks_do_not() {
        let store = sample_store();
        store.failing.store(true, Ordering::SeqCst);
        let state = AppState::seed(store.clone(), DashboardConfig::default()).await;
        assert!(state.published().await.last_error.is_some());

        // While the store is still down a non-relisting tick keeps failing visibly
        let generation = state.next_generation();
        let err = state.refresh_as(generation, false).await.unwrap_err();
        assert!(matches!(err, RefreshError::Listing(_)));
        state.record_failure(generation, &err).await;
        assert_eq!(state.published().await.dashboard.generation, 0);

        store.failing.store(false, Ordering::SeqCst);
        state.refresh(false).await.unwrap();
        let published = state.published().await;
        assert_eq!(published.dashboard.prefix.as_deref(), Some("2023-01-01"));
        assert_eq!(published.dashboard.rows.len(), 2);
        assert!(published.last_error.is_none());

        // The catalog is cached from here on
        let listings = store.listings.load(Ordering::SeqCst);
        state.refresh(false).await.unwrap();
        assert_eq!(store.listings.load(Ordering::SeqCst), listings);
    }

    #[tokio::test]
    async fn test_stale_failure_does_not_flag_newer_data() {
        let store = sample_store();
        let state = AppState::seed(store.clone(), DashboardConfig::default()).await;

        // An older tick fails after a newer one has already published
        let slow = state.next_generation();
        let fast = state.refresh(true).await.unwrap();
        assert!(fast > slow);

        assert!(!state.record_failure(slow, &RefreshError::Timeout(120)).await);
        let published = state.published().await;
        assert_eq!(published.dashboard.generation, fast);
        assert!(published.last_error.is_none());
    }

    #[tokio::test]
    async fn test_older_success_keeps_newer_failure_banner() {
        let store = sample_store();
        let state = AppState::seed(store.clone(), DashboardConfig::default()).await;

        let older = state.next_generation();
        let newer = state.next_generation();
        assert!(state.record_failure(newer, &RefreshError::Timeout(120)).await);

        state.refresh_as(older, true).await.unwrap();
        let published = state.published().await;
        assert_eq!(published.dashboard.generation, older);
        assert_eq!(published.last_error.unwrap().generation, newer);
    }

    #[tokio::test]
    async fn test_reseed_lists_store_once() {
        let store = sample_store();
        let state = AppState::new(store.clone(), DashboardConfig::default());

        let catalog = state.reseed().await.unwrap();
        assert_eq!(store.listings.load(Ordering::SeqCst), 1);
        assert_eq!(catalog.dates, ["2023-01-01", "2022-12-31"]);
        assert_eq!(catalog.images, ["2023-01-01-14-00-00.gif", "2023-01-01-06-30-00.jpg"]);
    }
}
