use tweeters_dashboard::config::{self, DashboardConfig};
use tweeters_dashboard::module::scheduled::RefreshScheduler;
use tweeters_dashboard::module::state::AppState;
use tweeters_dashboard::{logging, net, service, storage};

use anyhow::{Context, Result};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let (config, from_file) = DashboardConfig::load()?;

    // Initialize logging
    let _logging_guard = logging::init_logging(&config.log_dir, "tweeters-dashboard", &config.log_level)?;

    tracing::info!("Tweeters dashboard starting...");
    if !from_file {
        tracing::warn!(
            "No config file found (set {} to point at one), using defaults",
            config::CONFIG_PATH_ENV
        );
    }
    tracing::info!("Storage backend: {:?}", config.storage.backend);

    let store = storage::from_config(&config.storage).context("Failed to create object store")?;

    // Seed synchronously so the first page already has data
    let state = AppState::seed(store, config.clone()).await;

    let mut scheduler = RefreshScheduler::new(state.clone(), config.refresh.clone());
    scheduler.start();

    let addr = net::bind_address(&config.server);
    let result = service::serve(state, &addr).await;

    scheduler.shutdown().await;
    tracing::info!("Tweeters dashboard stopped");

    result.with_context(|| format!("HTTP server on {} failed", addr))
}
