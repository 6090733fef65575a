//! Refresh scheduler
//!
//! Fires every `refresh.interval_secs`. Each tick runs in its own task so a
//! slow fetch never delays the next tick; ordering of results is sorted out
//! by the generation check in [`AppState`].

use chrono::Local;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::state::{AppState, RefreshError};
use crate::config::RefreshConfig;

pub struct RefreshScheduler {
    state: AppState,
    config: RefreshConfig,
    handle: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    pub fn new(state: AppState, config: RefreshConfig) -> Self {
        Self {
            state,
            config,
            handle: None,
        }
    }

    /// Start ticking. The first tick comes one interval from now; startup
    /// has already seeded the dashboard.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            tracing::warn!("Refresh scheduler already running");
            return;
        }

        let state = self.state.clone();
        let config = self.config.clone();
        let period = Duration::from_secs(config.interval_secs.max(1));

        tracing::info!(
            "Scheduling dashboard refresh every {}s (timeout: {}s, relist: {})",
            period.as_secs(),
            config.timeout_secs,
            config.relist_each_tick
        );

        self.handle = Some(tokio::spawn(async move {
            Self::refresh_loop(state, config, period).await;
        }));
    }

    async fn refresh_loop(state: AppState, config: RefreshConfig, period: Duration) {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;

            let next = Local::now() + chrono::Duration::seconds(period.as_secs() as i64);
            tracing::debug!("Refresh tick; next at {}", next.format("%H:%M:%S"));

            let state = state.clone();
            let config = config.clone();
            tokio::spawn(async move {
                Self::run_refresh(&state, &config).await;
            });
        }
    }

    /// One bounded refresh; failures are logged and recorded, never propagated
    pub async fn run_refresh(state: &AppState, config: &RefreshConfig) -> bool {
        let timeout = Duration::from_secs(config.timeout_secs);
        let generation = state.next_generation();

        let refresh = state.refresh_as(generation, config.relist_each_tick);
        let result = match tokio::time::timeout(timeout, refresh).await {
            Ok(result) => result,
            Err(_) => Err(RefreshError::Timeout(config.timeout_secs)),
        };

        match result {
            Ok(()) => {
                tracing::info!("✓ Dashboard refresh {} published", generation);
                true
            }
            Err(e) => {
                tracing::error!(
                    "✗ Dashboard refresh {} failed, keeping previous values: {}",
                    generation,
                    e
                );
                state.record_failure(generation, &e).await;
                false
            }
        }
    }

    /// Stop ticking. Refreshes already in flight run to completion.
    pub async fn shutdown(mut self) {
        tracing::info!("Shutting down refresh scheduler...");

        if let Some(handle) = self.handle.take() {
            handle.abort();
        }

        tracing::info!("Refresh scheduler stopped");
    }
}
