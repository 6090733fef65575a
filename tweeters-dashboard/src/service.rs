//! HTTP surface: the dashboard page plus a small JSON API over the same state

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::get,
};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tower_http::trace::TraceLayer;
use tweeters_common::MessageColumn;

use crate::module::renderer::DashboardRenderer;
use crate::module::state::{AppState, RefreshFailure};
use crate::module::view::{ChartSpec, TablePage, TableQuery, ViewSelection};

/// Raw query parameters. Everything is kept as text so a malformed value
/// falls back to its default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    /// Absent leaves the chart unfiltered; empty selects all species
    pub species: Option<String>,
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub desc: Option<String>,
    pub page: Option<String>,
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "on" | "yes")
}

impl DashboardQuery {
    pub fn table_query(&self) -> TableQuery {
        TableQuery {
            filter: self.filter.clone().filter(|f| !f.trim().is_empty()),
            sort: self.sort.as_deref().and_then(|s| MessageColumn::from_str(s).ok()),
            desc: self.desc.as_deref().is_some_and(parse_flag),
            page: self
                .page
                .as_deref()
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(0),
        }
    }

    pub fn selection(&self, known: &[String]) -> ViewSelection {
        let hour = |value: &Option<String>| value.as_deref().and_then(|v| v.trim().parse::<u32>().ok());
        ViewSelection::new(hour(&self.start), hour(&self.end), self.species.as_deref(), known)
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub generation: u64,
    pub prefix: Option<String>,
    pub refreshed_at: Option<DateTime<Local>>,
    pub rows: usize,
    pub occurrences: usize,
    pub species: Vec<String>,
    pub images: usize,
    pub last_error: Option<RefreshFailure>,
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn index(State(state): State<AppState>, Query(query): Query<DashboardQuery>) -> Html<String> {
    let published = state.published().await;
    let selection = query.selection(&published.dashboard.species());
    let renderer = DashboardRenderer::new(state.config());
    Html(renderer.render_page(&published, &selection, &query.table_query()))
}

async fn api_messages(State(state): State<AppState>, Query(query): Query<DashboardQuery>) -> Json<TablePage> {
    let published = state.published().await;
    Json(query.table_query().apply(&published.dashboard.rows))
}

async fn api_chart(State(state): State<AppState>, Query(query): Query<DashboardQuery>) -> Json<ChartSpec> {
    let published = state.published().await;
    let selection = query.selection(&published.dashboard.species());
    Json(selection.apply(&published.dashboard.chart))
}

async fn api_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let published = state.published().await;
    let dashboard = published.dashboard;
    Json(StatusResponse {
        generation: dashboard.generation,
        species: dashboard.species(),
        prefix: dashboard.prefix,
        refreshed_at: dashboard.refreshed_at,
        rows: dashboard.rows.len(),
        occurrences: dashboard.occurrence_count,
        images: dashboard.catalog.images.len(),
        last_error: published.last_error,
    })
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/messages", get(api_messages))
        .route("/api/chart", get(api_chart))
        .route("/api/status", get(api_status))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Serve until Ctrl-C
pub async fn serve(state: AppState, addr: &str) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Dashboard listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DashboardConfig;
    use crate::module::state::tests::{MemoryStore, sample_store};
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use std::sync::atomic::Ordering;
    use tower::ServiceExt;

    async fn get(router: Router, uri: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn seeded_router() -> Router {
        create_router(AppState::seed(sample_store(), DashboardConfig::default()).await)
    }

    #[test]
    fn test_query_defaults() {
        let query = DashboardQuery::default();
        let known = vec!["Northern Cardinal".to_string(), "Blue Jay".to_string()];

        assert_eq!(query.table_query(), TableQuery::default());
        let selection = query.selection(&known);
        assert_eq!((selection.hours.start, selection.hours.end), (6, 20));
        assert_eq!(selection.species.as_deref(), Some("Northern Cardinal"));
        assert!(!selection.hours_applied);
        assert!(!selection.species_applied);
    }

    #[test]
    fn test_query_parsing() {
        let query = DashboardQuery {
            start: Some("9".to_string()),
            end: Some("abc".to_string()),
            species: Some(String::new()),
            filter: Some("  ".to_string()),
            sort: Some("Date Time".to_string()),
            desc: Some("true".to_string()),
            page: Some("-1".to_string()),
        };
        let table = query.table_query();
        assert_eq!(table.filter, None);
        assert_eq!(table.sort, Some(MessageColumn::DateTime));
        assert!(table.desc);
        assert_eq!(table.page, 0);

        let selection = query.selection(&["Blue Jay".to_string()]);
        assert_eq!((selection.hours.start, selection.hours.end), (9, 20));
        assert_eq!(selection.species, None);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get(seeded_router().await, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
    }

    #[tokio::test]
    async fn test_index_page() {
        let (status, body) = get(seeded_router().await, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Tweeters - Sun Prairie, WI USA"));
        assert!(body.contains("Page last updated: "));
        assert!(body.contains("You have selected &quot;[6, 20]&quot;"));
        assert!(body.contains("You have selected Northern Cardinal"));
        assert!(body.contains("2023-01-01-14-00-00.gif"));
    }

    #[tokio::test]
    async fn test_index_tolerates_bad_query() {
        let (status, body) = get(seeded_router().await, "/?start=x&sort=&page=zz&species=Dodo").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("You have selected All species"));
    }

    #[tokio::test]
    async fn test_api_messages_filter() {
        let (status, body) = get(seeded_router().await, "/api/messages?filter=jay").await;
        assert_eq!(status, StatusCode::OK);

        let page: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(page["total_rows"], 1);
        assert_eq!(page["rows"][0]["Message"], "Blue Jay");
        assert_eq!(page["columns"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_api_chart_defaults_to_every_series_full_range() {
        let (_, body) = get(seeded_router().await, "/api/chart").await;
        let chart: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(chart["x_range"], serde_json::json!([4.0, 22.0]));
        assert_eq!(chart["series"].as_array().unwrap().len(), 2);

        let (_, body) = get(seeded_router().await, "/").await;
        assert!(body.contains("<title>Northern Cardinal: 2</title>"));
        assert!(body.contains("<title>Blue Jay: 1</title>"));
    }

    #[tokio::test]
    async fn test_api_chart_selection() {
        let (_, body) = get(seeded_router().await, "/api/chart?start=5&end=22&species=").await;
        let chart: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(chart["x_range"], serde_json::json!([5.0, 22.0]));
        assert_eq!(chart["series"].as_array().unwrap().len(), 2);

        let (_, body) = get(seeded_router().await, "/api/chart?species=Blue%20Jay").await;
        let chart: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(chart["series"].as_array().unwrap().len(), 1);
        assert_eq!(chart["series"][0]["name"], "Blue Jay");
    }

    #[tokio::test]
    async fn test_api_status_reports_failure() {
        let store = sample_store();
        let state = AppState::seed(store.clone(), DashboardConfig::default()).await;
        store.failing.store(true, Ordering::SeqCst);
        let generation = state.next_generation();
        if let Err(e) = state.refresh_as(generation, true).await {
            state.record_failure(generation, &e).await;
        }

        let (status, body) = get(create_router(state), "/api/status").await;
        assert_eq!(status, StatusCode::OK);
        let status: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(status["generation"], 1);
        assert_eq!(status["prefix"], "2023-01-01");
        assert_eq!(status["rows"], 2);
        assert_eq!(status["occurrences"], 3);
        assert!(status["last_error"]["message"].is_string());
    }

    #[tokio::test]
    async fn test_empty_store_still_renders() {
        let state = AppState::seed(MemoryStore::with(&[]), DashboardConfig::default()).await;
        let (status, body) = get(create_router(state), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("No occurrences recorded yet"));
        assert!(body.contains("You have selected All species"));
    }
}
