// Collection Tracker - Web Server
// REST API over the catalog, filters and ownership state

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use collection_tracker::{
    CatalogEntry, CatalogStore, Config, DirectoryLoader, FilterState, GroupSelection,
    OwnershipCount, OwnershipError, OwnershipState, OwnershipTracker, QueryEvaluator,
    WeightBucket,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    catalog: Arc<CatalogStore>,
    tracker: Arc<Mutex<OwnershipTracker>>,
    groups: Arc<Vec<String>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Entry plus its ownership flags
#[derive(Serialize)]
struct EntryResponse {
    #[serde(flatten)]
    entry: CatalogEntry,
    owned: bool,
    channels: std::collections::BTreeMap<String, bool>,
}

impl EntryResponse {
    fn new(entry: &CatalogEntry, tracker: &OwnershipTracker) -> Self {
        let channels = tracker
            .channels()
            .iter()
            .map(|c| (c.clone(), tracker.has(&entry.name, c)))
            .collect();

        Self {
            entry: entry.clone(),
            owned: tracker.is_owned(&entry.name),
            channels,
        }
    }
}

#[derive(Serialize)]
struct StatsResponse {
    all: OwnershipCount,
    groups: Vec<GroupStat>,
}

#[derive(Serialize)]
struct GroupStat {
    group: String,
    owned: usize,
    total: usize,
}

#[derive(Serialize)]
struct ToggleResponse {
    name: String,
    channel: String,
    value: bool,
    owned: bool,
}

/// Query parameters for /api/entries; multi-value facets are comma lists
#[derive(Debug, Default, Deserialize)]
struct EntriesQuery {
    group: Option<String>,
    search: Option<String>,
    #[serde(rename = "type")]
    types: Option<String>,
    rotation: Option<String>,
    weight: Option<String>,
    ownership: Option<String>,
}

fn split_list(value: &Option<String>) -> impl Iterator<Item = &str> {
    value
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl EntriesQuery {
    fn to_filter_state(&self) -> Result<FilterState, String> {
        let mut state = FilterState::new();

        if let Some(group) = &self.group {
            state.set_group(GroupSelection::from(group.as_str()));
        }
        if let Some(search) = &self.search {
            state.set_search(search);
        }
        state.types.extend(split_list(&self.types).map(String::from));
        state.rotations.extend(split_list(&self.rotation).map(String::from));
        for bucket in split_list(&self.weight) {
            state.weights.insert(bucket.parse::<WeightBucket>()?);
        }
        for ownership in split_list(&self.ownership) {
            state.ownership.insert(ownership.parse::<OwnershipState>()?);
        }

        Ok(state)
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/entries - Filtered entries in catalog order
async fn get_entries(
    State(state): State<AppState>,
    Query(query): Query<EntriesQuery>,
) -> impl IntoResponse {
    let filter = match query.to_filter_state() {
        Ok(filter) => filter,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<Vec<EntryResponse>>::err(e)),
            )
                .into_response()
        }
    };

    let tracker = match state.tracker.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let response: Vec<EntryResponse> = QueryEvaluator::evaluate(&state.catalog, &filter, &tracker)
        .into_iter()
        .map(|entry| EntryResponse::new(entry, &tracker))
        .collect();

    (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
}

/// GET /api/entries/:name - One entry
async fn get_entry(State(state): State<AppState>, Path(name): Path<String>) -> impl IntoResponse {
    let tracker = match state.tracker.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    match state.catalog.get(&name) {
        Some(entry) => (
            StatusCode::OK,
            Json(ApiResponse::ok(EntryResponse::new(entry, &tracker))),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<EntryResponse>::err(format!("No entry named '{}'", name))),
        )
            .into_response(),
    }
}

/// GET /api/stats - Owned/total per group
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    let tracker = match state.tracker.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    let summary = tracker.summary(&state.catalog, state.groups.as_slice());

    let stats = StatsResponse {
        all: summary.all,
        groups: summary
            .groups
            .into_iter()
            .map(|(group, count)| GroupStat {
                group,
                owned: count.owned,
                total: count.total,
            })
            .collect(),
    };

    Json(ApiResponse::ok(stats))
}

/// POST /api/owned/:name/:channel - Flip one acquisition flag
async fn toggle_owned(
    State(state): State<AppState>,
    Path((name, channel)): Path<(String, String)>,
) -> impl IntoResponse {
    if state.catalog.get(&name).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<ToggleResponse>::err(format!("No entry named '{}'", name))),
        )
            .into_response();
    }

    let mut tracker = match state.tracker.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    match tracker.toggle(&name, &channel) {
        Ok(value) => {
            let response = ToggleResponse {
                owned: tracker.is_owned(&name),
                name,
                channel,
                value,
            };
            (StatusCode::OK, Json(ApiResponse::ok(response))).into_response()
        }
        Err(e @ OwnershipError::UnknownChannel { .. }) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<ToggleResponse>::err(e.to_string())),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Toggle not persisted");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<ToggleResponse>::err(e.to_string())),
            )
                .into_response()
        }
    }
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(None).context("Failed to load configuration")?;

    let loader = DirectoryLoader::new(&config.data_dir);
    let catalog = CatalogStore::load_with_timeout(&loader, &config.partitions, config.partition_timeout())
        .await
        .with_context(|| format!("Failed to load catalog from {:?}", config.data_dir))?;

    let tracker = OwnershipTracker::with_channels(config.open_store()?, config.channels.clone())
        .context("Failed to open ownership store")?;

    let state = AppState {
        catalog: Arc::new(catalog),
        tracker: Arc::new(Mutex::new(tracker)),
        groups: Arc::new(config.partitions.clone()),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/entries", get(get_entries))
        .route("/entries/:name", get(get_entry))
        .route("/stats", get(get_stats))
        .route("/owned/:name/:channel", post(toggle_owned))
        .with_state(state);

    let app = Router::new()
        .nest("/api", api_routes)
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.server_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.server_addr))?;

    info!(addr = %config.server_addr, "Server running");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_query_to_filter_state() {
        let query = EntriesQuery {
            group: Some("X".to_string()),
            search: Some("dran".to_string()),
            types: Some("Attaque, Défense".to_string()),
            rotation: None,
            weight: Some("0-20,60+".to_string()),
            ownership: Some("owned".to_string()),
        };

        let state = query.to_filter_state().unwrap();
        assert_eq!(state.group, GroupSelection::Only("X".to_string()));
        assert_eq!(state.search, "dran");
        assert_eq!(state.types.len(), 2);
        assert!(state.rotations.is_empty());
        assert!(state.weights.contains(&WeightBucket::UpTo20));
        assert!(state.weights.contains(&WeightBucket::Over60));
        assert!(state.ownership.contains(&OwnershipState::Owned));
    }

    #[test]
    fn test_entries_query_rejects_unknown_bucket() {
        let query = EntriesQuery {
            weight: Some("heavy".to_string()),
            ..Default::default()
        };
        assert!(query.to_filter_state().is_err());
    }
}
