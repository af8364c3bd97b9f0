use axum::{
    extract::{Multipart, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::db::store;
use crate::error::AppError;
use crate::ingest::{ingest_document, now_secs, IngestSummary};
use crate::scan::DocumentShape;
use crate::scrape::fetch_item_snapshot;

#[derive(Clone)]
pub struct ApiState {
    pub pool: sqlx::SqlitePool,
    pub cfg: Config,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/import", post(import_scan))
        .route("/items", get(get_items))
        .route("/items/:id/history", get(get_item_history))
        .route("/items/:id/refresh", post(refresh_item))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ItemResponse {
    pub id: i64,
    pub wow_item_id: Option<i64>,
    pub name: String,
    pub url: String,
    pub last_median_gold: Option<f64>,
    pub last_min_gold: Option<f64>,
    pub last_qty: Option<i64>,
    pub last_fetched_at: Option<i64>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub timestamp_utc: i64,
    pub median_gold: f64,
    pub min_gold: f64,
    pub qty: i64,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    pub id: i64,
    pub median_gold: f64,
    pub min_gold: f64,
    pub qty: i64,
    pub fetched_at: i64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Push path: upload a scan document and run it through the same pipeline as
/// the hourly fetch. Responds with the ingest counts instead of an opaque
/// error when entries fail to parse.
async fn import_scan(
    State(state): State<ApiState>,
    mut multipart: Multipart,
) -> Result<Json<IngestSummary>, AppError> {
    let mut text: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Upload(e.to_string()))?
    {
        if field.name() == Some("file") || field.file_name().is_some() {
            let body = field.text().await.map_err(|e| AppError::Upload(e.to_string()))?;
            text = Some(body);
            break;
        }
    }

    let text = match text {
        Some(t) if !t.is_empty() => t,
        _ => return Err(AppError::Upload("no scan file uploaded".to_string())),
    };

    let shape = DocumentShape::detect(&text);
    let summary = ingest_document(&state.pool, &state.cfg, &text, shape).await?;
    Ok(Json(summary))
}

async fn get_items(State(state): State<ApiState>) -> Result<Json<Vec<ItemResponse>>, AppError> {
    let mut conn = state.pool.acquire().await?;
    let rows = store::list_items(&mut conn).await?;

    let items = rows
        .into_iter()
        .map(|r| ItemResponse {
            id: r.id,
            wow_item_id: r.wow_item_id,
            name: r.name,
            url: r.url,
            last_median_gold: r.last_median_gold,
            last_min_gold: r.last_min_gold,
            last_qty: r.last_qty,
            last_fetched_at: r.last_fetched_at,
        })
        .collect();

    Ok(Json(items))
}

async fn get_item_history(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryResponse>>, AppError> {
    let limit = params.limit.unwrap_or(200);

    let mut conn = state.pool.acquire().await?;
    if store::get_item(&mut conn, id).await?.is_none() {
        return Err(AppError::NotFound(id));
    }

    let rows = store::history_for_item(&mut conn, id, limit).await?;
    let history = rows
        .into_iter()
        .map(|r| HistoryResponse {
            timestamp_utc: r.timestamp_utc,
            median_gold: r.median_gold,
            min_gold: r.min_gold,
            qty: r.qty,
        })
        .collect();

    Ok(Json(history))
}

/// On-demand single-item refresh: scrape the item's detail page and update
/// its last-known fields. History stays scan-driven.
async fn refresh_item(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<RefreshResponse>, AppError> {
    let mut conn = state.pool.acquire().await?;
    let item = store::get_item(&mut conn, id).await?.ok_or(AppError::NotFound(id))?;

    let snapshot = fetch_item_snapshot(&item.url).await?;

    let fetched_at = now_secs();
    store::update_last_prices(
        &mut conn,
        item.id,
        item.wow_item_id,
        snapshot.median_gold,
        snapshot.min_gold,
        snapshot.qty,
        fetched_at,
    )
    .await?;

    Ok(Json(RefreshResponse {
        id: item.id,
        median_gold: snapshot.median_gold,
        min_gold: snapshot.min_gold,
        qty: snapshot.qty,
        fetched_at,
    }))
}
