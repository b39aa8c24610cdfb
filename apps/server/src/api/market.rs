use std::sync::Arc;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use finboard_market_data::{FixedIncomeInstrument, Quote, QuoteBatch, SourceState};
use serde::Deserialize;

#[derive(Deserialize)]
struct QuotesQuery {
    /// Comma-separated tickers.
    symbols: Option<String>,
}

#[derive(Deserialize)]
struct ResetQuery {
    source: Option<String>,
}

/// Single ticker; 404 when no source has data for it.
async fn get_quote(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> ApiResult<Json<Quote>> {
    state
        .aggregator
        .get_quote(&ticker)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No quote available for '{}'", ticker.trim())))
}

async fn get_quotes(
    State(state): State<Arc<AppState>>,
    Query(q): Query<QuotesQuery>,
) -> ApiResult<Json<Arc<QuoteBatch>>> {
    let raw = q
        .symbols
        .ok_or_else(|| ApiError::BadRequest("Missing 'symbols' query parameter".to_string()))?;
    let symbols: Vec<&str> = raw.split(',').collect();

    let batch = state
        .aggregator
        .get_quotes_with_deadline(&symbols, state.request_timeout)
        .await;
    Ok(Json(batch))
}

async fn list_top_movers(State(state): State<Arc<AppState>>) -> Json<Arc<Vec<Quote>>> {
    Json(state.aggregator.list_top_movers().await)
}

async fn list_fixed_income(
    State(state): State<Arc<AppState>>,
) -> Json<Arc<Vec<FixedIncomeInstrument>>> {
    Json(state.aggregator.list_fixed_income_instruments().await)
}

async fn list_indices(State(state): State<Arc<AppState>>) -> Json<Arc<QuoteBatch>> {
    Json(state.aggregator.list_market_indices().await)
}

async fn list_sources(State(state): State<Arc<AppState>>) -> Json<Vec<SourceState>> {
    Json(state.aggregator.source_states())
}

/// Clear degradation for one source (`?source=BRAPI`) or for all of them.
async fn reset_sources(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ResetQuery>,
) -> ApiResult<StatusCode> {
    match q.source.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(id) => {
            if !state.aggregator.reset_source(id) {
                return Err(ApiError::NotFound(format!("Unknown source '{}'", id)));
            }
        }
        None => state.aggregator.reset_all_sources(),
    }
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/market/quote/{ticker}", get(get_quote))
        .route("/market/quotes", get(get_quotes))
        .route("/market/movers", get(list_top_movers))
        .route("/market/fixed-income", get(list_fixed_income))
        .route("/market/indices", get(list_indices))
        .route("/market/sources", get(list_sources))
        .route("/market/sources/reset", post(reset_sources))
}
