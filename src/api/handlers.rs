//! Request Handlers
//!
//! Thin adapters: decode the request, call the engine, map the outcome.

use super::{errors::ApiError, middleware::RequestId, models::*};
use crate::engine::RoundEngine;
use crate::games::types::Amount;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::header,
    response::IntoResponse,
    Extension, Json,
};
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    pub engine: Arc<RoundEngine>,
    pub version: String,
}

impl AppState {
    pub fn new(engine: Arc<RoundEngine>) -> Self {
        Self {
            engine,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

fn parse_amount(request_id: &RequestId, value: f64) -> Result<Amount, ApiError> {
    Amount::from_decimal(value).ok_or_else(|| {
        ApiError::bad_request(
            request_id.0.clone(),
            format!("bet amount must be a non-negative number with at most two decimals, got {}", value),
        )
    })
}

/// Negative or oversized integers are reported as validation failures
fn parse_index(request_id: &RequestId, field: &str, value: i64) -> Result<u32, ApiError> {
    u32::try_from(value)
        .map_err(|_| ApiError::bad_request(request_id.0.clone(), format!("{} out of range: {}", field, value)))
}

/// Malformed bodies become validation failures with the usual error shape
fn parse_body<T>(request_id: &RequestId, payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::bad_request(request_id.0.clone(), rejection.body_text()))
}

/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
        version: state.version.clone(),
    })
}

/// POST /api/mines/start
pub async fn start_round_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    payload: Result<Json<StartRoundRequest>, JsonRejection>,
) -> Result<Json<StartRoundResponse>, ApiError> {
    let body = parse_body(&request_id, payload)?;
    let bet_amount = parse_amount(&request_id, body.bet_amount)?;
    let hazard_count = parse_index(&request_id, "hazard_count", body.hazard_count)?;
    let outcome = state
        .engine
        .start_round(&body.player_id, bet_amount, hazard_count)
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;
    Ok(Json(outcome.into()))
}

/// POST /api/mines/reveal
pub async fn reveal_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RevealRequest>, JsonRejection>,
) -> Result<Json<RevealResponse>, ApiError> {
    let body = parse_body(&request_id, payload)?;
    let cell_index = parse_index(&request_id, "cell_index", body.cell_index)?;
    let outcome = state
        .engine
        .reveal_tile(&body.player_id, &body.round_id, cell_index)
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;
    Ok(Json(outcome.into()))
}

/// POST /api/mines/cashout
pub async fn cash_out_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CashOutRequest>, JsonRejection>,
) -> Result<Json<CashOutResponse>, ApiError> {
    let body = parse_body(&request_id, payload)?;
    let outcome = state
        .engine
        .cash_out(&body.player_id, &body.round_id)
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;
    Ok(Json(outcome.into()))
}

/// GET /api/mines/active/:player_id
pub async fn active_round_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<String>,
) -> Result<Json<Option<RoundView>>, ApiError> {
    let round = state
        .engine
        .get_active_round(&player_id)
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;
    Ok(Json(round.map(RoundView::from)))
}

/// GET /api/mines/history/:player_id?limit=
pub async fn history_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let rounds = state
        .engine
        .round_history(&player_id, query.limit)
        .map_err(|e| ApiError::from_engine(request_id.0.clone(), e))?;
    Ok(Json(HistoryResponse {
        player_id,
        rounds: rounds.into_iter().map(RoundView::from).collect(),
    }))
}

/// GET /api/ledger/:player_id?limit=
pub async fn ledger_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<LedgerResponse>, ApiError> {
    let to_api = |e| ApiError::from_engine(request_id.0.clone(), e);
    let balance = state.engine.balance(&player_id).map_err(to_api)?;
    let transactions = state.engine.transactions(&player_id, query.limit).map_err(to_api)?;
    Ok(Json(LedgerResponse {
        player_id,
        balance: balance.to_decimal(),
        transactions: transactions.into_iter().map(TransactionView::from).collect(),
    }))
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.engine.metrics().to_prometheus_format(),
    )
}
