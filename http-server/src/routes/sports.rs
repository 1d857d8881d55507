use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use casino::house::{SettlementReport, SportsBetReceipt, SportsBetRequest};
use casino::sportsbook::MatchListing;
use casino::types::{MatchResult, SportsBet};
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    error::ApiError,
    middleware::{AuthUser, IdempotencyKey, require_admin},
    websocket::{send_balance_notification, send_settlement_notifications},
};

#[derive(Deserialize)]
pub struct MatchesQuery {
    pub sport: Option<String>,
}

#[derive(Serialize)]
pub struct MatchesResponse {
    pub success: bool,
    pub matches: Vec<MatchListing>,
}

#[derive(Serialize)]
pub struct PlaceBetResponse {
    pub success: bool,
    #[serde(flatten)]
    pub receipt: SportsBetReceipt,
}

#[derive(Serialize)]
pub struct BetsResponse {
    pub success: bool,
    pub bets: Vec<SportsBet>,
}

#[derive(Deserialize)]
pub struct MatchResultRequest {
    pub result: MatchResult,
}

#[derive(Serialize)]
pub struct SettlementResponse {
    pub success: bool,
    #[serde(flatten)]
    pub report: SettlementReport,
}

// Public match list with quoted selections
pub async fn get_matches(
    State(state): State<AppState>,
    Query(query): Query<MatchesQuery>,
) -> Json<MatchesResponse> {
    Json(MatchesResponse {
        success: true,
        matches: state.house.matches(query.sport.as_deref()),
    })
}

pub async fn place_bet(
    State(state): State<AppState>,
    auth: AuthUser,
    key: IdempotencyKey,
    Json(payload): Json<SportsBetRequest>,
) -> Result<Json<PlaceBetResponse>, ApiError> {
    let receipt = state
        .house
        .place_sports_bet(auth.user.id, payload, key.as_deref())?;
    send_balance_notification(&state.notification_manager, &receipt.balance, "sports_bet");
    Ok(Json(PlaceBetResponse {
        success: true,
        receipt,
    }))
}

pub async fn get_bets(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<BetsResponse>, ApiError> {
    Ok(Json(BetsResponse {
        success: true,
        bets: state.house.sports_bets(auth.user.id)?,
    }))
}

// Operator endpoint: a match-completion event triggers the settlement sweep
pub async fn record_result(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(match_id): Path<String>,
    Json(payload): Json<MatchResultRequest>,
) -> Result<Json<SettlementResponse>, ApiError> {
    require_admin(&state, &headers)?;
    let report = state.house.settle_match(&match_id, payload.result)?;
    send_settlement_notifications(&state.notification_manager, &report);
    Ok(Json(SettlementResponse {
        success: true,
        report,
    }))
}
