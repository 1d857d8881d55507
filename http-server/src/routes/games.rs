use axum::{
    Json,
    extract::{Path, State},
};
use casino::games::blackjack::BlackjackView;
use casino::house::{BetReceipt, BlackjackDeal, RouletteRequest, SlotsBet};
use serde::Serialize;

use crate::{
    AppState,
    error::ApiError,
    middleware::{AuthUser, IdempotencyKey},
    websocket::send_balance_notification,
};

#[derive(Serialize)]
pub struct GameResponse {
    pub success: bool,
    #[serde(flatten)]
    pub receipt: BetReceipt,
}

#[derive(Serialize)]
pub struct RoundResponse {
    pub success: bool,
    pub round: BlackjackView,
}

// Push the new balance when the action touched the ledger
fn respond(state: &AppState, receipt: BetReceipt, reason: &str) -> Json<GameResponse> {
    if !receipt.transactions.is_empty() {
        send_balance_notification(&state.notification_manager, &receipt.balance, reason);
    }
    Json(GameResponse {
        success: true,
        receipt,
    })
}

pub async fn play_slots(
    State(state): State<AppState>,
    auth: AuthUser,
    key: IdempotencyKey,
    Json(payload): Json<SlotsBet>,
) -> Result<Json<GameResponse>, ApiError> {
    let receipt = state
        .house
        .play_slots(auth.user.id, payload, key.as_deref())?;
    Ok(respond(&state, receipt, "slots"))
}

pub async fn play_roulette(
    State(state): State<AppState>,
    auth: AuthUser,
    key: IdempotencyKey,
    Json(payload): Json<RouletteRequest>,
) -> Result<Json<GameResponse>, ApiError> {
    let receipt = state
        .house
        .play_roulette(auth.user.id, payload, key.as_deref())?;
    Ok(respond(&state, receipt, "roulette"))
}

pub async fn blackjack_deal(
    State(state): State<AppState>,
    auth: AuthUser,
    key: IdempotencyKey,
    Json(payload): Json<BlackjackDeal>,
) -> Result<Json<GameResponse>, ApiError> {
    let receipt = state
        .house
        .blackjack_deal(auth.user.id, payload, key.as_deref())?;
    Ok(respond(&state, receipt, "blackjack"))
}

pub async fn blackjack_round(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(round_id): Path<u64>,
) -> Result<Json<RoundResponse>, ApiError> {
    let round = state.house.blackjack_round(auth.user.id, round_id)?;
    Ok(Json(RoundResponse {
        success: true,
        round,
    }))
}

pub async fn blackjack_hit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(round_id): Path<u64>,
) -> Result<Json<GameResponse>, ApiError> {
    let receipt = state.house.blackjack_hit(auth.user.id, round_id)?;
    Ok(respond(&state, receipt, "blackjack"))
}

pub async fn blackjack_stand(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(round_id): Path<u64>,
) -> Result<Json<GameResponse>, ApiError> {
    let receipt = state.house.blackjack_stand(auth.user.id, round_id)?;
    Ok(respond(&state, receipt, "blackjack"))
}

pub async fn blackjack_double(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(round_id): Path<u64>,
) -> Result<Json<GameResponse>, ApiError> {
    let receipt = state.house.blackjack_double(auth.user.id, round_id)?;
    Ok(respond(&state, receipt, "blackjack"))
}
