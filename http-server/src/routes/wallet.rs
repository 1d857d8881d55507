use axum::{Json, extract::State};
use casino::house::{DepositRequest, FundsReceipt, WithdrawRequest};
use casino::types::{Balance, Currency, DepositAddress};
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    error::ApiError,
    middleware::{AuthUser, IdempotencyKey},
    models::AuthenticatedUser,
    websocket::send_balance_notification,
};

#[derive(Serialize)]
pub struct ChallengeResponse {
    pub success: bool,
    /// Text the wallet must sign
    pub challenge: String,
    pub issued_at: u64,
}

#[derive(Deserialize)]
pub struct ConnectWalletRequest {
    pub address: String,
    pub signature: String,
}

#[derive(Serialize)]
pub struct ConnectWalletResponse {
    pub success: bool,
    pub message: String,
    pub user: AuthenticatedUser,
}

#[derive(Serialize)]
pub struct BalanceView {
    pub currency: Currency,
    pub amount: f64,
    pub updated_at: u64,
}

impl From<Balance> for BalanceView {
    fn from(balance: Balance) -> Self {
        Self {
            currency: balance.currency,
            amount: balance.amount,
            updated_at: balance.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct BalancesResponse {
    pub success: bool,
    pub balances: Vec<BalanceView>,
}

#[derive(Deserialize)]
pub struct AddressRequest {
    pub currency: Currency,
}

#[derive(Serialize)]
pub struct AddressResponse {
    pub success: bool,
    pub address: DepositAddress,
}

#[derive(Serialize)]
pub struct FundsResponse {
    pub success: bool,
    #[serde(flatten)]
    pub receipt: FundsReceipt,
}

pub async fn get_challenge(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ChallengeResponse>, ApiError> {
    let challenge = state.house.wallet_challenge(auth.user.id)?;
    Ok(Json(ChallengeResponse {
        success: true,
        challenge: challenge.message,
        issued_at: challenge.issued_at,
    }))
}

pub async fn connect_wallet(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<ConnectWalletRequest>,
) -> Result<Json<ConnectWalletResponse>, ApiError> {
    let user = state
        .house
        .connect_wallet(auth.user.id, &payload.address, &payload.signature)?;
    Ok(Json(ConnectWalletResponse {
        success: true,
        message: "Wallet connected".to_string(),
        user: AuthenticatedUser::from(user),
    }))
}

pub async fn get_balances(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<BalancesResponse>, ApiError> {
    let balances = state.house.balances(auth.user.id)?;
    Ok(Json(BalancesResponse {
        success: true,
        balances: balances.into_iter().map(BalanceView::from).collect(),
    }))
}

pub async fn deposit_address(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<AddressRequest>,
) -> Result<Json<AddressResponse>, ApiError> {
    let address = state.house.deposit_address(auth.user.id, payload.currency)?;
    Ok(Json(AddressResponse {
        success: true,
        address,
    }))
}

pub async fn deposit(
    State(state): State<AppState>,
    auth: AuthUser,
    key: IdempotencyKey,
    Json(payload): Json<DepositRequest>,
) -> Result<Json<FundsResponse>, ApiError> {
    let receipt = state
        .house
        .deposit(auth.user.id, payload, key.as_deref())?;
    send_balance_notification(&state.notification_manager, &receipt.balance, "deposit");
    Ok(Json(FundsResponse {
        success: true,
        receipt,
    }))
}

pub async fn withdraw(
    State(state): State<AppState>,
    auth: AuthUser,
    key: IdempotencyKey,
    Json(payload): Json<WithdrawRequest>,
) -> Result<Json<FundsResponse>, ApiError> {
    let receipt = state
        .house
        .withdraw(auth.user.id, payload, key.as_deref())?;
    send_balance_notification(&state.notification_manager, &receipt.balance, "withdrawal");
    Ok(Json(FundsResponse {
        success: true,
        receipt,
    }))
}
