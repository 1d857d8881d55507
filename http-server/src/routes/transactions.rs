use axum::{
    Json,
    extract::{Query, State},
};
use casino::types::Transaction;
use serde::{Deserialize, Serialize};

use crate::{AppState, error::ApiError, middleware::AuthUser};

#[derive(Deserialize)]
pub struct TransactionsQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct TransactionsResponse {
    pub success: bool,
    pub transactions: Vec<Transaction>,
}

// Newest first
pub async fn list_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<TransactionsResponse>, ApiError> {
    let transactions = state.house.transactions(auth.user.id, query.limit)?;
    Ok(Json(TransactionsResponse {
        success: true,
        transactions,
    }))
}
