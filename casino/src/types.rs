use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::CasinoError;

pub type UserId = u64;

/// Milliseconds since the unix epoch
#[inline(always)]
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Btc,
    Eth,
    Sol,
    Usdt,
    Ltc,
}

impl Currency {
    pub const ALL: [Currency; 5] = [
        Currency::Btc,
        Currency::Eth,
        Currency::Sol,
        Currency::Usdt,
        Currency::Ltc,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Btc => "BTC",
            Currency::Eth => "ETH",
            Currency::Sol => "SOL",
            Currency::Usdt => "USDT",
            Currency::Ltc => "LTC",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = CasinoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| CasinoError::validation(format!("Unsupported currency '{s}'")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub wallet_address: Option<String>,
    pub created_at: u64,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub user_id: UserId,
    pub currency: Currency,
    pub amount: f64,
    pub updated_at: u64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Withdrawal,
    Bet,
    Win,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameType {
    Slots,
    Blackjack,
    Roulette,
    Sports,
}

/// Immutable ledger record. Amount is signed: debits are negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub amount: f64,
    pub currency: Currency,
    pub game_type: Option<GameType>,
    pub status: TransactionStatus,
    pub tx_hash: Option<String>,
    pub created_at: u64,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub amount: f64,
    pub currency: Currency,
    pub game_type: Option<GameType>,
    pub status: TransactionStatus,
    pub tx_hash: Option<String>,
}

/// A balance delta together with the transaction that records it.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub kind: TransactionKind,
    pub delta: f64,
    pub game_type: Option<GameType>,
    pub tx_hash: Option<String>,
}

impl LedgerEntry {
    pub fn new(kind: TransactionKind, delta: f64) -> Self {
        Self {
            kind,
            delta,
            game_type: None,
            tx_hash: None,
        }
    }

    pub fn game(mut self, game_type: GameType) -> Self {
        self.game_type = Some(game_type);
        self
    }

    pub fn tx_hash(mut self, tx_hash: String) -> Self {
        self.tx_hash = Some(tx_hash);
        self
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
    Void,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SportsBet {
    pub id: u64,
    pub user_id: UserId,
    pub match_id: String,
    pub selection_id: String,
    pub odds: f64,
    pub stake: f64,
    pub currency: Currency,
    pub potential_win: f64,
    pub status: BetStatus,
    pub created_at: u64,
    pub settled_at: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct NewSportsBet {
    pub user_id: UserId,
    pub match_id: String,
    pub selection_id: String,
    pub odds: f64,
    pub stake: f64,
    pub currency: Currency,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    InProgress,
    Finished,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchResult {
    Home,
    Draw,
    Away,
    /// Match abandoned; every stake is refunded
    Void,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SportsMatch {
    pub id: u64,
    pub external_id: String,
    pub sport_type: String,
    pub home_team: String,
    pub away_team: String,
    pub start_time: u64,
    pub is_live: bool,
    pub status: MatchStatus,
    pub result: Option<MatchResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositAddress {
    pub user_id: UserId,
    pub currency: Currency,
    pub address: String,
    pub is_active: bool,
    pub created_at: u64,
}

/// Largest single stake, deposit or withdrawal
pub const MAX_AMOUNT: f64 = 1e9;

/// Rejects NaN, infinities, non-positive amounts and anything above `MAX_AMOUNT`.
pub fn validate_amount(amount: f64, what: &str) -> Result<(), CasinoError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(CasinoError::validation(format!(
            "{what} must be greater than 0"
        )));
    }
    if amount > MAX_AMOUNT {
        return Err(CasinoError::validation(format!(
            "{what} must be at most {MAX_AMOUNT}"
        )));
    }
    Ok(())
}
