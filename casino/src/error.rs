use thiserror::Error;

use crate::types::{Currency, UserId};

/// Every failure the casino core can report.
///
/// Variants up to `IdempotencyConflict` are user-facing and are raised before
/// any ledger mutation. `Storage` is the catch-all for broken invariants.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CasinoError {
    #[error("{0}")]
    Validation(String),
    #[error("Insufficient balance: {available} {currency} available, {required} required")]
    InsufficientBalance {
        currency: Currency,
        available: f64,
        required: f64,
    },
    #[error("User {0} not found")]
    UserNotFound(UserId),
    #[error("Username already taken")]
    UsernameTaken,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Wallet address is already linked to another account")]
    WalletInUse,
    #[error("Invalid wallet proof: {0}")]
    InvalidWalletProof(String),
    #[error("Match '{0}' not found")]
    MatchNotFound(String),
    #[error("Match '{0}' is already finished")]
    MatchFinished(String),
    #[error("Sports bet {0} not found")]
    BetNotFound(u64),
    #[error("Blackjack round {0} not found")]
    RoundNotFound(u64),
    #[error("Illegal move: {0}")]
    IllegalMove(&'static str),
    #[error("Idempotency key was already used for a different request")]
    IdempotencyConflict,
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CasinoError {
    pub fn validation(message: impl Into<String>) -> Self {
        CasinoError::Validation(message.into())
    }
}

pub type Result<T, E = CasinoError> = std::result::Result<T, E>;
