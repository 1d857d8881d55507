//! Game resolution.
//!
//! Every game splits into a draw (`spin`/`deal`, driven by an injected
//! `rand::Rng`) and a pure resolution function over that draw. Payouts are
//! gross: they include the returned stake, so the net balance change of a bet
//! is always `payout - stake`.

pub mod blackjack;
pub mod roulette;
pub mod slots;

use serde::{Deserialize, Serialize};

use blackjack::BlackjackView;
use roulette::RouletteOutcome;
use slots::SlotsOutcome;

/// Result of a resolved casino bet as returned to the player
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "lowercase")]
pub enum GameOutcome {
    Slots(SlotsOutcome),
    Roulette(RouletteOutcome),
    Blackjack(BlackjackView),
}

impl GameOutcome {
    /// Gross amount credited back, zero while a blackjack round is in play
    pub fn payout(&self) -> f64 {
        match self {
            GameOutcome::Slots(outcome) => outcome.payout,
            GameOutcome::Roulette(outcome) => outcome.total_payout,
            GameOutcome::Blackjack(view) => view.payout.unwrap_or(0.0),
        }
    }
}
