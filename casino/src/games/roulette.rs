//! Single-zero roulette.
//!
//! Pocket colours come from a fixed wheel-order table rather than being
//! derived from the number. Bet types and their ratios (excluding the stake):
//!
//! - straight: 35:1
//! - red / black: 1:1
//! - odd / even: 1:1, zero is neither
//! - low (1-18) / high (19-36): 1:1

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CasinoError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Green,
    Red,
    Black,
}

use Color::{Black, Green, Red};

/// Pockets in wheel order
pub const WHEEL: [(u8, Color); 37] = [
    (0, Green),
    (32, Red),
    (15, Black),
    (19, Red),
    (4, Black),
    (21, Red),
    (2, Black),
    (25, Red),
    (17, Black),
    (34, Red),
    (6, Black),
    (27, Red),
    (13, Black),
    (36, Red),
    (11, Black),
    (30, Red),
    (8, Black),
    (23, Red),
    (10, Black),
    (5, Red),
    (24, Black),
    (16, Red),
    (33, Black),
    (1, Red),
    (20, Black),
    (14, Red),
    (31, Black),
    (9, Red),
    (22, Black),
    (18, Red),
    (29, Black),
    (7, Red),
    (28, Black),
    (12, Red),
    (35, Black),
    (3, Red),
    (26, Black),
];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "number", rename_all = "lowercase")]
pub enum BetKind {
    Straight(u8),
    Red,
    Black,
    Odd,
    Even,
    #[serde(rename = "1to18")]
    Low,
    #[serde(rename = "19to36")]
    High,
}

impl BetKind {
    /// Ratio paid on top of the returned stake
    pub fn payout_ratio(&self) -> u32 {
        match self {
            BetKind::Straight(_) => 35,
            _ => 1,
        }
    }

    pub fn wins(&self, number: u8) -> bool {
        let color = color_of(number);
        match *self {
            BetKind::Straight(n) => n == number,
            BetKind::Red => color == Some(Red),
            BetKind::Black => color == Some(Black),
            BetKind::Odd => number != 0 && number % 2 == 1,
            BetKind::Even => number != 0 && number % 2 == 0,
            BetKind::Low => (1..=18).contains(&number),
            BetKind::High => (19..=36).contains(&number),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouletteBet {
    #[serde(flatten)]
    pub kind: BetKind,
    pub stake: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedBet {
    #[serde(flatten)]
    pub bet: RouletteBet,
    pub won: bool,
    pub payout: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouletteOutcome {
    pub number: u8,
    pub color: Color,
    pub bets: Vec<ResolvedBet>,
    pub total_stake: f64,
    pub total_payout: f64,
}

pub fn color_of(number: u8) -> Option<Color> {
    WHEEL
        .iter()
        .find(|(pocket, _)| *pocket == number)
        .map(|(_, color)| *color)
}

/// Checks every bet before any money moves
pub fn validate_bets(bets: &[RouletteBet]) -> Result<f64, CasinoError> {
    if bets.is_empty() {
        return Err(CasinoError::validation("At least one bet is required"));
    }

    let mut total = 0.0;
    for bet in bets {
        crate::types::validate_amount(bet.stake, "Bet amount")?;
        if let BetKind::Straight(n) = bet.kind {
            if n > 36 {
                return Err(CasinoError::validation(format!(
                    "Straight bet number must be between 0 and 36, got {n}"
                )));
            }
        }
        total += bet.stake;
    }
    Ok(total)
}

/// Draws a pocket index uniformly and returns its number
pub fn spin<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    WHEEL[rng.gen_range(0..WHEEL.len())].0
}

/// Resolves all bets against one spin; winners pay `stake * (ratio + 1)`
pub fn resolve(number: u8, bets: &[RouletteBet]) -> RouletteOutcome {
    let resolved: Vec<ResolvedBet> = bets
        .iter()
        .map(|bet| {
            let won = bet.kind.wins(number);
            let payout = if won {
                bet.stake * f64::from(bet.kind.payout_ratio() + 1)
            } else {
                0.0
            };
            ResolvedBet {
                bet: *bet,
                won,
                payout,
            }
        })
        .collect();

    RouletteOutcome {
        number,
        color: color_of(number).unwrap_or(Green),
        total_stake: bets.iter().map(|b| b.stake).sum(),
        total_payout: resolved.iter().map(|b| b.payout).sum(),
        bets: resolved,
    }
}
