//! Match catalogue and selection pricing.
//!
//! Selections are addressed as `"<home|draw|away>-<external_id>"` and every
//! match quotes the same fixed odds.

use serde::{Deserialize, Serialize};

use crate::error::{CasinoError, Result};
use crate::types::{MatchResult, MatchStatus, SportsMatch};

const HOUR_MS: u64 = 60 * 60 * 1000;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    pub const ALL: [Outcome; 3] = [Outcome::Home, Outcome::Draw, Outcome::Away];

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Home => "home",
            Outcome::Draw => "draw",
            Outcome::Away => "away",
        }
    }

    /// Decimal odds quoted for this outcome
    pub fn odds(&self) -> f64 {
        match self {
            Outcome::Home => 2.10,
            Outcome::Draw => 3.25,
            Outcome::Away => 3.60,
        }
    }

    /// `None` means the bet is void and the stake goes back
    pub fn wins(&self, result: MatchResult) -> Option<bool> {
        match (self, result) {
            (_, MatchResult::Void) => None,
            (Outcome::Home, MatchResult::Home)
            | (Outcome::Draw, MatchResult::Draw)
            | (Outcome::Away, MatchResult::Away) => Some(true),
            _ => Some(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub outcome: Outcome,
    pub match_id: String,
}

impl Selection {
    pub fn id(&self) -> String {
        format!("{}-{}", self.outcome.as_str(), self.match_id)
    }

    pub fn parse(selection_id: &str) -> Result<Self> {
        let (outcome, match_id) = selection_id
            .split_once('-')
            .ok_or_else(|| invalid_selection(selection_id))?;
        let outcome = Outcome::ALL
            .into_iter()
            .find(|o| o.as_str() == outcome)
            .ok_or_else(|| invalid_selection(selection_id))?;
        if match_id.is_empty() {
            return Err(invalid_selection(selection_id));
        }
        Ok(Self {
            outcome,
            match_id: match_id.to_string(),
        })
    }
}

fn invalid_selection(selection_id: &str) -> CasinoError {
    CasinoError::validation(format!("Unknown selection '{selection_id}'"))
}

/// Priced selection as shown next to a match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub selection_id: String,
    pub outcome: Outcome,
    pub odds: f64,
}

pub fn quotes(match_id: &str) -> Vec<Quote> {
    Outcome::ALL
        .into_iter()
        .map(|outcome| Quote {
            selection_id: Selection {
                outcome,
                match_id: match_id.to_string(),
            }
            .id(),
            outcome,
            odds: outcome.odds(),
        })
        .collect()
}

/// A match together with its priced selections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchListing {
    #[serde(flatten)]
    pub sports_match: SportsMatch,
    pub selections: Vec<Quote>,
}

impl From<SportsMatch> for MatchListing {
    fn from(sports_match: SportsMatch) -> Self {
        let selections = quotes(&sports_match.external_id);
        Self {
            sports_match,
            selections,
        }
    }
}

/// Checks a bet slip against the match it names and returns the parsed selection.
///
/// The selection must belong to `sports_match` and the client's odds must be
/// the currently quoted odds.
pub fn check_slip(sports_match: &SportsMatch, selection_id: &str, odds: f64) -> Result<Selection> {
    if sports_match.status == MatchStatus::Finished {
        return Err(CasinoError::MatchFinished(sports_match.external_id.clone()));
    }

    let selection = Selection::parse(selection_id)?;
    if selection.match_id != sports_match.external_id {
        return Err(CasinoError::validation(format!(
            "Selection '{selection_id}' does not belong to match '{}'",
            sports_match.external_id
        )));
    }

    let quoted = selection.outcome.odds();
    if !odds.is_finite() || (odds - quoted).abs() > 1e-9 {
        return Err(CasinoError::validation(format!(
            "Odds have changed: {selection_id} is now {quoted:.2}"
        )));
    }
    Ok(selection)
}

/// The static fixture list, relative to `now` (ms)
pub fn seed_matches(now: u64) -> Vec<SportsMatch> {
    let fixture = |id: u64, external_id: &str, sport: &str, home: &str, away: &str, hours: u64| {
        SportsMatch {
            id,
            external_id: external_id.to_string(),
            sport_type: sport.to_string(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            start_time: now + hours * HOUR_MS,
            is_live: false,
            status: MatchStatus::Scheduled,
            result: None,
        }
    };

    let mut live = fixture(1, "soccer-1", "soccer", "Arsenal FC", "Chelsea FC", 2);
    live.is_live = true;
    live.status = MatchStatus::InProgress;

    vec![
        live,
        fixture(2, "soccer-2", "soccer", "Manchester United", "Liverpool", 24),
        fixture(3, "bball-1", "basketball", "LA Lakers", "Golden State Warriors", 28),
        fixture(4, "esports-1", "esports", "Fnatic", "G2 Esports", 32),
    ]
}
