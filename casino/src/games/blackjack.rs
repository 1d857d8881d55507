//! Blackjack rounds.
//!
//! House rules:
//! - one 52-card deck, shuffled per round
//! - dealer draws below 17 and stands on every 17, soft or hard
//! - no dealer peek; a dealer natural only shows once the player stands
//! - naturals pay 3:2, a natural against a dealer natural pushes
//! - double down on the first two cards only, one card then auto-stand
//!
//! A round is deterministic given its deck. Cards are drawn from the end of
//! the deck vector.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::CasinoError;
use crate::types::{Currency, UserId};

const BUST_THRESHOLD: u32 = 21;
const DEALER_STANDS_ON: u32 = 17;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Suit {
    #[serde(rename = "♠")]
    Spades,
    #[serde(rename = "♥")]
    Hearts,
    #[serde(rename = "♦")]
    Diamonds,
    #[serde(rename = "♣")]
    Clubs,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rank {
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "K")]
    King,
    #[serde(rename = "A")]
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    /// Aces count 11 here; `hand_value` demotes them
    pub fn value(&self) -> u32 {
        match self {
            Rank::Two => 2,
            Rank::Three => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten | Rank::Jack | Rank::Queen | Rank::King => 10,
            Rank::Ace => 11,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Self { rank, suit }
    }
}

/// Best total for a hand: each Ace drops from 11 to 1 while the hand is over 21
pub fn hand_value(cards: &[Card]) -> u32 {
    let mut value: u32 = cards.iter().map(|c| c.rank.value()).sum();
    let mut aces = cards.iter().filter(|c| c.rank == Rank::Ace).count();

    while value > BUST_THRESHOLD && aces > 0 {
        value -= 10;
        aces -= 1;
    }
    value
}

pub fn is_natural(cards: &[Card]) -> bool {
    cards.len() == 2 && hand_value(cards) == BUST_THRESHOLD
}

pub fn fresh_deck() -> Vec<Card> {
    [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs]
        .into_iter()
        .flat_map(|suit| Rank::ALL.into_iter().map(move |rank| Card::new(rank, suit)))
        .collect()
}

pub fn shuffled_deck<R: Rng + ?Sized>(rng: &mut R) -> Vec<Card> {
    let mut deck = fresh_deck();
    deck.shuffle(rng);
    deck
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PlayerTurn,
    Complete,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandResult {
    /// Natural 21, pays 3:2
    Blackjack,
    Win,
    Push,
    Lose,
}

impl HandResult {
    /// Gross return as a multiple of the total stake
    pub fn return_multiplier(&self) -> f64 {
        match self {
            HandResult::Blackjack => 2.5,
            HandResult::Win => 2.0,
            HandResult::Push => 1.0,
            HandResult::Lose => 0.0,
        }
    }
}

/// What the player is allowed to see of a round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackjackView {
    pub round_id: u64,
    pub currency: Currency,
    pub stake: f64,
    pub doubled: bool,
    pub player: Vec<Card>,
    pub player_value: u32,
    /// Hole card omitted while the player is acting
    pub dealer: Vec<Card>,
    pub dealer_value: u32,
    pub stage: Stage,
    pub result: Option<HandResult>,
    pub payout: Option<f64>,
    pub can_double: bool,
}

#[derive(Debug, Clone)]
pub struct BlackjackRound {
    pub id: u64,
    pub user_id: UserId,
    pub currency: Currency,
    base_stake: f64,
    doubled: bool,
    player: Vec<Card>,
    dealer: Vec<Card>,
    deck: Vec<Card>,
    result: Option<HandResult>,
}

impl BlackjackRound {
    /// Deals player, player, dealer, dealer and settles naturals on the spot
    pub fn deal(
        id: u64,
        user_id: UserId,
        currency: Currency,
        stake: f64,
        deck: Vec<Card>,
    ) -> Result<Self, CasinoError> {
        let mut round = Self {
            id,
            user_id,
            currency,
            base_stake: stake,
            doubled: false,
            player: Vec::with_capacity(8),
            dealer: Vec::with_capacity(8),
            deck,
            result: None,
        };

        let p1 = round.draw()?;
        let p2 = round.draw()?;
        let d1 = round.draw()?;
        let d2 = round.draw()?;
        round.player.extend([p1, p2]);
        round.dealer.extend([d1, d2]);

        if is_natural(&round.player) {
            round.result = Some(if is_natural(&round.dealer) {
                HandResult::Push
            } else {
                HandResult::Blackjack
            });
        }
        Ok(round)
    }

    fn draw(&mut self) -> Result<Card, CasinoError> {
        self.deck
            .pop()
            .ok_or_else(|| CasinoError::Storage(format!("deck exhausted in round {}", self.id)))
    }

    fn ensure_in_play(&self) -> Result<(), CasinoError> {
        if self.result.is_some() {
            return Err(CasinoError::IllegalMove("round is already complete"));
        }
        Ok(())
    }

    pub fn hit(&mut self) -> Result<(), CasinoError> {
        self.ensure_in_play()?;
        let card = self.draw()?;
        self.player.push(card);

        // A bust loses before the dealer plays
        if hand_value(&self.player) > BUST_THRESHOLD {
            self.result = Some(HandResult::Lose);
        }
        Ok(())
    }

    pub fn stand(&mut self) -> Result<(), CasinoError> {
        self.ensure_in_play()?;
        self.play_dealer()
    }

    /// Caller debits the extra stake before calling this
    pub fn double(&mut self) -> Result<(), CasinoError> {
        self.ensure_in_play()?;
        if !self.can_double() {
            return Err(CasinoError::IllegalMove(
                "double down is only allowed on the first two cards",
            ));
        }

        self.doubled = true;
        self.hit()?;
        if self.result.is_none() {
            self.play_dealer()?;
        }
        Ok(())
    }

    fn play_dealer(&mut self) -> Result<(), CasinoError> {
        while hand_value(&self.dealer) < DEALER_STANDS_ON {
            let card = self.draw()?;
            self.dealer.push(card);
        }

        let player = hand_value(&self.player);
        let dealer = hand_value(&self.dealer);
        self.result = Some(if dealer > BUST_THRESHOLD || player > dealer {
            HandResult::Win
        } else if dealer > player {
            HandResult::Lose
        } else {
            HandResult::Push
        });
        Ok(())
    }

    pub fn can_double(&self) -> bool {
        self.result.is_none() && self.player.len() == 2 && !self.doubled
    }

    pub fn base_stake(&self) -> f64 {
        self.base_stake
    }

    pub fn total_stake(&self) -> f64 {
        if self.doubled {
            self.base_stake * 2.0
        } else {
            self.base_stake
        }
    }

    pub fn result(&self) -> Option<HandResult> {
        self.result
    }

    pub fn is_complete(&self) -> bool {
        self.result.is_some()
    }

    /// Gross amount owed to the player once the round is complete
    pub fn payout(&self) -> Option<f64> {
        self.result
            .map(|result| self.total_stake() * result.return_multiplier())
    }

    pub fn player_cards(&self) -> &[Card] {
        &self.player
    }

    pub fn dealer_cards(&self) -> &[Card] {
        &self.dealer
    }

    pub fn view(&self) -> BlackjackView {
        let dealer: Vec<Card> = if self.is_complete() {
            self.dealer.clone()
        } else {
            self.dealer.iter().take(1).copied().collect()
        };

        BlackjackView {
            round_id: self.id,
            currency: self.currency,
            stake: self.total_stake(),
            doubled: self.doubled,
            player_value: hand_value(&self.player),
            player: self.player.clone(),
            dealer_value: hand_value(&dealer),
            dealer,
            stage: if self.is_complete() {
                Stage::Complete
            } else {
                Stage::PlayerTurn
            },
            result: self.result,
            payout: self.payout(),
            can_double: self.can_double(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn card(rank: Rank) -> Card {
        Card::new(rank, Suit::Hearts)
    }

    /// Builds a deck whose cards come out in the given order
    fn stacked(draw_order: &[Rank]) -> Vec<Card> {
        draw_order.iter().rev().map(|r| card(*r)).collect()
    }

    fn round(draw_order: &[Rank]) -> BlackjackRound {
        BlackjackRound::deal(1, 7, Currency::Btc, 1.0, stacked(draw_order)).unwrap()
    }

    #[test]
    fn test_card_values() {
        assert_eq!(hand_value(&[card(Rank::Two), card(Rank::Nine)]), 11);
        assert_eq!(hand_value(&[card(Rank::King), card(Rank::Queen)]), 20);
        assert_eq!(hand_value(&[card(Rank::Ace), card(Rank::Jack)]), 21);
    }

    #[test]
    fn test_aces_demote_one_at_a_time() {
        assert_eq!(hand_value(&[card(Rank::Ace), card(Rank::Ace)]), 12);
        assert_eq!(
            hand_value(&[card(Rank::Ace), card(Rank::King), card(Rank::Five)]),
            16
        );
        // Two aces with 10s: 32 -> 22 -> 12
        assert_eq!(
            hand_value(&[card(Rank::Ace), card(Rank::Ten), card(Rank::Ace)]),
            12
        );
        // Soft total kept when it fits
        assert_eq!(hand_value(&[card(Rank::Ace), card(Rank::Six)]), 17);
    }

    #[test]
    fn test_hand_value_ignores_order() {
        let hand = [card(Rank::Ace), card(Rank::Seven), card(Rank::Ace), card(Rank::King)];
        let expected = hand_value(&hand);
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let mut shuffled = hand;
            shuffled.shuffle(&mut rng);
            assert_eq!(hand_value(&shuffled), expected);
        }
        assert_eq!(expected, 19);
    }

    #[test]
    fn test_fresh_deck_has_52_unique_cards() {
        let deck = fresh_deck();
        assert_eq!(deck.len(), 52);
        for (i, a) in deck.iter().enumerate() {
            assert!(deck[i + 1..].iter().all(|b| b != a));
        }
    }

    #[test]
    fn test_natural_pays_three_to_two() {
        let round = round(&[Rank::Ace, Rank::King, Rank::Nine, Rank::Seven]);
        assert_eq!(round.result(), Some(HandResult::Blackjack));
        assert_eq!(round.payout(), Some(2.5));
        assert_eq!(round.view().stage, Stage::Complete);
    }

    #[test]
    fn test_double_natural_pushes() {
        let round = round(&[Rank::Ace, Rank::King, Rank::Ace, Rank::Queen]);
        assert_eq!(round.result(), Some(HandResult::Push));
        assert_eq!(round.payout(), Some(1.0));
    }

    #[test]
    fn test_bust_loses_immediately() {
        let mut round = round(&[Rank::King, Rank::Six, Rank::Nine, Rank::Seven, Rank::Queen]);
        round.hit().unwrap();
        assert_eq!(round.result(), Some(HandResult::Lose));
        assert_eq!(round.payout(), Some(0.0));
        // Dealer never drew
        assert_eq!(round.dealer_cards().len(), 2);
        assert!(round.hit().is_err());
        assert!(round.stand().is_err());
    }

    #[test]
    fn test_dealer_draws_to_seventeen() {
        // Player 19, dealer 5 + 6 then 4 then 3 = 18
        let mut round = round(&[
            Rank::King,
            Rank::Nine,
            Rank::Five,
            Rank::Six,
            Rank::Four,
            Rank::Three,
        ]);
        round.stand().unwrap();
        assert_eq!(hand_value(round.dealer_cards()), 18);
        assert_eq!(round.result(), Some(HandResult::Win));
        assert_eq!(round.payout(), Some(2.0));
    }

    #[test]
    fn test_dealer_stands_on_soft_seventeen() {
        // Player 18, dealer A + 6 stands
        let mut round = round(&[Rank::King, Rank::Eight, Rank::Ace, Rank::Six, Rank::Five]);
        round.stand().unwrap();
        assert_eq!(round.dealer_cards().len(), 2);
        assert_eq!(round.result(), Some(HandResult::Win));
    }

    #[test]
    fn test_dealer_bust_pays_player() {
        let mut round = round(&[
            Rank::Ten,
            Rank::Two,
            Rank::Ten,
            Rank::Six,
            Rank::King,
        ]);
        round.stand().unwrap();
        assert!(hand_value(round.dealer_cards()) > 21);
        assert_eq!(round.result(), Some(HandResult::Win));
    }

    #[test]
    fn test_equal_totals_push() {
        let mut round = round(&[Rank::King, Rank::Eight, Rank::Queen, Rank::Eight]);
        round.stand().unwrap();
        assert_eq!(round.result(), Some(HandResult::Push));
    }

    #[test]
    fn test_double_draws_one_card_and_stands() {
        // Player 5 + 6, doubles into a 10 for 21; dealer 10 + 7 stands
        let mut round = round(&[
            Rank::Five,
            Rank::Six,
            Rank::Ten,
            Rank::Seven,
            Rank::King,
        ]);
        assert!(round.can_double());
        round.double().unwrap();
        assert_eq!(round.player_cards().len(), 3);
        assert_eq!(round.result(), Some(HandResult::Win));
        assert_eq!(round.total_stake(), 2.0);
        assert_eq!(round.payout(), Some(4.0));
    }

    #[test]
    fn test_double_only_on_two_cards() {
        let mut round = round(&[
            Rank::Two,
            Rank::Three,
            Rank::Ten,
            Rank::Seven,
            Rank::Four,
        ]);
        round.hit().unwrap();
        assert!(!round.can_double());
        assert_eq!(
            round.double(),
            Err(CasinoError::IllegalMove(
                "double down is only allowed on the first two cards"
            ))
        );
    }

    #[test]
    fn test_view_hides_hole_card_until_complete() {
        let mut round = round(&[Rank::King, Rank::Nine, Rank::Five, Rank::Queen, Rank::Two]);
        let view = round.view();
        assert_eq!(view.dealer.len(), 1);
        assert_eq!(view.dealer_value, 5);
        assert_eq!(view.stage, Stage::PlayerTurn);
        assert!(view.payout.is_none());

        round.stand().unwrap();
        let view = round.view();
        assert_eq!(view.dealer.len(), 3);
        assert_eq!(view.dealer_value, 17);
        assert_eq!(view.result, Some(HandResult::Win));
    }

    #[test]
    fn test_shuffled_rounds_always_resolve() {
        let mut rng = StdRng::seed_from_u64(99);
        for id in 0..500 {
            let mut round =
                BlackjackRound::deal(id, 1, Currency::Eth, 1.0, shuffled_deck(&mut rng)).unwrap();
            while !round.is_complete() && hand_value(round.player_cards()) < 17 {
                round.hit().unwrap();
            }
            if !round.is_complete() {
                round.stand().unwrap();
            }
            let payout = round.payout().unwrap();
            assert!([0.0, 1.0, 2.0, 2.5].contains(&payout));
        }
    }
}
