//! The house: every operation that moves money.
//!
//! Clients only ever choose stakes, currencies and selections. Randomness,
//! outcomes and payouts are decided here, and every balance change goes
//! through `LedgerStore::apply`.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::error::{CasinoError, Result};
use crate::games::blackjack::{self, BlackjackRound, BlackjackView};
use crate::games::roulette::{self, RouletteBet};
use crate::games::{GameOutcome, slots};
use crate::idempotency::IdempotencyCache;
use crate::sportsbook::{self, MatchListing, Selection};
use crate::store::LedgerStore;
use crate::types::{
    Balance, BetStatus, Currency, DepositAddress, GameType, LedgerEntry, MatchResult,
    NewSportsBet, NewUser, SportsBet, SportsMatch, Transaction, TransactionKind, User, UserId,
    current_timestamp, validate_amount,
};
use crate::wallet::{self, Challenge, ChallengeBook};

/// Finished blackjack rounds each user can still look up
pub const FINISHED_ROUNDS_KEPT: usize = 20;

/// Rounds a user may have in play at once
pub const MAX_OPEN_ROUNDS: usize = 10;

/// Balances credited to every new account
pub const SIGNUP_BALANCES: [(Currency, f64); 2] = [(Currency::Btc, 0.01), (Currency::Eth, 0.1)];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotsBet {
    pub stake: f64,
    pub currency: Currency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouletteRequest {
    pub currency: Currency,
    pub bets: Vec<RouletteBet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackjackDeal {
    pub stake: f64,
    pub currency: Currency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SportsBetRequest {
    pub match_id: String,
    pub selection_id: String,
    pub odds: f64,
    pub stake: f64,
    pub currency: Currency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositRequest {
    pub amount: f64,
    pub currency: Currency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub amount: f64,
    pub currency: Currency,
    pub destination: String,
}

/// Result of a casino action: the outcome plus the ledger rows it wrote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetReceipt {
    pub outcome: GameOutcome,
    #[serde(rename = "newBalance")]
    pub balance: Balance,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SportsBetReceipt {
    pub balance: Balance,
    pub bet: SportsBet,
    pub transaction: Transaction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundsReceipt {
    pub balance: Balance,
    pub transaction: Transaction,
}

/// One bet moved out of `pending` by a settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettledBet {
    pub bet: SportsBet,
    /// Set when the bet was credited
    pub balance: Option<Balance>,
    pub transaction: Option<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementReport {
    #[serde(rename = "match")]
    pub sports_match: SportsMatch,
    pub settled: Vec<SettledBet>,
}

/// Blackjack rounds in play plus the most recent finished ones per user
#[derive(Default)]
struct RoundBook {
    rounds: HashMap<u64, BlackjackRound>,
    open: HashMap<UserId, usize>,
    finished: HashMap<UserId, VecDeque<u64>>,
}

impl RoundBook {
    fn owned(&mut self, user_id: UserId, round_id: u64) -> Result<&mut BlackjackRound> {
        self.rounds
            .get_mut(&round_id)
            .filter(|round| round.user_id == user_id)
            .ok_or(CasinoError::RoundNotFound(round_id))
    }

    fn check_capacity(&self, user_id: UserId) -> Result<()> {
        if self.open.get(&user_id).copied().unwrap_or(0) >= MAX_OPEN_ROUNDS {
            return Err(CasinoError::validation(format!(
                "Finish one of your {MAX_OPEN_ROUNDS} open blackjack rounds first"
            )));
        }
        Ok(())
    }

    fn insert(&mut self, round: BlackjackRound) {
        let (id, user_id, complete) = (round.id, round.user_id, round.is_complete());
        self.rounds.insert(id, round);
        if complete {
            self.retire(user_id, id);
        } else {
            *self.open.entry(user_id).or_default() += 1;
        }
    }

    /// Moves an open round to the finished list
    fn finish(&mut self, user_id: UserId, round_id: u64) {
        if let Some(open) = self.open.get_mut(&user_id) {
            *open = open.saturating_sub(1);
            if *open == 0 {
                self.open.remove(&user_id);
            }
        }
        self.retire(user_id, round_id);
    }

    /// Keeps the round readable and evicts the user's oldest finished rounds past the cap
    fn retire(&mut self, user_id: UserId, round_id: u64) {
        let finished = self.finished.entry(user_id).or_default();
        finished.push_back(round_id);
        while finished.len() > FINISHED_ROUNDS_KEPT {
            if let Some(evicted) = finished.pop_front() {
                self.rounds.remove(&evicted);
            }
        }
    }
}

pub struct House {
    store: Arc<dyn LedgerStore>,
    rng: Mutex<StdRng>,
    rounds: Mutex<RoundBook>,
    round_id_counter: AtomicU64,
    challenges: ChallengeBook,
    address_lock: Mutex<()>,
    slots_receipts: IdempotencyCache<BetReceipt>,
    roulette_receipts: IdempotencyCache<BetReceipt>,
    deal_receipts: IdempotencyCache<BetReceipt>,
    sports_receipts: IdempotencyCache<SportsBetReceipt>,
    deposit_receipts: IdempotencyCache<FundsReceipt>,
    withdraw_receipts: IdempotencyCache<FundsReceipt>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl House {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self::with_rng(store, StdRng::from_entropy())
    }

    /// Deterministic house for tests and replays
    pub fn with_seed(store: Arc<dyn LedgerStore>, seed: u64) -> Self {
        Self::with_rng(store, StdRng::seed_from_u64(seed))
    }

    fn with_rng(store: Arc<dyn LedgerStore>, rng: StdRng) -> Self {
        Self {
            store,
            rng: Mutex::new(rng),
            rounds: Mutex::new(RoundBook::default()),
            round_id_counter: AtomicU64::new(1),
            challenges: ChallengeBook::new(),
            address_lock: Mutex::new(()),
            slots_receipts: IdempotencyCache::new(),
            roulette_receipts: IdempotencyCache::new(),
            deal_receipts: IdempotencyCache::new(),
            sports_receipts: IdempotencyCache::new(),
            deposit_receipts: IdempotencyCache::new(),
            withdraw_receipts: IdempotencyCache::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        lock(&self.rng)
    }

    /// Current balance, zero when the row was never written
    fn current_balance(&self, user_id: UserId, currency: Currency) -> Balance {
        self.store.balance(user_id, currency).unwrap_or(Balance {
            user_id,
            currency,
            amount: 0.0,
            updated_at: current_timestamp(),
        })
    }

    // ---- accounts ----

    pub fn signup(&self, request: SignupRequest) -> Result<User> {
        auth::validate_signup(
            &request.username,
            &request.email,
            &request.password,
            &request.confirm_password,
        )?;

        let user = self.store.insert_user(NewUser {
            username: request.username.trim().to_string(),
            email: request.email.trim().to_string(),
            password_hash: auth::hash_password(&request.password)?,
        })?;
        for (currency, amount) in SIGNUP_BALANCES {
            self.store.set_balance(user.id, currency, amount)?;
        }

        tracing::info!(user_id = user.id, username = %user.username, "user signed up");
        Ok(user)
    }

    pub fn login(&self, username: &str, password: &str) -> Result<User> {
        let user = self
            .store
            .user_by_username(username.trim())
            .ok_or(CasinoError::InvalidCredentials)?;
        if !auth::verify_password(password, &user.password_hash) {
            tracing::warn!(user_id = user.id, "failed login");
            return Err(CasinoError::InvalidCredentials);
        }
        Ok(user)
    }

    pub fn user(&self, user_id: UserId) -> Result<User> {
        self.store
            .user(user_id)
            .ok_or(CasinoError::UserNotFound(user_id))
    }

    // ---- wallet ----

    pub fn wallet_challenge(&self, user_id: UserId) -> Result<Challenge> {
        self.user(user_id)?;
        Ok(self.challenges.issue(user_id))
    }

    /// Links `address` after checking `signature` over the outstanding challenge
    pub fn connect_wallet(&self, user_id: UserId, address: &str, signature: &str) -> Result<User> {
        self.user(user_id)?;
        let challenge = self.challenges.take(user_id)?;
        wallet::verify_wallet_proof(address, &challenge.message, signature)?;

        let address = wallet::normalize_address(address);
        let user = self.store.set_wallet_address(user_id, &address)?;
        tracing::info!(user_id, address = %address, "wallet linked");
        Ok(user)
    }

    pub fn balances(&self, user_id: UserId) -> Result<Vec<Balance>> {
        self.user(user_id)?;
        Ok(self.store.balances(user_id))
    }

    /// Newest first, optionally capped
    pub fn transactions(&self, user_id: UserId, limit: Option<usize>) -> Result<Vec<Transaction>> {
        self.user(user_id)?;
        let mut transactions = self.store.transactions(user_id);
        if let Some(limit) = limit {
            transactions.truncate(limit);
        }
        Ok(transactions)
    }

    pub fn deposit_address(&self, user_id: UserId, currency: Currency) -> Result<DepositAddress> {
        self.user(user_id)?;
        let _guard = lock(&self.address_lock);
        if let Some(existing) = self.store.deposit_address(user_id, currency) {
            return Ok(existing);
        }
        self.store.insert_deposit_address(DepositAddress {
            user_id,
            currency,
            address: wallet::generate_deposit_address(currency),
            is_active: true,
            created_at: current_timestamp(),
        })
    }

    pub fn deposit(
        &self,
        user_id: UserId,
        request: DepositRequest,
        key: Option<&str>,
    ) -> Result<FundsReceipt> {
        self.deposit_receipts.run(user_id, key, &request, || {
            validate_amount(request.amount, "Deposit amount")?;
            let (balance, transaction) =
                self.store.apply(user_id, request.currency, &mut |_| {
                    Ok(LedgerEntry::new(TransactionKind::Deposit, request.amount)
                        .tx_hash(wallet::generate_tx_hash()))
                })?;
            tracing::info!(user_id, currency = %request.currency, amount = request.amount, "deposit");
            Ok(FundsReceipt {
                balance,
                transaction,
            })
        })
    }

    pub fn withdraw(
        &self,
        user_id: UserId,
        request: WithdrawRequest,
        key: Option<&str>,
    ) -> Result<FundsReceipt> {
        self.withdraw_receipts.run(user_id, key, &request, || {
            validate_amount(request.amount, "Withdrawal amount")?;
            if request.destination.trim().is_empty() {
                return Err(CasinoError::validation("Destination address is required"));
            }
            let (balance, transaction) =
                self.store.apply(user_id, request.currency, &mut |available| {
                    if available < request.amount {
                        return Err(CasinoError::InsufficientBalance {
                            currency: request.currency,
                            available,
                            required: request.amount,
                        });
                    }
                    Ok(LedgerEntry::new(TransactionKind::Withdrawal, -request.amount)
                        .tx_hash(wallet::generate_tx_hash()))
                })?;
            tracing::info!(
                user_id,
                currency = %request.currency,
                amount = request.amount,
                destination = %request.destination,
                "withdrawal"
            );
            Ok(FundsReceipt {
                balance,
                transaction,
            })
        })
    }

    // ---- instant games ----

    /// Resolves a single-shot game under the row lock and records one transaction
    fn settle_instant(
        &self,
        user_id: UserId,
        currency: Currency,
        game: GameType,
        stake: f64,
        resolve: &mut dyn FnMut(&mut StdRng) -> GameOutcome,
    ) -> Result<BetReceipt> {
        let mut outcome = None;
        let (balance, transaction) = self.store.apply(user_id, currency, &mut |available| {
            if available < stake {
                return Err(CasinoError::InsufficientBalance {
                    currency,
                    available,
                    required: stake,
                });
            }
            let resolved = resolve(&mut *self.rng());
            let net = resolved.payout() - stake;
            let kind = if net > 0.0 {
                TransactionKind::Win
            } else {
                TransactionKind::Bet
            };
            outcome = Some(resolved);
            Ok(LedgerEntry::new(kind, net).game(game))
        })?;

        let outcome = outcome
            .ok_or_else(|| CasinoError::Storage("game settled without an outcome".into()))?;
        tracing::info!(
            user_id,
            game = ?game,
            %currency,
            stake,
            payout = outcome.payout(),
            "bet settled"
        );
        Ok(BetReceipt {
            outcome,
            balance,
            transactions: vec![transaction],
        })
    }

    pub fn play_slots(&self, user_id: UserId, bet: SlotsBet, key: Option<&str>) -> Result<BetReceipt> {
        self.slots_receipts.run(user_id, key, &bet, || {
            validate_amount(bet.stake, "Bet amount")?;
            self.settle_instant(user_id, bet.currency, GameType::Slots, bet.stake, &mut |rng| {
                GameOutcome::Slots(slots::resolve(slots::spin(rng), bet.stake))
            })
        })
    }

    pub fn play_roulette(
        &self,
        user_id: UserId,
        request: RouletteRequest,
        key: Option<&str>,
    ) -> Result<BetReceipt> {
        self.roulette_receipts.run(user_id, key, &request, || {
            let total_stake = roulette::validate_bets(&request.bets)?;
            self.settle_instant(
                user_id,
                request.currency,
                GameType::Roulette,
                total_stake,
                &mut |rng| {
                    GameOutcome::Roulette(roulette::resolve(roulette::spin(rng), &request.bets))
                },
            )
        })
    }

    // ---- blackjack ----

    fn rounds(&self) -> MutexGuard<'_, RoundBook> {
        lock(&self.rounds)
    }

    /// Credits the payout of a finished round, if any
    fn credit_round(
        &self,
        round: &BlackjackRound,
        transactions: &mut Vec<Transaction>,
    ) -> Result<Option<Balance>> {
        let Some(payout) = round.payout() else {
            return Ok(None);
        };
        tracing::info!(
            user_id = round.user_id,
            round_id = round.id,
            result = ?round.result(),
            stake = round.total_stake(),
            payout,
            "blackjack round settled"
        );
        if payout <= 0.0 {
            return Ok(None);
        }
        let (balance, transaction) = self.store.apply(round.user_id, round.currency, &mut |_| {
            Ok(LedgerEntry::new(TransactionKind::Win, payout).game(GameType::Blackjack))
        })?;
        transactions.push(transaction);
        Ok(Some(balance))
    }

    pub fn blackjack_deal(
        &self,
        user_id: UserId,
        request: BlackjackDeal,
        key: Option<&str>,
    ) -> Result<BetReceipt> {
        self.deal_receipts.run(user_id, key, &request, || {
            validate_amount(request.stake, "Bet amount")?;
            let id = self.round_id_counter.fetch_add(1, Ordering::SeqCst);
            let deck = blackjack::shuffled_deck(&mut *self.rng());
            let round = BlackjackRound::deal(id, user_id, request.currency, request.stake, deck)?;

            let mut rounds = self.rounds();
            rounds.check_capacity(user_id)?;
            let (balance, bet) = self.store.apply(user_id, request.currency, &mut |_| {
                Ok(LedgerEntry::new(TransactionKind::Bet, -request.stake).game(GameType::Blackjack))
            })?;
            let mut transactions = vec![bet];
            let balance = self
                .credit_round(&round, &mut transactions)?
                .unwrap_or(balance);

            let view = round.view();
            rounds.insert(round);
            Ok(BetReceipt {
                outcome: GameOutcome::Blackjack(view),
                balance,
                transactions,
            })
        })
    }

    pub fn blackjack_hit(&self, user_id: UserId, round_id: u64) -> Result<BetReceipt> {
        self.blackjack_action(user_id, round_id, |round| round.hit())
    }

    pub fn blackjack_stand(&self, user_id: UserId, round_id: u64) -> Result<BetReceipt> {
        self.blackjack_action(user_id, round_id, |round| round.stand())
    }

    /// Debits a second stake, draws one card and plays out the dealer
    pub fn blackjack_double(&self, user_id: UserId, round_id: u64) -> Result<BetReceipt> {
        let mut rounds = self.rounds();
        let round = rounds.owned(user_id, round_id)?;
        if !round.can_double() {
            return Err(CasinoError::IllegalMove(
                "double down is only allowed on the first two cards",
            ));
        }

        let extra = round.base_stake();
        let (balance, bet) = self.store.apply(user_id, round.currency, &mut |_| {
            Ok(LedgerEntry::new(TransactionKind::Bet, -extra).game(GameType::Blackjack))
        })?;
        round.double()?;

        let mut transactions = vec![bet];
        let balance = self
            .credit_round(round, &mut transactions)?
            .unwrap_or(balance);
        let receipt = BetReceipt {
            outcome: GameOutcome::Blackjack(round.view()),
            balance,
            transactions,
        };
        if round.is_complete() {
            rounds.finish(user_id, round_id);
        }
        Ok(receipt)
    }

    fn blackjack_action(
        &self,
        user_id: UserId,
        round_id: u64,
        action: impl FnOnce(&mut BlackjackRound) -> Result<()>,
    ) -> Result<BetReceipt> {
        let mut rounds = self.rounds();
        let round = rounds.owned(user_id, round_id)?;
        action(round)?;

        let mut transactions = Vec::new();
        let balance = match self.credit_round(round, &mut transactions)? {
            Some(balance) => balance,
            None => self.current_balance(user_id, round.currency),
        };
        let receipt = BetReceipt {
            outcome: GameOutcome::Blackjack(round.view()),
            balance,
            transactions,
        };
        if round.is_complete() {
            rounds.finish(user_id, round_id);
        }
        Ok(receipt)
    }

    pub fn blackjack_round(&self, user_id: UserId, round_id: u64) -> Result<BlackjackView> {
        Ok(self.rounds().owned(user_id, round_id)?.view())
    }

    // ---- sports ----

    pub fn matches(&self, sport: Option<&str>) -> Vec<MatchListing> {
        let matches = match sport {
            Some(sport) if !sport.trim().is_empty() => self.store.matches_by_sport(sport.trim()),
            _ => self.store.matches(),
        };
        matches.into_iter().map(MatchListing::from).collect()
    }

    pub fn sports_bets(&self, user_id: UserId) -> Result<Vec<SportsBet>> {
        self.user(user_id)?;
        Ok(self.store.sports_bets(user_id))
    }

    pub fn place_sports_bet(
        &self,
        user_id: UserId,
        request: SportsBetRequest,
        key: Option<&str>,
    ) -> Result<SportsBetReceipt> {
        self.sports_receipts.run(user_id, key, &request, || {
            let sports_match = self
                .store
                .match_by_external_id(&request.match_id)
                .ok_or_else(|| CasinoError::MatchNotFound(request.match_id.clone()))?;
            let selection = sportsbook::check_slip(&sports_match, &request.selection_id, request.odds)?;
            validate_amount(request.stake, "Stake")?;

            let (balance, transaction) = self.store.apply(user_id, request.currency, &mut |_| {
                Ok(LedgerEntry::new(TransactionKind::Bet, -request.stake).game(GameType::Sports))
            })?;
            let bet = self.store.insert_sports_bet(NewSportsBet {
                user_id,
                match_id: sports_match.external_id.clone(),
                selection_id: selection.id(),
                odds: selection.outcome.odds(),
                stake: request.stake,
                currency: request.currency,
            });
            tracing::info!(
                user_id,
                bet_id = bet.id,
                selection = %bet.selection_id,
                stake = bet.stake,
                "sports bet placed"
            );

            // The match may have finished after the slip was checked; its
            // sweep could have missed this bet, so settle it here.
            if let Some(result) = self
                .store
                .match_by_external_id(&bet.match_id)
                .and_then(|m| m.result)
            {
                self.settle_bet(bet.id, result)?;
            }

            let bet = self.store.sports_bet(bet.id).unwrap_or(bet);
            let balance = self.store.balance(user_id, request.currency).unwrap_or(balance);
            Ok(SportsBetReceipt {
                balance,
                bet,
                transaction,
            })
        })
    }

    /// Moves one bet out of `pending`. Returns `None` if it was already settled.
    pub fn settle_bet(&self, bet_id: u64, result: MatchResult) -> Result<Option<SettledBet>> {
        let bet = self
            .store
            .sports_bet(bet_id)
            .ok_or(CasinoError::BetNotFound(bet_id))?;
        let selection = Selection::parse(&bet.selection_id)?;

        let (status, credit) = match selection.outcome.wins(result) {
            Some(true) => (BetStatus::Won, bet.potential_win),
            Some(false) => (BetStatus::Lost, 0.0),
            None => (BetStatus::Void, bet.stake),
        };

        let Some(bet) = self.store.transition_bet(bet_id, status)? else {
            return Ok(None);
        };

        let (balance, transaction) = if credit > 0.0 {
            let (balance, transaction) = self.store.apply(bet.user_id, bet.currency, &mut |_| {
                Ok(LedgerEntry::new(TransactionKind::Win, credit).game(GameType::Sports))
            })?;
            (Some(balance), Some(transaction))
        } else {
            (None, None)
        };

        tracing::info!(
            bet_id,
            user_id = bet.user_id,
            status = ?bet.status,
            credit,
            "sports bet settled"
        );
        Ok(Some(SettledBet {
            bet,
            balance,
            transaction,
        }))
    }

    /// Finishes a match and settles every pending bet on it.
    ///
    /// The first result recorded for a match is final; replays sweep with
    /// that result and only touch bets that are still pending.
    pub fn settle_match(&self, match_id: &str, result: MatchResult) -> Result<SettlementReport> {
        let sports_match = self.store.finish_match(match_id, result)?;
        let final_result = sports_match.result.unwrap_or(result);
        if final_result != result {
            tracing::warn!(
                match_id,
                recorded = ?final_result,
                requested = ?result,
                "match already finished with a different result"
            );
        }

        let mut settled = Vec::new();
        for bet in self.store.pending_bets_for_match(match_id) {
            if let Some(done) = self.settle_bet(bet.id, final_result)? {
                settled.push(done);
            }
        }

        tracing::info!(match_id, result = ?final_result, settled = settled.len(), "match settled");
        Ok(SettlementReport {
            sports_match,
            settled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::games::blackjack::Stage;
    use crate::games::roulette::BetKind;
    use crate::store::InMemoryStore;
    use crate::types::MAX_AMOUNT;
    use ed25519_dalek::{Signer, SigningKey};
    use std::thread;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {expected}, got {actual}"
        );
    }

    fn setup_house() -> (House, UserId) {
        let house = House::with_seed(Arc::new(InMemoryStore::new()), 42);
        let user = add_user(&house, "alice");
        (house, user)
    }

    // Skips password hashing; signup has its own test
    fn add_user(house: &House, name: &str) -> UserId {
        let user = house
            .store()
            .insert_user(NewUser {
                username: name.into(),
                email: format!("{name}@example.com"),
                password_hash: String::new(),
            })
            .unwrap();
        for (currency, amount) in SIGNUP_BALANCES {
            house.store().set_balance(user.id, currency, amount).unwrap();
        }
        user.id
    }

    fn btc(house: &House, user_id: UserId) -> f64 {
        house.store().balance(user_id, Currency::Btc).unwrap().amount
    }

    fn ledger_sum(house: &House, user_id: UserId, currency: Currency) -> f64 {
        house
            .store()
            .transactions(user_id)
            .iter()
            .filter(|tx| tx.currency == currency)
            .map(|tx| tx.amount)
            .sum()
    }

    fn slots_bet(stake: f64) -> SlotsBet {
        SlotsBet {
            stake,
            currency: Currency::Btc,
        }
    }

    fn soccer_bet(selection: &str, odds: f64, stake: f64) -> SportsBetRequest {
        SportsBetRequest {
            match_id: "soccer-1".into(),
            selection_id: selection.into(),
            odds,
            stake,
            currency: Currency::Btc,
        }
    }

    #[test]
    fn test_signup_and_login() {
        let house = House::new(Arc::new(InMemoryStore::new()));
        let user = house
            .signup(SignupRequest {
                username: "bob".into(),
                email: "bob@example.com".into(),
                password: "secret1".into(),
                confirm_password: "secret1".into(),
            })
            .unwrap();

        let balances = house.balances(user.id).unwrap();
        assert_eq!(balances.len(), 2);
        assert_close(balances[0].amount, 0.01);
        assert_close(balances[1].amount, 0.1);

        assert_eq!(house.login("bob", "secret1").unwrap().id, user.id);
        assert_eq!(house.login("bob", "wrong"), Err(CasinoError::InvalidCredentials));
        assert_eq!(house.login("nobody", "secret1"), Err(CasinoError::InvalidCredentials));
    }

    #[test]
    fn test_slots_records_one_transaction_with_net_amount() {
        let (house, user) = setup_house();
        let before = btc(&house, user);

        let receipt = house.play_slots(user, slots_bet(0.001), None).unwrap();
        assert_eq!(receipt.transactions.len(), 1);

        let tx = &receipt.transactions[0];
        let net = receipt.outcome.payout() - 0.001;
        assert_close(tx.amount, net);
        assert_eq!(tx.game_type, Some(GameType::Slots));
        if net > 0.0 {
            assert_eq!(tx.kind, TransactionKind::Win);
        } else {
            assert_eq!(tx.kind, TransactionKind::Bet);
        }
        assert_close(receipt.balance.amount, before + net);
        assert_close(btc(&house, user), before + net);
    }

    #[test]
    fn test_many_spins_keep_ledger_consistent() {
        let (house, user) = setup_house();
        house
            .deposit(user, DepositRequest { amount: 10.0, currency: Currency::Btc }, None)
            .unwrap();

        for _ in 0..300 {
            house.play_slots(user, slots_bet(0.01), None).unwrap();
        }
        assert_close(btc(&house, user), 0.01 + ledger_sum(&house, user, Currency::Btc));
    }

    #[test]
    fn test_stake_validation() {
        let (house, user) = setup_house();
        for stake in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                house.play_slots(user, slots_bet(stake), None),
                Err(CasinoError::Validation(_))
            ));
        }
        assert!(house.store().transactions(user).is_empty());
    }

    #[test]
    fn test_insufficient_balance_rejects_without_transaction() {
        let (house, user) = setup_house();

        let err = house
            .blackjack_deal(user, BlackjackDeal { stake: 0.02, currency: Currency::Btc }, None)
            .unwrap_err();
        assert!(matches!(err, CasinoError::InsufficientBalance { .. }));

        let err = house.play_slots(user, slots_bet(0.02), None).unwrap_err();
        assert!(matches!(err, CasinoError::InsufficientBalance { .. }));

        assert_close(btc(&house, user), 0.01);
        assert!(house.store().transactions(user).is_empty());
    }

    #[test]
    fn test_unseeded_currency_has_no_funds() {
        let (house, user) = setup_house();
        let request = SlotsBet { stake: 1.0, currency: Currency::Sol };
        assert!(matches!(
            house.play_slots(user, request, None),
            Err(CasinoError::InsufficientBalance { .. })
        ));
    }

    #[test]
    fn test_roulette_net_matches_outcome() {
        let (house, user) = setup_house();
        let request = RouletteRequest {
            currency: Currency::Btc,
            bets: vec![
                RouletteBet { kind: BetKind::Red, stake: 0.001 },
                RouletteBet { kind: BetKind::Straight(7), stake: 0.001 },
            ],
        };

        let receipt = house.play_roulette(user, request, None).unwrap();
        let GameOutcome::Roulette(outcome) = &receipt.outcome else {
            panic!("expected a roulette outcome");
        };
        assert_close(outcome.total_stake, 0.002);
        assert_close(receipt.transactions[0].amount, outcome.total_payout - 0.002);
        assert_close(btc(&house, user), 0.01 + outcome.total_payout - 0.002);
    }

    #[test]
    fn test_roulette_rejects_bad_bets_before_spinning() {
        let (house, user) = setup_house();
        let request = RouletteRequest {
            currency: Currency::Btc,
            bets: vec![RouletteBet { kind: BetKind::Straight(40), stake: 0.001 }],
        };
        assert!(house.play_roulette(user, request, None).is_err());
        assert!(house.store().transactions(user).is_empty());
    }

    #[test]
    fn test_blackjack_round_nets_payout_minus_stake() {
        let (house, user) = setup_house();

        for _ in 0..20 {
            let before = btc(&house, user);
            let receipt = house
                .blackjack_deal(user, BlackjackDeal { stake: 0.0001, currency: Currency::Btc }, None)
                .unwrap();
            let GameOutcome::Blackjack(view) = receipt.outcome else {
                panic!("expected a blackjack view");
            };
            assert_eq!(receipt.transactions[0].kind, TransactionKind::Bet);
            assert_close(receipt.transactions[0].amount, -0.0001);

            let view = if view.stage == Stage::PlayerTurn {
                assert_eq!(view.dealer.len(), 1);
                match house.blackjack_stand(user, view.round_id).unwrap().outcome {
                    GameOutcome::Blackjack(view) => view,
                    other => panic!("unexpected outcome {other:?}"),
                }
            } else {
                view
            };

            assert_eq!(view.stage, Stage::Complete);
            let payout = view.payout.unwrap();
            assert_close(btc(&house, user), before + payout - 0.0001);
        }
        assert_close(btc(&house, user), 0.01 + ledger_sum(&house, user, Currency::Btc));
    }

    #[test]
    fn test_blackjack_double_debits_twice() {
        let (house, user) = setup_house();

        // Find a round that is still in play
        let view = loop {
            let receipt = house
                .blackjack_deal(user, BlackjackDeal { stake: 0.001, currency: Currency::Btc }, None)
                .unwrap();
            match receipt.outcome {
                GameOutcome::Blackjack(view) if view.can_double => break view,
                _ => continue,
            }
        };

        let before = btc(&house, user);
        let receipt = house.blackjack_double(user, view.round_id).unwrap();
        let GameOutcome::Blackjack(done) = receipt.outcome else {
            panic!("expected a blackjack view");
        };

        assert_eq!(done.stage, Stage::Complete);
        assert!(done.doubled);
        assert_eq!(done.player.len(), 3);
        assert_close(done.stake, 0.002);
        assert_eq!(receipt.transactions[0].kind, TransactionKind::Bet);
        assert_close(receipt.transactions[0].amount, -0.001);
        assert_close(btc(&house, user), before - 0.001 + done.payout.unwrap());

        assert!(matches!(
            house.blackjack_double(user, view.round_id),
            Err(CasinoError::IllegalMove(_))
        ));
        assert!(matches!(
            house.blackjack_hit(user, view.round_id),
            Err(CasinoError::IllegalMove(_))
        ));
    }

    fn deal(house: &House, user: UserId) -> BlackjackView {
        let receipt = house
            .blackjack_deal(user, BlackjackDeal { stake: 0.0001, currency: Currency::Btc }, None)
            .unwrap();
        match receipt.outcome {
            GameOutcome::Blackjack(view) => view,
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_finished_rounds_are_evicted_past_cap() {
        let (house, user) = setup_house();

        let mut ids = Vec::new();
        for _ in 0..=FINISHED_ROUNDS_KEPT {
            let view = deal(&house, user);
            if view.stage == Stage::PlayerTurn {
                house.blackjack_stand(user, view.round_id).unwrap();
            }
            ids.push(view.round_id);
        }

        assert_eq!(
            house.blackjack_round(user, ids[0]),
            Err(CasinoError::RoundNotFound(ids[0]))
        );
        for id in &ids[1..] {
            assert_eq!(house.blackjack_round(user, *id).unwrap().stage, Stage::Complete);
        }
    }

    #[test]
    fn test_open_rounds_are_capped_per_user() {
        let (house, user) = setup_house();
        let bob = add_user(&house, "bob");

        let mut open = Vec::new();
        while open.len() < MAX_OPEN_ROUNDS {
            let view = deal(&house, user);
            if view.stage == Stage::PlayerTurn {
                open.push(view.round_id);
            }
        }

        let before = btc(&house, user);
        let refused =
            house.blackjack_deal(user, BlackjackDeal { stake: 0.0001, currency: Currency::Btc }, None);
        assert!(matches!(refused, Err(CasinoError::Validation(_))));
        assert_eq!(btc(&house, user), before);

        // Other players are unaffected, and finishing a round frees a place
        deal(&house, bob);
        house.blackjack_stand(user, open[0]).unwrap();
        deal(&house, user);
    }

    #[test]
    fn test_bet_receipt_wire_shape() {
        let (house, user) = setup_house();
        let receipt = house
            .play_slots(user, SlotsBet { stake: 0.001, currency: Currency::Btc }, None)
            .unwrap();
        let json = serde_json::to_value(&receipt).unwrap();
        assert_eq!(json["newBalance"]["amount"].as_f64().unwrap(), receipt.balance.amount);
        assert!(json.get("balance").is_none());
    }

    #[test]
    fn test_deposit_cannot_overflow_balance() {
        let (house, user) = setup_house();
        let huge = DepositRequest { amount: f64::MAX, currency: Currency::Eth };
        assert!(matches!(
            house.deposit(user, huge, None),
            Err(CasinoError::Validation(_))
        ));

        let max = DepositRequest { amount: MAX_AMOUNT, currency: Currency::Eth };
        house.deposit(user, max.clone(), None).unwrap();
        house.deposit(user, max, None).unwrap();
        let receipt = house
            .play_slots(user, SlotsBet { stake: 1.0, currency: Currency::Eth }, None)
            .unwrap();
        assert!(receipt.balance.amount.is_finite());
    }

    #[test]
    fn test_blackjack_rounds_are_private() {
        let (house, alice) = setup_house();
        let bob = add_user(&house, "bob");

        let receipt = house
            .blackjack_deal(alice, BlackjackDeal { stake: 0.001, currency: Currency::Btc }, None)
            .unwrap();
        let GameOutcome::Blackjack(view) = receipt.outcome else {
            panic!("expected a blackjack view");
        };

        assert_eq!(house.blackjack_round(alice, view.round_id).unwrap().round_id, view.round_id);
        assert_eq!(
            house.blackjack_round(bob, view.round_id),
            Err(CasinoError::RoundNotFound(view.round_id))
        );
        assert_eq!(
            house.blackjack_stand(bob, view.round_id).unwrap_err(),
            CasinoError::RoundNotFound(view.round_id)
        );
        assert!(house.blackjack_hit(alice, 9_999).is_err());
    }

    #[test]
    fn test_idempotent_replay_returns_original_receipt() {
        let (house, user) = setup_house();

        let first = house.play_slots(user, slots_bet(0.001), Some("spin-1")).unwrap();
        let replay = house.play_slots(user, slots_bet(0.001), Some("spin-1")).unwrap();
        assert_eq!(first, replay);
        assert_eq!(house.store().transactions(user).len(), 1);

        assert_eq!(
            house.play_slots(user, slots_bet(0.002), Some("spin-1")),
            Err(CasinoError::IdempotencyConflict)
        );

        // Same key in another family is independent
        let deal = BlackjackDeal { stake: 0.001, currency: Currency::Btc };
        assert!(house.blackjack_deal(user, deal, Some("spin-1")).is_ok());
    }

    #[test]
    fn test_sports_bet_settles_once() {
        let (house, user) = setup_house();

        let receipt = house
            .place_sports_bet(user, soccer_bet("home-soccer-1", 2.10, 0.001), None)
            .unwrap();
        assert_eq!(receipt.bet.status, BetStatus::Pending);
        assert_close(receipt.bet.potential_win, 0.0021);
        assert_close(receipt.transaction.amount, -0.001);
        assert_eq!(receipt.transaction.game_type, Some(GameType::Sports));
        assert_close(btc(&house, user), 0.009);

        let report = house.settle_match("soccer-1", MatchResult::Home).unwrap();
        assert_eq!(report.settled.len(), 1);
        assert_eq!(report.settled[0].bet.status, BetStatus::Won);
        assert_close(btc(&house, user), 0.009 + 0.0021);

        // Replays never credit twice
        let replay = house.settle_match("soccer-1", MatchResult::Home).unwrap();
        assert!(replay.settled.is_empty());
        assert_eq!(house.settle_bet(receipt.bet.id, MatchResult::Home).unwrap(), None);
        assert_close(btc(&house, user), 0.009 + 0.0021);

        let wins = house
            .store()
            .transactions(user)
            .into_iter()
            .filter(|tx| tx.kind == TransactionKind::Win)
            .count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn test_losing_sports_bet_keeps_stake() {
        let (house, user) = setup_house();
        house
            .place_sports_bet(user, soccer_bet("away-soccer-1", 3.60, 0.002), None)
            .unwrap();

        let report = house.settle_match("soccer-1", MatchResult::Draw).unwrap();
        assert_eq!(report.settled[0].bet.status, BetStatus::Lost);
        assert!(report.settled[0].transaction.is_none());
        assert_close(btc(&house, user), 0.008);
    }

    #[test]
    fn test_void_match_refunds_stake() {
        let (house, user) = setup_house();
        house
            .place_sports_bet(user, soccer_bet("draw-soccer-1", 3.25, 0.004), None)
            .unwrap();

        let report = house.settle_match("soccer-1", MatchResult::Void).unwrap();
        let settled = &report.settled[0];
        assert_eq!(settled.bet.status, BetStatus::Void);
        assert_close(settled.transaction.as_ref().unwrap().amount, 0.004);
        assert_close(btc(&house, user), 0.01);
    }

    #[test]
    fn test_first_match_result_is_final() {
        let (house, user) = setup_house();
        house
            .place_sports_bet(user, soccer_bet("home-soccer-1", 2.10, 0.001), None)
            .unwrap();
        house.settle_match("soccer-1", MatchResult::Away).unwrap();

        let report = house.settle_match("soccer-1", MatchResult::Home).unwrap();
        assert_eq!(report.sports_match.result, Some(MatchResult::Away));
        assert_close(btc(&house, user), 0.009);
    }

    #[test]
    fn test_rejected_sports_bets_leave_ledger_untouched() {
        let (house, user) = setup_house();

        // Stale odds
        assert!(matches!(
            house.place_sports_bet(user, soccer_bet("home-soccer-1", 2.00, 0.001), None),
            Err(CasinoError::Validation(_))
        ));
        // Unknown match
        let mut unknown = soccer_bet("home-soccer-9", 2.10, 0.001);
        unknown.match_id = "soccer-9".into();
        assert_eq!(
            house.place_sports_bet(user, unknown, None),
            Err(CasinoError::MatchNotFound("soccer-9".into()))
        );
        // Selection from another match
        assert!(
            house
                .place_sports_bet(user, soccer_bet("home-soccer-2", 2.10, 0.001), None)
                .is_err()
        );
        // Over the balance
        assert!(matches!(
            house.place_sports_bet(user, soccer_bet("home-soccer-1", 2.10, 1.0), None),
            Err(CasinoError::InsufficientBalance { .. })
        ));
        // Finished match
        house.settle_match("soccer-1", MatchResult::Home).unwrap();
        assert_eq!(
            house.place_sports_bet(user, soccer_bet("home-soccer-1", 2.10, 0.001), None),
            Err(CasinoError::MatchFinished("soccer-1".into()))
        );

        assert_close(btc(&house, user), 0.01);
        assert!(house.store().transactions(user).is_empty());
        assert!(house.sports_bets(user).unwrap().is_empty());
    }

    #[test]
    fn test_matches_filter_by_sport() {
        let (house, _) = setup_house();
        assert_eq!(house.matches(None).len(), 4);
        assert_eq!(house.matches(Some("Soccer")).len(), 2);
        assert_eq!(house.matches(Some("")).len(), 4);
        assert!(house.matches(Some("cricket")).is_empty());
    }

    #[test]
    fn test_deposit_and_withdraw() {
        let (house, user) = setup_house();

        let deposit = house
            .deposit(user, DepositRequest { amount: 1.5, currency: Currency::Sol }, None)
            .unwrap();
        assert_eq!(deposit.transaction.kind, TransactionKind::Deposit);
        assert!(deposit.transaction.tx_hash.is_some());
        assert_close(deposit.balance.amount, 1.5);

        let withdraw = WithdrawRequest {
            amount: 2.0,
            currency: Currency::Sol,
            destination: "So1abc".into(),
        };
        assert!(matches!(
            house.withdraw(user, withdraw.clone(), None),
            Err(CasinoError::InsufficientBalance { .. })
        ));

        let receipt = house
            .withdraw(user, WithdrawRequest { amount: 0.5, ..withdraw }, None)
            .unwrap();
        assert_eq!(receipt.transaction.kind, TransactionKind::Withdrawal);
        assert_close(receipt.transaction.amount, -0.5);
        assert_close(receipt.balance.amount, 1.0);
    }

    #[test]
    fn test_deposit_address_is_stable() {
        let (house, user) = setup_house();
        let first = house.deposit_address(user, Currency::Eth).unwrap();
        let second = house.deposit_address(user, Currency::Eth).unwrap();
        assert_eq!(first, second);
        assert!(first.address.starts_with("0x"));
        assert_ne!(house.deposit_address(user, Currency::Ltc).unwrap().address, first.address);
    }

    #[test]
    fn test_transactions_limit() {
        let (house, user) = setup_house();
        for _ in 0..5 {
            house.play_slots(user, slots_bet(0.0001), None).unwrap();
        }
        let limited = house.transactions(user, Some(2)).unwrap();
        assert_eq!(limited.len(), 2);
        assert!(limited[0].id > limited[1].id);
        assert_eq!(house.transactions(user, None).unwrap().len(), 5);
    }

    #[test]
    fn test_connect_wallet() {
        let (house, alice) = setup_house();
        let bob = add_user(&house, "bob");
        let signing = SigningKey::generate(&mut rand::rngs::OsRng);
        let address = hex::encode(signing.verifying_key().to_bytes());

        // No challenge issued yet
        assert!(house.connect_wallet(alice, &address, "00").is_err());

        let challenge = house.wallet_challenge(alice).unwrap();
        let signature = hex::encode(signing.sign(challenge.message.as_bytes()).to_bytes());
        let user = house.connect_wallet(alice, &address, &signature).unwrap();
        assert_eq!(user.wallet_address.as_deref(), Some(address.as_str()));

        // The same key cannot be linked to a second account
        let challenge = house.wallet_challenge(bob).unwrap();
        let signature = hex::encode(signing.sign(challenge.message.as_bytes()).to_bytes());
        assert_eq!(
            house.connect_wallet(bob, &address, &signature),
            Err(CasinoError::WalletInUse)
        );
    }

    #[test]
    fn test_connect_wallet_rejects_wrong_message() {
        let (house, alice) = setup_house();
        let signing = SigningKey::generate(&mut rand::rngs::OsRng);
        let address = hex::encode(signing.verifying_key().to_bytes());

        house.wallet_challenge(alice).unwrap();
        let signature = hex::encode(signing.sign(b"some other message").to_bytes());
        assert!(matches!(
            house.connect_wallet(alice, &address, &signature),
            Err(CasinoError::InvalidWalletProof(_))
        ));
        assert!(house.user(alice).unwrap().wallet_address.is_none());
    }

    #[test]
    fn test_concurrent_bets_never_overdraw() {
        let house = Arc::new(House::with_seed(Arc::new(InMemoryStore::new()), 7));
        let user = add_user(&house, "carol");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let house = house.clone();
                thread::spawn(move || {
                    for j in 0..50 {
                        let _ = if (i + j) % 2 == 0 {
                            house.play_slots(user, slots_bet(0.001), None).map(|_| ())
                        } else {
                            house
                                .place_sports_bet(user, soccer_bet("home-soccer-1", 2.10, 0.001), None)
                                .map(|_| ())
                        };
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let balance = btc(&house, user);
        assert!(balance >= 0.0);
        assert_close(balance, 0.01 + ledger_sum(&house, user, Currency::Btc));
    }
}
