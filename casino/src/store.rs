use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use crate::error::{CasinoError, Result};
use crate::types::{
    current_timestamp, Balance, BetStatus, Currency, DepositAddress, LedgerEntry, MatchResult,
    MatchStatus, NewSportsBet, NewTransaction, NewUser, SportsBet, SportsMatch, Transaction,
    TransactionStatus, User, UserId,
};

/// Repository interface for the ledger and everything hanging off a user.
///
/// `apply` is the only way settlement touches balances: the closure runs while
/// the (user, currency) row is locked, so the read, the balance check, the
/// write and the transaction append happen as one step.
pub trait LedgerStore: Send + Sync {
    // Users
    fn insert_user(&self, user: NewUser) -> Result<User>;
    fn user(&self, id: UserId) -> Option<User>;
    fn user_by_username(&self, username: &str) -> Option<User>;
    fn user_by_email(&self, email: &str) -> Option<User>;
    fn user_by_wallet(&self, address: &str) -> Option<User>;
    fn set_wallet_address(&self, id: UserId, address: &str) -> Result<User>;

    // Balances
    fn balance(&self, user_id: UserId, currency: Currency) -> Option<Balance>;
    fn balances(&self, user_id: UserId) -> Vec<Balance>;
    fn set_balance(&self, user_id: UserId, currency: Currency, amount: f64) -> Result<Balance>;
    fn apply(
        &self,
        user_id: UserId,
        currency: Currency,
        f: &mut dyn FnMut(f64) -> Result<LedgerEntry>,
    ) -> Result<(Balance, Transaction)>;

    // Transactions
    fn append_transaction(&self, tx: NewTransaction) -> Transaction;
    fn transactions(&self, user_id: UserId) -> Vec<Transaction>;

    // Sports
    fn insert_sports_bet(&self, bet: NewSportsBet) -> SportsBet;
    fn sports_bet(&self, bet_id: u64) -> Option<SportsBet>;
    fn sports_bets(&self, user_id: UserId) -> Vec<SportsBet>;
    fn pending_bets_for_match(&self, match_id: &str) -> Vec<SportsBet>;
    fn transition_bet(&self, bet_id: u64, status: BetStatus) -> Result<Option<SportsBet>>;
    fn matches(&self) -> Vec<SportsMatch>;
    fn matches_by_sport(&self, sport_type: &str) -> Vec<SportsMatch>;
    fn match_by_external_id(&self, external_id: &str) -> Option<SportsMatch>;
    fn finish_match(&self, external_id: &str, result: MatchResult) -> Result<SportsMatch>;

    // Deposit addresses
    fn deposit_address(&self, user_id: UserId, currency: Currency) -> Option<DepositAddress>;
    fn insert_deposit_address(&self, address: DepositAddress) -> Result<DepositAddress>;
}

struct BalanceRow {
    amount: f64,
    updated_at: u64,
}

type RowHandle = Arc<Mutex<Option<BalanceRow>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding a row never leaves a half-written row behind,
    // so poisoned data is still consistent.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Process-lifetime store backed by hash maps.
pub struct InMemoryStore {
    users: RwLock<HashMap<UserId, User>>,
    rows: RwLock<HashMap<(UserId, Currency), RowHandle>>,
    transactions: Mutex<Vec<Transaction>>,
    sports_bets: Mutex<HashMap<u64, SportsBet>>,
    matches: RwLock<Vec<SportsMatch>>,
    deposit_addresses: Mutex<Vec<DepositAddress>>,
    user_id_counter: AtomicU64,
    transaction_id_counter: AtomicU64,
    bet_id_counter: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Empty store with no matches
    pub fn empty() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            rows: RwLock::new(HashMap::new()),
            transactions: Mutex::new(Vec::new()),
            sports_bets: Mutex::new(HashMap::new()),
            matches: RwLock::new(Vec::new()),
            deposit_addresses: Mutex::new(Vec::new()),
            user_id_counter: AtomicU64::new(1),
            transaction_id_counter: AtomicU64::new(1),
            bet_id_counter: AtomicU64::new(1),
        }
    }

    /// Store seeded with the static match list
    pub fn new() -> Self {
        let store = Self::empty();
        let now = current_timestamp();
        *store.matches.write().unwrap_or_else(|p| p.into_inner()) =
            crate::sportsbook::seed_matches(now);
        store
    }

    fn row(&self, user_id: UserId, currency: Currency) -> RowHandle {
        if let Some(row) = self
            .rows
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&(user_id, currency))
        {
            return row.clone();
        }
        self.rows
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .entry((user_id, currency))
            .or_insert_with(|| Arc::new(Mutex::new(None)))
            .clone()
    }

    fn existing_row(&self, user_id: UserId, currency: Currency) -> Option<RowHandle> {
        self.rows
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&(user_id, currency))
            .cloned()
    }

    fn require_user(&self, user_id: UserId) -> Result<()> {
        if self
            .users
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .contains_key(&user_id)
        {
            Ok(())
        } else {
            Err(CasinoError::UserNotFound(user_id))
        }
    }

    fn find_user(&self, predicate: impl Fn(&User) -> bool) -> Option<User> {
        self.users
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .find(|user| predicate(user))
            .cloned()
    }
}

impl LedgerStore for InMemoryStore {
    fn insert_user(&self, new_user: NewUser) -> Result<User> {
        let mut users = self.users.write().unwrap_or_else(|p| p.into_inner());

        // Uniqueness is checked under the write lock so two signups cannot race
        if users
            .values()
            .any(|u| u.username.eq_ignore_ascii_case(&new_user.username))
        {
            return Err(CasinoError::UsernameTaken);
        }
        if users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&new_user.email))
        {
            return Err(CasinoError::EmailTaken);
        }

        let id = self.user_id_counter.fetch_add(1, Ordering::SeqCst);
        let user = User {
            id,
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            wallet_address: None,
            created_at: current_timestamp(),
        };
        users.insert(id, user.clone());
        Ok(user)
    }

    fn user(&self, id: UserId) -> Option<User> {
        self.users
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(&id)
            .cloned()
    }

    fn user_by_username(&self, username: &str) -> Option<User> {
        self.find_user(|u| u.username.eq_ignore_ascii_case(username))
    }

    fn user_by_email(&self, email: &str) -> Option<User> {
        self.find_user(|u| u.email.eq_ignore_ascii_case(email))
    }

    fn user_by_wallet(&self, address: &str) -> Option<User> {
        self.find_user(|u| u.wallet_address.as_deref() == Some(address))
    }

    fn set_wallet_address(&self, id: UserId, address: &str) -> Result<User> {
        let mut users = self.users.write().unwrap_or_else(|p| p.into_inner());

        if users
            .values()
            .any(|u| u.id != id && u.wallet_address.as_deref() == Some(address))
        {
            return Err(CasinoError::WalletInUse);
        }

        let user = users.get_mut(&id).ok_or(CasinoError::UserNotFound(id))?;
        user.wallet_address = Some(address.to_string());
        Ok(user.clone())
    }

    fn balance(&self, user_id: UserId, currency: Currency) -> Option<Balance> {
        let row = self.existing_row(user_id, currency)?;
        let guard = lock(&row);
        guard.as_ref().map(|r| Balance {
            user_id,
            currency,
            amount: r.amount,
            updated_at: r.updated_at,
        })
    }

    fn balances(&self, user_id: UserId) -> Vec<Balance> {
        let mut balances: Vec<Balance> = Currency::ALL
            .into_iter()
            .filter_map(|currency| self.balance(user_id, currency))
            .collect();
        balances.sort_by_key(|b| b.currency);
        balances
    }

    fn set_balance(&self, user_id: UserId, currency: Currency, amount: f64) -> Result<Balance> {
        self.require_user(user_id)?;
        if !amount.is_finite() || amount < 0.0 {
            return Err(CasinoError::validation("Balance must be a non-negative number"));
        }

        let row = self.row(user_id, currency);
        let mut guard = lock(&row);
        let updated_at = current_timestamp();
        *guard = Some(BalanceRow { amount, updated_at });
        Ok(Balance {
            user_id,
            currency,
            amount,
            updated_at,
        })
    }

    fn apply(
        &self,
        user_id: UserId,
        currency: Currency,
        f: &mut dyn FnMut(f64) -> Result<LedgerEntry>,
    ) -> Result<(Balance, Transaction)> {
        self.require_user(user_id)?;

        let row = self.row(user_id, currency);
        let mut guard = lock(&row);
        let current = guard.as_ref().map(|r| r.amount).unwrap_or(0.0);

        let entry = f(current)?;
        if !entry.delta.is_finite() {
            return Err(CasinoError::Storage(format!(
                "non-finite ledger delta for user {user_id}"
            )));
        }

        let amount = current + entry.delta;
        if !amount.is_finite() {
            return Err(CasinoError::validation(format!(
                "{currency} balance would overflow"
            )));
        }
        if amount < 0.0 {
            return Err(CasinoError::InsufficientBalance {
                currency,
                available: current,
                required: -entry.delta,
            });
        }

        let updated_at = current_timestamp();
        *guard = Some(BalanceRow { amount, updated_at });

        // Appended before the row lock is released so the log never lags the balance
        let transaction = self.append_transaction(NewTransaction {
            user_id,
            kind: entry.kind,
            amount: entry.delta,
            currency,
            game_type: entry.game_type,
            status: TransactionStatus::Completed,
            tx_hash: entry.tx_hash,
        });

        Ok((
            Balance {
                user_id,
                currency,
                amount,
                updated_at,
            },
            transaction,
        ))
    }

    fn append_transaction(&self, tx: NewTransaction) -> Transaction {
        let transaction = Transaction {
            id: self.transaction_id_counter.fetch_add(1, Ordering::SeqCst),
            user_id: tx.user_id,
            kind: tx.kind,
            amount: tx.amount,
            currency: tx.currency,
            game_type: tx.game_type,
            status: tx.status,
            tx_hash: tx.tx_hash,
            created_at: current_timestamp(),
        };
        lock(&self.transactions).push(transaction.clone());
        transaction
    }

    fn transactions(&self, user_id: UserId) -> Vec<Transaction> {
        let mut transactions: Vec<Transaction> = lock(&self.transactions)
            .iter()
            .filter(|tx| tx.user_id == user_id)
            .cloned()
            .collect();
        transactions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        transactions
    }

    fn insert_sports_bet(&self, bet: NewSportsBet) -> SportsBet {
        let bet = SportsBet {
            id: self.bet_id_counter.fetch_add(1, Ordering::SeqCst),
            user_id: bet.user_id,
            match_id: bet.match_id,
            selection_id: bet.selection_id,
            odds: bet.odds,
            stake: bet.stake,
            currency: bet.currency,
            potential_win: bet.stake * bet.odds,
            status: BetStatus::Pending,
            created_at: current_timestamp(),
            settled_at: None,
        };
        lock(&self.sports_bets).insert(bet.id, bet.clone());
        bet
    }

    fn sports_bet(&self, bet_id: u64) -> Option<SportsBet> {
        lock(&self.sports_bets).get(&bet_id).cloned()
    }

    fn sports_bets(&self, user_id: UserId) -> Vec<SportsBet> {
        let mut bets: Vec<SportsBet> = lock(&self.sports_bets)
            .values()
            .filter(|bet| bet.user_id == user_id)
            .cloned()
            .collect();
        bets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        bets
    }

    fn pending_bets_for_match(&self, match_id: &str) -> Vec<SportsBet> {
        let mut bets: Vec<SportsBet> = lock(&self.sports_bets)
            .values()
            .filter(|bet| bet.match_id == match_id && bet.status == BetStatus::Pending)
            .cloned()
            .collect();
        bets.sort_by_key(|bet| bet.id);
        bets
    }

    fn transition_bet(&self, bet_id: u64, status: BetStatus) -> Result<Option<SportsBet>> {
        let mut bets = lock(&self.sports_bets);
        let bet = bets.get_mut(&bet_id).ok_or(CasinoError::BetNotFound(bet_id))?;

        // Only pending bets move; a replayed settlement is a no-op
        if bet.status != BetStatus::Pending || status == BetStatus::Pending {
            return Ok(None);
        }

        bet.status = status;
        bet.settled_at = Some(current_timestamp());
        Ok(Some(bet.clone()))
    }

    fn matches(&self) -> Vec<SportsMatch> {
        let mut matches = self.matches.read().unwrap_or_else(|p| p.into_inner()).clone();
        matches.sort_by_key(|m| m.start_time);
        matches
    }

    fn matches_by_sport(&self, sport_type: &str) -> Vec<SportsMatch> {
        self.matches()
            .into_iter()
            .filter(|m| m.sport_type.eq_ignore_ascii_case(sport_type))
            .collect()
    }

    fn match_by_external_id(&self, external_id: &str) -> Option<SportsMatch> {
        self.matches
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .find(|m| m.external_id == external_id)
            .cloned()
    }

    fn finish_match(&self, external_id: &str, result: MatchResult) -> Result<SportsMatch> {
        let mut matches = self.matches.write().unwrap_or_else(|p| p.into_inner());
        let sports_match = matches
            .iter_mut()
            .find(|m| m.external_id == external_id)
            .ok_or_else(|| CasinoError::MatchNotFound(external_id.to_string()))?;

        // The first recorded result wins; later events cannot rewrite it
        if sports_match.status != MatchStatus::Finished {
            sports_match.status = MatchStatus::Finished;
            sports_match.is_live = false;
            sports_match.result = Some(result);
        }
        Ok(sports_match.clone())
    }

    fn deposit_address(&self, user_id: UserId, currency: Currency) -> Option<DepositAddress> {
        lock(&self.deposit_addresses)
            .iter()
            .find(|a| a.user_id == user_id && a.currency == currency && a.is_active)
            .cloned()
    }

    fn insert_deposit_address(&self, address: DepositAddress) -> Result<DepositAddress> {
        self.require_user(address.user_id)?;
        let mut addresses = lock(&self.deposit_addresses);
        if addresses.iter().any(|a| a.address == address.address) {
            return Err(CasinoError::Storage("deposit address collision".to_string()));
        }
        addresses.push(address.clone());
        Ok(address)
    }
}
