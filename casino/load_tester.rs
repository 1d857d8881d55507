use casino::house::{
    BlackjackDeal, House, RouletteRequest, SlotsBet, SportsBetRequest,
};
use casino::games::GameOutcome;
use casino::games::roulette::{BetKind, RouletteBet};
use casino::store::{InMemoryStore, LedgerStore};
use casino::types::{Currency, MatchResult, NewUser, UserId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const STARTING_BALANCE: f64 = 1_000.0;

/// Load testing tool for settlement throughput and ledger consistency
fn main() {
    println!("=== Casino Load Testing ===\n");

    test_sustained_slots();
    test_mixed_workload();
    test_concurrent_settlement();
    test_sports_sweep();
}

fn setup(users: usize) -> (Arc<House>, Vec<UserId>) {
    let store = Arc::new(InMemoryStore::new());
    let ids = (0..users)
        .map(|i| {
            let user = store
                .insert_user(NewUser {
                    username: format!("load{i}"),
                    email: format!("load{i}@example.com"),
                    password_hash: String::new(),
                })
                .unwrap();
            store
                .set_balance(user.id, Currency::Usdt, STARTING_BALANCE)
                .unwrap();
            user.id
        })
        .collect();
    (Arc::new(House::with_seed(store, 99)), ids)
}

/// Balance must equal the seed plus every logged delta
fn check_ledger(house: &House, user_id: UserId) {
    let balance = house
        .store()
        .balance(user_id, Currency::Usdt)
        .map(|b| b.amount)
        .unwrap_or(0.0);
    let logged: f64 = house
        .store()
        .transactions(user_id)
        .iter()
        .filter(|tx| tx.currency == Currency::Usdt)
        .map(|tx| tx.amount)
        .sum();
    let drift = (balance - (STARTING_BALANCE + logged)).abs();
    println!("   User {user_id}: balance {balance:.4}, drift {drift:.2e}");
    assert!(balance >= 0.0, "negative balance for user {user_id}");
    assert!(drift < 1e-6, "ledger drift for user {user_id}");
}

fn test_sustained_slots() {
    println!("🎰 Testing sustained slots...");

    let (house, users) = setup(1);
    let duration = Duration::from_secs(5);
    let start = Instant::now();
    let mut operations = 0u64;
    let mut rejected = 0u64;

    while start.elapsed() < duration {
        let bet = SlotsBet {
            stake: 1.0,
            currency: Currency::Usdt,
        };
        if house.play_slots(users[0], bet, None).is_err() {
            rejected += 1;
        }
        operations += 1;
    }

    let elapsed = start.elapsed();
    println!("   Operations: {}", operations);
    println!("   Rejected: {}", rejected);
    println!("   Duration: {:.2}s", elapsed.as_secs_f64());
    println!(
        "   Throughput: {:.0} ops/sec",
        operations as f64 / elapsed.as_secs_f64()
    );
    check_ledger(&house, users[0]);
    println!();
}

fn test_mixed_workload() {
    println!("🔄 Testing mixed workload...");

    let (house, users) = setup(1);
    let user = users[0];
    let duration = Duration::from_secs(5);
    let start = Instant::now();
    let mut operations = 0u64;
    let mut rounds = 0u64;

    while start.elapsed() < duration {
        match operations % 4 {
            0 => {
                let bet = SlotsBet {
                    stake: 0.5,
                    currency: Currency::Usdt,
                };
                let _ = house.play_slots(user, bet, None);
            }
            1 => {
                let request = RouletteRequest {
                    currency: Currency::Usdt,
                    bets: vec![
                        RouletteBet {
                            kind: BetKind::Red,
                            stake: 0.5,
                        },
                        RouletteBet {
                            kind: BetKind::Straight((operations % 37) as u8),
                            stake: 0.1,
                        },
                    ],
                };
                let _ = house.play_roulette(user, request, None);
            }
            2 => {
                let deal = BlackjackDeal {
                    stake: 1.0,
                    currency: Currency::Usdt,
                };
                if let Ok(receipt) = house.blackjack_deal(user, deal, None) {
                    if let GameOutcome::Blackjack(view) = receipt.outcome {
                        if view.can_double && operations % 3 == 0 {
                            let _ = house.blackjack_double(user, view.round_id);
                        } else if view.result.is_none() {
                            let _ = house.blackjack_stand(user, view.round_id);
                        }
                    }
                    rounds += 1;
                }
            }
            _ => {
                let bet = SportsBetRequest {
                    match_id: "esports-1".into(),
                    selection_id: "away-esports-1".into(),
                    odds: 3.60,
                    stake: 0.25,
                    currency: Currency::Usdt,
                };
                let _ = house.place_sports_bet(user, bet, None);
            }
        }
        operations += 1;
    }

    let elapsed = start.elapsed();
    println!("   Operations: {}", operations);
    println!("   Blackjack rounds: {}", rounds);
    println!("   Duration: {:.2}s", elapsed.as_secs_f64());
    println!(
        "   Throughput: {:.0} ops/sec",
        operations as f64 / elapsed.as_secs_f64()
    );
    check_ledger(&house, user);
    println!();
}

fn test_concurrent_settlement() {
    println!("⚡ Testing concurrent settlement on shared balances...");

    let (house, users) = setup(4);
    let operations = Arc::new(AtomicU64::new(0));
    let duration = Duration::from_secs(5);
    let num_threads = 8;
    let mut handles = vec![];

    for thread_id in 0..num_threads {
        let house = Arc::clone(&house);
        let ops = Arc::clone(&operations);
        let user = users[thread_id % users.len()];

        handles.push(thread::spawn(move || {
            let start = Instant::now();
            let mut local_ops = 0;
            while start.elapsed() < duration {
                let bet = SlotsBet {
                    stake: 2.0,
                    currency: Currency::Usdt,
                };
                let _ = house.play_slots(user, bet, None);
                local_ops += 1;
            }
            ops.fetch_add(local_ops, Ordering::Relaxed);
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let total_ops = operations.load(Ordering::Relaxed);
    println!("   Threads: {}", num_threads);
    println!("   Total operations: {}", total_ops);
    println!(
        "   Throughput: {:.0} ops/sec",
        total_ops as f64 / duration.as_secs_f64()
    );
    for user in users {
        check_ledger(&house, user);
    }
    println!();
}

fn test_sports_sweep() {
    println!("🏟️ Testing sports settlement sweep...");

    let (house, users) = setup(50);
    let start = Instant::now();
    let mut placed = 0;

    for (i, user) in users.iter().enumerate() {
        for j in 0..100 {
            let (selection, odds) = match (i + j) % 3 {
                0 => ("home-soccer-2", 2.10),
                1 => ("draw-soccer-2", 3.25),
                _ => ("away-soccer-2", 3.60),
            };
            let bet = SportsBetRequest {
                match_id: "soccer-2".into(),
                selection_id: selection.into(),
                odds,
                stake: 1.0,
                currency: Currency::Usdt,
            };
            if house.place_sports_bet(*user, bet, None).is_ok() {
                placed += 1;
            }
        }
    }
    let placing = start.elapsed();

    let start = Instant::now();
    let report = house.settle_match("soccer-2", MatchResult::Draw).unwrap();
    let sweeping = start.elapsed();
    let replay = house.settle_match("soccer-2", MatchResult::Draw).unwrap();

    println!("   Bets placed: {} in {:.2}s", placed, placing.as_secs_f64());
    println!(
        "   Settled: {} in {:.2}ms",
        report.settled.len(),
        sweeping.as_secs_f64() * 1000.0
    );
    println!("   Settled on replay: {}", replay.settled.len());
    assert_eq!(report.settled.len(), placed);
    assert!(replay.settled.is_empty());
    for user in users.iter().take(3) {
        check_ledger(&house, *user);
    }
    println!();
}
