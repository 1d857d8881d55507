pub mod auth;
pub mod error;
pub mod games;
pub mod house;
pub mod idempotency;
pub mod sportsbook;
pub mod store;
pub mod types;
pub mod wallet;

pub use error::{CasinoError, Result};
pub use house::House;
pub use store::{InMemoryStore, LedgerStore};
