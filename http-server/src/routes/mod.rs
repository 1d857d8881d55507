pub mod games;
pub mod sports;
pub mod transactions;
pub mod users;
pub mod wallet;
