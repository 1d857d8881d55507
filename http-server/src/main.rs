use axum::{
    Router,
    routing::{any, get, post},
};
use casino::{House, InMemoryStore, LedgerStore};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod middleware;
mod models;
mod routes;
mod websocket;

use config::Config;
use models::SessionStore;
use routes::games::{
    blackjack_deal, blackjack_double, blackjack_hit, blackjack_round, blackjack_stand,
    play_roulette, play_slots,
};
use routes::sports::{get_bets, get_matches, place_bet, record_result};
use routes::transactions::list_transactions;
use routes::users::{get_profile, login, logout, signup};
use routes::wallet::{
    connect_wallet, deposit, deposit_address, get_balances, get_challenge, withdraw,
};
use websocket::{NotificationManager, create_notification_manager, websocket_handler};

// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub house: Arc<House>,
    pub sessions: SessionStore,
    pub notification_manager: NotificationManager,
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(house: House, admin_token: Option<String>, session_ttl: Duration) -> Self {
        Self {
            house: Arc::new(house),
            sessions: SessionStore::with_ttl(session_ttl),
            notification_manager: create_notification_manager(),
            admin_token: admin_token.map(Arc::from),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(get_profile))
        .route("/api/wallet/challenge", get(get_challenge))
        .route("/api/wallet/connect", post(connect_wallet))
        .route("/api/wallet/balances", get(get_balances))
        .route("/api/wallet/address", post(deposit_address))
        .route("/api/wallet/deposit", post(deposit))
        .route("/api/wallet/withdraw", post(withdraw))
        .route("/api/transactions", get(list_transactions))
        .route("/api/games/slots", post(play_slots))
        .route("/api/games/roulette", post(play_roulette))
        .route("/api/games/blackjack", post(blackjack_deal))
        .route("/api/games/blackjack/{id}", get(blackjack_round))
        .route("/api/games/blackjack/{id}/hit", post(blackjack_hit))
        .route("/api/games/blackjack/{id}/stand", post(blackjack_stand))
        .route("/api/games/blackjack/{id}/double", post(blackjack_double))
        .route("/api/sports/matches", get(get_matches))
        .route("/api/sports/matches/{id}/result", post(record_result))
        .route("/api/sports/bet", post(place_bet))
        .route("/api/sports/bets", get(get_bets))
        .route("/notifications", any(websocket_handler))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    // initialize tracing; RUST_LOG wins over --log-level
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    let store: Arc<dyn LedgerStore> = Arc::new(InMemoryStore::new());
    tracing::info!("In-memory ledger initialized with {} matches", store.matches().len());

    let house = match config.rng_seed {
        Some(seed) => {
            tracing::warn!("House RNG seeded with {}; outcomes are predictable", seed);
            House::with_seed(store, seed)
        }
        None => House::new(store),
    };
    if config.admin_token.is_none() {
        tracing::warn!("No admin token configured; match results cannot be posted");
    }

    let state = AppState::new(house, config.admin_token.clone(), config.session_ttl());
    let app = build_router(state);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server running on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

// Root endpoint
async fn root() -> &'static str {
    "Casino API - POST /api/auth/login for a token, /api/games/* to play, /api/sports/* for the sportsbook, WebSocket /notifications for balance updates"
}
