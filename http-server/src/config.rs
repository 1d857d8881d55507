use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Casino and sportsbook HTTP API", long_about = None)]
pub struct Config {
    /// Interface to bind
    #[arg(long, env = "CASINO_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(short, long, env = "CASINO_PORT", default_value_t = 6957)]
    pub port: u16,

    /// Token required in `X-Admin-Token` to post match results (endpoint disabled when unset)
    #[arg(long, env = "CASINO_ADMIN_TOKEN")]
    pub admin_token: Option<String>,

    /// Seed for a deterministic house RNG. Never set in production.
    #[arg(long, env = "CASINO_RNG_SEED")]
    pub rng_seed: Option<u64>,

    /// Lifetime of a login session in seconds
    #[arg(long, env = "CASINO_SESSION_TTL_SECS", default_value_t = 7 * 24 * 60 * 60)]
    pub session_ttl_secs: u64,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, env = "CASINO_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}
