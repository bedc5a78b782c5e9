pub mod client;
pub mod rate_limit;

pub use client::{CoinGeckoClient, DEFAULT_BASE_URL};
pub use rate_limit::RateLimitSnapshot;
