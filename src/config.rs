//! Configuration management
//! Load settings from environment (.env supported via `dotenv`).

use anyhow::{Context, Result};
use std::time::Duration;

/// Runtime tunables. Every field has a sensible default so
/// `Config::default()` is enough to run against an in-memory
/// repository/transport in tests.
#[derive(Debug, Clone)]
pub struct Config {
    /// Subscribe-prefix for outbound subjects, e.g. `ethereum.analytics`.
    pub subscribe_prefix: String,

    /// Log-cache TTL / sweep interval (default 2min / 3min).
    pub log_cache_ttl: Duration,
    pub log_cache_sweep: Duration,

    /// Price-cache TTL / sweep interval (default 2min / 3min).
    pub price_cache_ttl: Duration,
    pub price_cache_sweep: Duration,

    /// Per-call HTTP timeout for the CoinGecko fetcher (default 2min).
    pub api_timeout: Duration,
    /// Calls-per-minute budget for the rate limiter (default 12).
    pub api_rate_limit: u32,
    /// Base URL for the CoinGecko-style API.
    pub coingecko_base_url: String,

    /// Lowercased stablecoin addresses; the quote token when present.
    pub stable_coins: Vec<String>,
    /// Lowercased wrapped-native addresses; the quote token absent a stable.
    pub native_coins: Vec<String>,

    /// Capacity of each per-subject dispatcher channel (default 5000).
    pub buffer_size: usize,

    /// When true, logs flagged `removed` are dropped instead of processed.
    /// Off by default — a removed log is otherwise treated like any other.
    pub filter_removed_logs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            subscribe_prefix: "ethereum.analytics".to_string(),
            log_cache_ttl: Duration::from_secs(120),
            log_cache_sweep: Duration::from_secs(180),
            price_cache_ttl: Duration::from_secs(120),
            price_cache_sweep: Duration::from_secs(180),
            api_timeout: Duration::from_secs(120),
            api_rate_limit: 12,
            coingecko_base_url: "https://api.coingecko.com/api/v3".to_string(),
            stable_coins: vec![
                "0xdac17f958d2ee523a2206206994597c13d831ec7".to_string(), // USDT
                "0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_string(), // USDC
            ],
            native_coins: vec![
                "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2".to_string(), // WETH
            ],
            buffer_size: 5000,
            filter_removed_logs: false,
        }
    }
}

impl Config {
    /// Load from environment, falling back to defaults for anything unset.
    /// A missing `.env` file is not an error, just a no-op.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let defaults = Config::default();

        let cfg = Config {
            subscribe_prefix: env_or("ANALYTICS_SUBSCRIBE_PREFIX", defaults.subscribe_prefix),
            log_cache_ttl: env_secs_or("ANALYTICS_LOG_CACHE_TTL_SECS", defaults.log_cache_ttl)?,
            log_cache_sweep: env_secs_or("ANALYTICS_LOG_CACHE_SWEEP_SECS", defaults.log_cache_sweep)?,
            price_cache_ttl: env_secs_or("ANALYTICS_PRICE_CACHE_TTL_SECS", defaults.price_cache_ttl)?,
            price_cache_sweep: env_secs_or("ANALYTICS_PRICE_CACHE_SWEEP_SECS", defaults.price_cache_sweep)?,
            api_timeout: env_secs_or("ANALYTICS_API_TIMEOUT_SECS", defaults.api_timeout)?,
            api_rate_limit: env_parse_or("ANALYTICS_API_RATE_LIMIT", defaults.api_rate_limit)
                .context("ANALYTICS_API_RATE_LIMIT must be an integer")?,
            coingecko_base_url: env_or("ANALYTICS_COINGECKO_BASE_URL", defaults.coingecko_base_url),
            stable_coins: env_list_or("ANALYTICS_STABLE_COINS", defaults.stable_coins),
            native_coins: env_list_or("ANALYTICS_NATIVE_COINS", defaults.native_coins),
            buffer_size: env_parse_or("ANALYTICS_BUFFER_SIZE", defaults.buffer_size)
                .context("ANALYTICS_BUFFER_SIZE must be an integer")?,
            filter_removed_logs: env_parse_or("ANALYTICS_FILTER_REMOVED_LOGS", defaults.filter_removed_logs)
                .context("ANALYTICS_FILTER_REMOVED_LOGS must be true/false")?,
        };

        Ok(cfg)
    }

    pub fn is_stable(&self, address: &str) -> bool {
        self.stable_coins.iter().any(|a| a.eq_ignore_ascii_case(address))
    }

    pub fn is_native(&self, address: &str) -> bool {
        self.native_coins.iter().any(|a| a.eq_ignore_ascii_case(address))
    }
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(v) => Ok(v.parse()?),
        Err(_) => Ok(default),
    }
}

fn env_secs_or(key: &str, default: Duration) -> Result<Duration> {
    match std::env::var(key) {
        Ok(v) => Ok(Duration::from_secs(v.parse().context(format!("{key} must be an integer"))?)),
        Err(_) => Ok(default),
    }
}

fn env_list_or(key: &str, default: Vec<String>) -> Vec<String> {
    match std::env::var(key) {
        Ok(v) => v
            .split(',')
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_known_quote_coins() {
        let cfg = Config::default();
        assert!(cfg.is_stable("0xdAC17F958D2ee523a2206206994597C13D831ec7"));
        assert!(cfg.is_native("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"));
        assert!(!cfg.is_stable("0x0000000000000000000000000000000000dead"));
    }
}
