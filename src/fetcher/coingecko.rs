//! Token metadata and price resolution: repository (DB) hit first, HTTP
//! fallback second, with opportunistic price-cache seeding from a
//! token-lookup response that happens to carry a current price.

use crate::config::Config;
use crate::fetcher::rate_limited::RateLimitedFetcher;
use crate::repository::Repository;
use crate::types::{Token, TokenPrice};
use anyhow::{anyhow, Result};
use moka::future::Cache;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const PRICE_BASE: &str = "usd";
const PRICE_PRECISION: &str = "10";

#[derive(Debug, Deserialize)]
struct DetailPlatform {
    #[serde(rename = "decimal_place")]
    decimal_place: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct MarketData {
    #[serde(rename = "current_price")]
    current_price: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct TokenInfoResponse {
    symbol: String,
    name: String,
    #[serde(rename = "detail_platforms")]
    detail_platforms: HashMap<String, DetailPlatform>,
    #[serde(rename = "market_data")]
    market_data: Option<MarketData>,
}

type TokenPriceResponse = HashMap<String, HashMap<String, f64>>;

/// Resolves ERC-20 token metadata and USD prices, backed by a
/// CoinGecko-style HTTP API and a local repository/cache.
pub struct TokenResolver<R: Repository> {
    repository: Arc<R>,
    base_url: String,
    token_fetcher: RateLimitedFetcher<TokenInfoResponse>,
    price_fetcher: RateLimitedFetcher<TokenPriceResponse>,
    price_cache: Cache<String, TokenPrice>,
}

impl<R: Repository> TokenResolver<R> {
    pub fn new(config: &Config, repository: Arc<R>) -> Self {
        Self {
            repository,
            base_url: config.coingecko_base_url.clone(),
            token_fetcher: RateLimitedFetcher::new(config.api_timeout, config.api_rate_limit),
            price_fetcher: RateLimitedFetcher::new(config.api_timeout, config.api_rate_limit),
            price_cache: Cache::builder()
                .time_to_live(config.price_cache_ttl)
                .max_capacity(50_000)
                .build(),
        }
    }

    /// Resolves a token's metadata: repository hit, else HTTP fetch +
    /// opportunistic price-cache seed + repository insert.
    pub async fn get_token(&self, address: &str, cancel: &CancellationToken) -> Result<Token> {
        let address = address.to_lowercase();
        if let Some(token) = self.repository.get_token(&address).await? {
            return Ok(token);
        }

        let url = format!("{}/coins/ethereum/contract/{}", self.base_url, address);
        let info = self
            .token_fetcher
            .fetch(&url, &[], cancel)
            .await
            .map_err(|e| anyhow!("fetching token {address}: {e}"))?;

        if info.symbol.is_empty() {
            return Err(anyhow!("token not found: {address}"));
        }
        let decimals = info
            .detail_platforms
            .get("ethereum")
            .and_then(|p| p.decimal_place)
            .unwrap_or(0);
        if decimals == 0 {
            return Err(anyhow!("token not found: {address}"));
        }

        if let Some(market) = &info.market_data {
            if let Some(&price) = market.current_price.get(PRICE_BASE) {
                self.price_cache.insert(address.clone(), TokenPrice::usd(price)).await;
            }
        }

        let token = Token {
            address: address.clone(),
            symbol: info.symbol.to_uppercase(),
            name: info.name,
            decimals,
            total_supply: None,
        };
        self.repository.add_token(token.clone()).await?;
        Ok(token)
    }

    /// Resolves a token's current USD price: cache hit, else HTTP fetch.
    /// An empty address short-circuits to zero without a network call.
    pub async fn get_price(&self, address: &str, cancel: &CancellationToken) -> Result<TokenPrice> {
        if address.is_empty() {
            return Ok(TokenPrice::ZERO);
        }
        let address = address.to_lowercase();
        if let Some(price) = self.price_cache.get(&address).await {
            return Ok(price);
        }

        let url = format!("{}/simple/token_price/ethereum", self.base_url);
        let query = [
            ("contract_addresses", address.as_str()),
            ("vs_currencies", PRICE_BASE),
            ("precision", PRICE_PRECISION),
        ];
        let res: TokenPriceResponse = self
            .price_fetcher
            .fetch(&url, &query, cancel)
            .await
            .map_err(|e| anyhow!("fetching price for {address}: {e}"))?;

        let value = res
            .get(&address)
            .and_then(|m| m.get(PRICE_BASE))
            .copied()
            .unwrap_or(0.0);
        let price = TokenPrice::usd(value);
        self.price_cache.insert(address.clone(), price).await;
        Ok(price)
    }
}
