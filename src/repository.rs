//! Repository capability: token/pool metadata storage and optional
//! persistence of completed operations. Production backing is out of
//! scope (no Postgres here) — this crate ships an in-memory
//! implementation good enough for tests and standalone runs, behind the
//! same trait a real database-backed implementation would satisfy.

use crate::types::{Pool, Token};
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;

#[async_trait]
pub trait Repository: Send + Sync + 'static {
    async fn get_token(&self, address: &str) -> Result<Option<Token>>;
    async fn add_token(&self, token: Token) -> Result<()>;

    /// Looks up a pool's canonical `(token0, token1)` address pair.
    async fn get_pool_pair_addresses(&self, pool_address: &str) -> Result<Option<(String, String)>>;
    async fn save_pool(&self, pool: Pool) -> Result<()>;

    /// Persistence hooks for completed operations. Default no-op — a real
    /// deployment may override these to write through to a store.
    async fn save_addition(&self, _tx_hash: &str, _summary: &str) -> Result<()> {
        Ok(())
    }
    async fn save_removal(&self, _tx_hash: &str, _summary: &str) -> Result<()> {
        Ok(())
    }
    async fn save_swap(&self, _tx_hash: &str, _summary: &str) -> Result<()> {
        Ok(())
    }
}

/// `DashMap`-backed repository: no real persistence, just enough shared,
/// concurrency-safe state to run the pipeline end to end.
#[derive(Default)]
pub struct InMemoryRepository {
    tokens: DashMap<String, Token>,
    pools: DashMap<String, Pool>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_token(&self, address: &str) -> Result<Option<Token>> {
        Ok(self.tokens.get(&address.to_lowercase()).map(|t| t.clone()))
    }

    async fn add_token(&self, token: Token) -> Result<()> {
        self.tokens.insert(token.address.to_lowercase(), token);
        Ok(())
    }

    async fn get_pool_pair_addresses(&self, pool_address: &str) -> Result<Option<(String, String)>> {
        Ok(self
            .pools
            .get(&pool_address.to_lowercase())
            .map(|p| (p.token0_address.clone(), p.token1_address.clone())))
    }

    async fn save_pool(&self, pool: Pool) -> Result<()> {
        self.pools.insert(pool.address.to_lowercase(), pool);
        Ok(())
    }
}
