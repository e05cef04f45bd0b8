//! Operation builders: Addition (Mint), Removal (Collect), Swap (Swap).
//! Each joins sibling logs cached from the same transaction, resolves
//! token metadata and prices, normalizes the resulting Position, and
//! knows how to publish or save itself.

pub mod addition;
pub mod removal;
pub mod swap;

pub use addition::Addition;
pub use removal::Removal;
pub use swap::Swap;

use crate::cache::LogCache;
use crate::config::Config;
use crate::fetcher::TokenResolver;
use crate::publisher::Publisher;
use crate::repository::Repository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The canonical Uniswap V3 NFT position manager owner address. A Mint
/// only represents a user-facing position (vs. a pool-internal mint) when
/// it was triggered through this contract.
pub const UNISWAP_POSITIONS_OWNER: &str = "0xc36442b4a4522e871399cd717abdd847ab11fe88";

/// Per-pool counters of how many times an operation was skipped because
/// the pool's canonical token order wasn't yet known. Aggregated rather
/// than just logged so a caller can inspect it (e.g. for a
/// `/metrics`-less health check).
#[derive(Default)]
pub struct UnknownPoolStats {
    counts: DashMap<String, AtomicU64>,
}

impl UnknownPoolStats {
    pub fn record_miss(&self, pool_address: &str) {
        self.counts
            .entry(pool_address.to_lowercase())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn miss_count(&self, pool_address: &str) -> u64 {
        self.counts
            .get(&pool_address.to_lowercase())
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }
}

/// Shared collaborators every operation builder needs, as an explicit,
/// cloneable context value passed down the call chain rather than an
/// embedded back-reference.
pub struct OperationContext<R: Repository> {
    pub repository: Arc<R>,
    pub cache: Arc<LogCache>,
    pub resolver: Arc<TokenResolver<R>>,
    pub publisher: Arc<dyn Publisher>,
    pub config: Arc<Config>,
    pub stats: Arc<UnknownPoolStats>,
    pub cancel: CancellationToken,
}

impl<R: Repository> Clone for OperationContext<R> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            cache: self.cache.clone(),
            resolver: self.resolver.clone(),
            publisher: self.publisher.clone(),
            config: self.config.clone(),
            stats: self.stats.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

/// Common capability set shared by the Addition/Removal/Swap builders —
/// each owns its own Position-building logic but the dispatcher drives
/// all three through this one trait.
#[async_trait]
pub trait Operation<R: Repository>: Send {
    /// Joins sibling logs and computes the normalized Position (and
    /// variant-specific extras) from the primary triggering log.
    async fn process(&mut self, ctx: &OperationContext<R>, primary: &crate::types::EventLog) -> anyhow::Result<()>;

    /// Whether the assembled operation passes the publication predicate.
    fn can_publish(&self, config: &Config) -> bool;

    /// Serializes and hands the operation's message to the transport.
    async fn publish(&self, ctx: &OperationContext<R>, ts: DateTime<Utc>) -> anyhow::Result<()>;

    /// Optional persistence hook (no-op by default via the Repository's
    /// default methods).
    async fn save(&self, ctx: &OperationContext<R>, ts: DateTime<Utc>) -> anyhow::Result<()>;

    /// Human-readable one-line summary, the `Display`/`String()` analogue.
    fn summary(&self) -> String;
}
