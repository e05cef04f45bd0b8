//! Per-transaction log cache: the event correlator's core data structure.
//!
//! Every observed log is cached under its transaction hash so that when a
//! primary event (Mint/Collect/Swap) arrives, the operation builder can
//! pull in already-seen sibling logs (Transfer/Burn) from the same
//! transaction. Entries expire after a TTL so a transaction that never
//! completes correlation doesn't leak memory forever.

use crate::types::EventLog;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// TTL-bounded multi-map from transaction hash to every log seen for it.
///
/// Built on `moka::future::Cache`, which runs its own eviction
/// housekeeping in the background — there's no separate sweep task to
/// drive on a timer the way a simpler expiring map would need.
/// `Config::log_cache_sweep` is kept only because it is an externally
/// documented tunable; moka has no equivalent knob.
#[derive(Clone)]
pub struct LogCache {
    inner: Cache<String, Arc<Mutex<Vec<EventLog>>>>,
}

impl LogCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(100_000)
                .build(),
        }
    }

    /// Caches a log under its transaction hash. Call this for every log
    /// observed, primary or sibling — a Mint still gets cached so a later
    /// Burn/Collect in the same tx can see it if ever needed.
    ///
    /// Re-inserts the bucket after appending so the whole `tx_hash` entry's
    /// TTL clock restarts from this log's arrival — `moka`'s
    /// `time_to_live` is measured from an entry's last `insert`, not from
    /// last access, so a plain `get_with` on a cache hit would otherwise
    /// leave a long-running transaction's earliest logs to expire on the
    /// original schedule.
    pub async fn insert(&self, log: EventLog) {
        let key = log.transaction_hash.clone();
        let bucket = self
            .inner
            .get_with(key.clone(), async { Arc::new(Mutex::new(Vec::new())) })
            .await;
        bucket.lock().await.push(log);
        self.inner.insert(key, bucket).await;
    }

    /// Returns every cached log for a transaction hash.
    pub async fn logs_for_tx(&self, tx_hash: &str) -> Vec<EventLog> {
        match self.inner.get(tx_hash).await {
            Some(bucket) => bucket.lock().await.clone(),
            None => Vec::new(),
        }
    }

    /// Finds cached logs for a transaction matching a predicate, e.g.
    /// "emitted by this pool address and topic0 is the Burn signature".
    pub async fn find<F>(&self, tx_hash: &str, mut pred: F) -> Vec<EventLog>
    where
        F: FnMut(&EventLog) -> bool,
    {
        self.logs_for_tx(tx_hash)
            .await
            .into_iter()
            .filter(|l| pred(l))
            .collect()
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(tx: &str, addr: &str, topic0: &str) -> EventLog {
        EventLog {
            address: addr.to_string(),
            topics: vec![topic0.to_string()],
            transaction_hash: tx.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn caches_and_retrieves_siblings_by_tx() {
        let cache = LogCache::new(Duration::from_secs(60));
        cache.insert(log("0xabc", "0xpool", "0xburn")).await;
        cache.insert(log("0xabc", "0xerc20", "0xtransfer")).await;
        cache.insert(log("0xother", "0xpool", "0xburn")).await;

        let logs = cache.logs_for_tx("0xabc").await;
        assert_eq!(logs.len(), 2);
    }

    #[tokio::test]
    async fn find_filters_by_predicate() {
        let cache = LogCache::new(Duration::from_secs(60));
        cache.insert(log("0xabc", "0xpool", "0xburn")).await;
        cache.insert(log("0xabc", "0xerc20", "0xtransfer")).await;

        let burns = cache
            .find("0xabc", |l| l.address == "0xpool" && l.topic0() == Some("0xburn"))
            .await;
        assert_eq!(burns.len(), 1);
    }

    #[tokio::test]
    async fn unknown_tx_returns_empty() {
        let cache = LogCache::new(Duration::from_secs(60));
        assert!(cache.logs_for_tx("0xnope").await.is_empty());
    }

    // Entries older than the TTL become unreachable.
    #[tokio::test]
    async fn expired_entries_are_evicted() {
        let cache = LogCache::new(Duration::from_millis(50));
        cache.insert(log("0xabc", "0xpool", "0xburn")).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        cache.inner.run_pending_tasks().await;
        assert!(cache.logs_for_tx("0xabc").await.is_empty());
    }

    // A later `put` resets the whole tx_hash entry's TTL clock, so a
    // transaction that keeps receiving siblings never expires early.
    #[tokio::test]
    async fn later_put_resets_ttl_for_whole_entry() {
        let cache = LogCache::new(Duration::from_millis(150));
        cache.insert(log("0xabc", "0xpool", "0xburn")).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        cache.insert(log("0xabc", "0xerc20", "0xtransfer")).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        cache.inner.run_pending_tasks().await;

        let logs = cache.logs_for_tx("0xabc").await;
        assert_eq!(logs.len(), 2, "entry should survive past its original TTL");
    }
}
