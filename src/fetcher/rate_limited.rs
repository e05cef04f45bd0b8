//! Generic rate-limited HTTP GET fetcher: sliding-window calls-per-minute
//! estimator plus reactive `Retry-After` backoff on 425/429.

use crate::error::FetchError;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::warn;

const WINDOW: Duration = Duration::from_secs(60);
const BURST_GAP: Duration = Duration::from_secs(3);
const BACKOFF_SCHEDULE: [Duration; 3] = [
    Duration::from_secs(0),
    Duration::from_secs(10),
    Duration::from_secs(30),
];
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// A generic JSON-GET client parameterized by response type `T`, rate
/// limited to `rate_limit` calls per minute with burst absorption, and
/// cooperating with a 425/429 `Retry-After` response via reactive backoff.
pub struct RateLimitedFetcher<T> {
    client: Client,
    timeout: Duration,
    rate_limit: usize,
    timestamps: Mutex<Vec<Instant>>,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> RateLimitedFetcher<T> {
    pub fn new(timeout: Duration, rate_limit: u32) -> Self {
        Self {
            client: Client::new(),
            timeout,
            rate_limit: rate_limit as usize,
            timestamps: Mutex::new(Vec::new()),
            _marker: PhantomData,
        }
    }

    /// Performs a rate-limited GET against `url` with the given query
    /// params, decoding the JSON body as `T`.
    pub async fn fetch(
        &self,
        url: &str,
        query: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<T, FetchError> {
        let wait = {
            let timestamps = self.timestamps.lock().await;
            next_call_due(&timestamps, Instant::now(), self.rate_limit)
        };
        if !wait.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            }
        }

        let fut = self.do_with_backoff(url, query, cancel);
        let response = match tokio::time::timeout(self.timeout, fut).await {
            Ok(r) => r?,
            Err(_) => return Err(FetchError::Http("request timed out".to_string())),
        };

        if response.status() != StatusCode::OK {
            return Err(FetchError::Http(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }

    async fn do_with_backoff(
        &self,
        url: &str,
        query: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, FetchError> {
        for (attempt, backoff) in BACKOFF_SCHEDULE.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }

            let result = self.client.get(url).query(query).send().await;
            self.record_call().await;

            match result {
                Ok(resp) if resp.status() == StatusCode::TOO_MANY_REQUESTS
                    || resp.status().as_u16() == 425 =>
                {
                    let retry_after = parse_retry_after(
                        resp.headers().get("Retry-After").and_then(|v| v.to_str().ok()),
                    );
                    if attempt + 1 == BACKOFF_SCHEDULE.len() {
                        break;
                    }
                    let sleep_for = retry_after + *backoff;
                    warn!(attempt, ?sleep_for, "rate limited, backing off");
                    tokio::select! {
                        _ = tokio::time::sleep(sleep_for) => {}
                        _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    }
                }
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    if attempt + 1 == BACKOFF_SCHEDULE.len() {
                        return Err(FetchError::Http(e.to_string()));
                    }
                }
            }
        }

        Err(FetchError::RateLimitExhausted)
    }

    async fn record_call(&self) {
        let mut timestamps = self.timestamps.lock().await;
        let now = Instant::now();
        timestamps.push(now);
        prune_calls_locked(&mut timestamps, now);
    }
}

/// Drops timestamps older than the 60s window, in place.
fn prune_calls_locked(timestamps: &mut Vec<Instant>, now: Instant) {
    timestamps.retain(|ts| now.duration_since(*ts) <= WINDOW);
}

/// Sliding-window wait estimator. Absorbs small bursts
/// with a ~3s wait when dropping the oldest entries would bring the
/// count back under the limit; otherwise waits out the oldest relevant
/// timestamp's full remaining lifetime in the window.
fn next_call_due(timestamps: &[Instant], now: Instant, rate_limit: usize) -> Duration {
    let n = timestamps.len();
    if n < rate_limit {
        return Duration::ZERO;
    }

    let mut next_ts = timestamps[0];
    let mut tmp_ts = timestamps[0];
    for (i, &nts) in timestamps.iter().enumerate().skip(1) {
        if nts.duration_since(next_ts) > BURST_GAP && n.saturating_sub(i + 1) < rate_limit {
            next_ts = tmp_ts;
            break;
        }
        tmp_ts = nts;
    }

    let elapsed = now.duration_since(next_ts);
    WINDOW.saturating_sub(elapsed)
}

fn parse_retry_after(header: Option<&str>) -> Duration {
    header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ago(secs: u64) -> Instant {
        Instant::now()
            .checked_sub(Duration::from_secs(secs))
            .unwrap()
    }

    #[test]
    fn prune_drops_only_stale_entries() {
        let now = Instant::now();
        let mut ts = vec![ago(61), ago(30), ago(5)];
        prune_calls_locked(&mut ts, now);
        assert_eq!(ts.len(), 2);
    }

    #[test]
    fn prune_empty_stays_empty() {
        let now = Instant::now();
        let mut ts: Vec<Instant> = vec![];
        prune_calls_locked(&mut ts, now);
        assert!(ts.is_empty());
    }

    #[test]
    fn prune_all_stale_drops_everything() {
        let now = Instant::now();
        let mut ts = vec![ago(70), ago(90), ago(3600)];
        prune_calls_locked(&mut ts, now);
        assert!(ts.is_empty());
    }

    #[test]
    fn prune_all_fresh_keeps_everything() {
        let now = Instant::now();
        let mut ts = vec![ago(1), ago(2), ago(3)];
        prune_calls_locked(&mut ts, now);
        assert_eq!(ts.len(), 3);
    }

    #[test]
    fn next_call_due_zero_when_no_calls() {
        let now = Instant::now();
        assert_eq!(next_call_due(&[], now, 3), Duration::ZERO);
    }

    #[test]
    fn next_call_due_zero_when_under_limit() {
        let now = Instant::now();
        let ts = vec![ago(5), ago(2)];
        assert_eq!(next_call_due(&ts, now, 3), Duration::ZERO);
    }

    // Exactly N calls within the window should force a nonzero wait.
    #[test]
    fn next_call_due_burst_absorption() {
        let now = Instant::now();
        let ts = vec![ago(4), ago(2), ago(1)];
        let wait = next_call_due(&ts, now, 3);
        assert_eq!(wait, Duration::from_secs(56));
    }

    #[test]
    fn next_call_due_recent_cluster_waits_full_remainder() {
        let now = Instant::now();
        let ts = vec![ago(30), ago(3), ago(2), ago(1)];
        let wait = next_call_due(&ts, now, 2);
        assert_eq!(wait, Duration::from_secs(57));
    }

    #[test]
    fn retry_after_parses_seconds() {
        assert_eq!(parse_retry_after(Some("12")), Duration::from_secs(12));
    }

    #[test]
    fn retry_after_defaults_on_parse_failure() {
        assert_eq!(parse_retry_after(Some("not-a-number")), DEFAULT_RETRY_AFTER);
        assert_eq!(parse_retry_after(None), DEFAULT_RETRY_AFTER);
    }
}
