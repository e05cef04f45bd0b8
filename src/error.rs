//! Error taxonomy. Most of the pipeline just threads `anyhow::Result`
//! through with `.context(...)` — these types exist only where a caller
//! needs to distinguish a *kind* of failure (rate-limit exhaustion,
//! cancellation) rather than just log-and-drop it.

use std::fmt;

/// Distinct, matchable failure kinds surfaced by the fetcher. Everything
/// else in the pipeline (malformed input, unknown pool/token, decode
/// errors) is handled inline with `anyhow::Result` + `tracing::warn!` —
/// those are per-message/per-operation and never need to be told apart
/// programmatically downstream.
#[derive(Debug)]
pub enum FetchError {
    /// Three retries against a 425/429 response exhausted the backoff
    /// schedule without success.
    RateLimitExhausted,
    /// The caller's cancellation signal fired mid-wait or mid-request.
    Cancelled,
    /// Non-2xx response outside the 425/429 retry path, or a transport-level
    /// failure (connect refused, timeout).
    Http(String),
    /// Response body didn't parse into the expected shape.
    Decode(String),
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::RateLimitExhausted => write!(f, "API rate limit exceeded"),
            FetchError::Cancelled => write!(f, "fetch cancelled"),
            FetchError::Http(msg) => write!(f, "http error: {msg}"),
            FetchError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl FetchError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, FetchError::RateLimitExhausted)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}
