//! Core data model shared across the pipeline: raw logs, resolved tokens
//! and pools, and the working `Position` record operations build.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A resolved ERC-20 token. Identity is the (lowercased) address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub decimals: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_supply: Option<f64>,
}

impl Token {
    pub fn is_unset(&self) -> bool {
        self.address.is_empty()
    }
}

/// A liquidity pool: address plus the canonical on-chain token order.
/// This order is never rewritten by the builders — only the *published*
/// pair may be re-presented with a different quote convention.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub address: String,
    pub token0_address: String,
    pub token1_address: String,
}

/// A USD price, carrying the base currency tag it was quoted against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenPrice {
    pub value: f64,
    pub base: &'static str,
}

impl TokenPrice {
    pub const ZERO: TokenPrice = TokenPrice { value: 0.0, base: "usd" };

    pub fn usd(value: f64) -> Self {
        Self { value, base: "usd" }
    }
}

/// A raw on-chain event log, as received on the `<chain>.log-event` subject.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
    #[serde(rename = "blockNumber")]
    pub block_number: String,
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
    #[serde(rename = "transactionIndex")]
    pub transaction_index: String,
    #[serde(rename = "blockHash")]
    pub block_hash: String,
    #[serde(rename = "logIndex")]
    pub log_index: String,
    #[serde(default)]
    pub removed: bool,
}

impl EventLog {
    /// Guards against logs with no non-empty topics — the malformed-input
    /// case the classifier rejects before attempting to read `topics[0]`.
    pub fn has_topics(&self) -> bool {
        self.topics.iter().any(|t| !t.is_empty())
    }

    pub fn topic0(&self) -> Option<&str> {
        self.topics.first().map(|s| s.as_str())
    }
}

/// One leg of a Position: the token plus the amount moved and its USD price.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenTransaction {
    pub token: Token,
    pub amount: f64,
    pub price: f64,
}

impl TokenTransaction {
    pub fn for_token(token: Token, amount: f64) -> Self {
        Self { token, amount, price: 0.0 }
    }
}

/// The working record for one operation being assembled. Shared shape
/// across Addition, Removal and Swap; variant-specific extras (earned
/// fees, From/To) live on the operation structs themselves.
#[derive(Debug, Clone, Default)]
pub struct Position {
    pub address: String,
    pub tx_hash: String,
    pub lower_tick: i32,
    pub upper_tick: i32,
    pub token0: TokenTransaction,
    pub token1: TokenTransaction,
    pub lower_ratio: f64,
    pub upper_ratio: f64,
    pub current_ratio: f64,
    pub total_value: f64,
}

impl Position {
    pub fn tokens_set(&self) -> bool {
        !self.token0.token.is_unset() && !self.token1.token.is_unset()
    }

    pub fn either_amount_zero(&self) -> bool {
        self.token0.amount == 0.0 || self.token1.amount == 0.0
    }
}

/// Received transport message: `(subject, payload, receive_ts)`.
#[derive(Debug, Clone)]
pub struct Message {
    pub subject: String,
    pub data: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------
// Outbound wire messages
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TokenMessage {
    pub symbol: String,
    pub amount: f64,
    #[serde(rename = "priceUSD")]
    pub price_usd: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenEarnedMessage {
    pub symbol: String,
    pub amount: f64,
    #[serde(rename = "totalValueUSD")]
    pub total_value_usd: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdditionMessage {
    pub timestamp: DateTime<Utc>,
    pub address: String,
    #[serde(rename = "lowerTokenRatio")]
    pub lower_token_ratio: f64,
    #[serde(rename = "currentTokenRatio")]
    pub current_token_ratio: f64,
    #[serde(rename = "upperTokenRatio")]
    pub upper_token_ratio: f64,
    #[serde(rename = "totalValueUSD")]
    pub total_value_usd: f64,
    pub pair: [TokenMessage; 2],
    #[serde(rename = "txHash")]
    pub tx_hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemovalMessage {
    pub timestamp: DateTime<Utc>,
    pub address: String,
    #[serde(rename = "lowerTokenRatio")]
    pub lower_token_ratio: f64,
    #[serde(rename = "currentTokenRatio")]
    pub current_token_ratio: f64,
    #[serde(rename = "upperTokenRatio")]
    pub upper_token_ratio: f64,
    #[serde(rename = "totalValueUSD")]
    pub total_value_usd: f64,
    pub pair: [TokenMessage; 2],
    pub earned: [TokenEarnedMessage; 2],
    #[serde(rename = "totalEarnedUSD")]
    pub total_earned_usd: f64,
    #[serde(rename = "txHash")]
    pub tx_hash: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwapSideMessage {
    pub symbol: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SwapMessage {
    pub timestamp: DateTime<Utc>,
    pub address: String,
    #[serde(rename = "txHash")]
    pub tx_hash: String,
    pub from: SwapSideMessage,
    pub to: SwapSideMessage,
}
