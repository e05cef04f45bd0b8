//! Streaming decoder that turns raw on-chain event logs into normalized
//! liquidity-addition, liquidity-removal, and swap operations, republished
//! on a subject hierarchy keyed by operation type and token pair.
//!
//! The hard core is the event correlator: a per-transaction log cache
//! joined against rate-limited token/price resolution to assemble a
//! normalized `Position` whenever a primary event (Mint, Collect, Swap)
//! arrives. See `operations` for the three builders and `dispatcher` for
//! how inbound messages reach them.

pub mod abi;
pub mod cache;
pub mod classifier;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fetcher;
pub mod operations;
pub mod position;
pub mod publisher;
pub mod repository;
pub mod transport;
pub mod types;

pub use config::Config;
pub use dispatcher::Dispatcher;
pub use operations::{Addition, Operation, OperationContext, Removal, Swap};
pub use repository::Repository;
