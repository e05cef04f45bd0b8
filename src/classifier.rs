//! Event classifier: maps a raw log's `topic0` to the event kind it
//! represents, and to whether that kind triggers an operation build.

use crate::codec::event_signature;
use crate::types::EventLog;
use once_cell::sync::Lazy;

const MINT_HEADER: &str = "Mint(address,address,int24,int24,uint128,uint256,uint256)";
const TRANSFER_HEADER: &str = "Transfer(address,address,uint256)";
const BURN_HEADER: &str = "Burn(address,int24,int24,uint128,uint256,uint256)";
const COLLECT_HEADER: &str = "Collect(address,address,int24,int24,uint128,uint128)";
const SWAP_HEADER: &str = "Swap(address,address,int256,int256,uint160,uint128,int24)";

pub static MINT_SIG: Lazy<String> = Lazy::new(|| event_signature(MINT_HEADER));
pub static TRANSFER_SIG: Lazy<String> = Lazy::new(|| event_signature(TRANSFER_HEADER));
pub static BURN_SIG: Lazy<String> = Lazy::new(|| event_signature(BURN_HEADER));
pub static COLLECT_SIG: Lazy<String> = Lazy::new(|| event_signature(COLLECT_HEADER));
pub static SWAP_SIG: Lazy<String> = Lazy::new(|| event_signature(SWAP_HEADER));

/// The decoded kind of an event log, derived from its `topic0` selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Mint,
    Transfer,
    Burn,
    Collect,
    Swap,
    Other,
}

impl EventKind {
    /// Whether this kind drives an operation build (`false` for sibling-only
    /// kinds — Transfer, Burn — and for anything unrecognized).
    pub fn triggers_build(self) -> bool {
        matches!(self, EventKind::Mint | EventKind::Collect | EventKind::Swap)
    }

    /// The subject fragment this kind's operation publishes under.
    pub fn publish_fragment(self) -> Option<&'static str> {
        match self {
            EventKind::Mint => Some("add"),
            EventKind::Collect => Some("remove"),
            EventKind::Swap => Some("swap"),
            EventKind::Transfer | EventKind::Burn | EventKind::Other => None,
        }
    }
}

/// The classifier's output: the decoded kind plus whether it should
/// trigger an operation build.
#[derive(Debug, Clone, Copy)]
pub struct EventInstruction {
    pub kind: EventKind,
    pub has_builder: bool,
}

/// Classifies a log by its `topic0`. Returns `None` for malformed input
/// (no non-empty topics) — the caller logs and drops the message.
pub fn classify(log: &EventLog) -> Option<EventInstruction> {
    if !log.has_topics() {
        return None;
    }
    let topic0 = log.topic0()?;

    let kind = if topic0.eq_ignore_ascii_case(&MINT_SIG) {
        EventKind::Mint
    } else if topic0.eq_ignore_ascii_case(&TRANSFER_SIG) {
        EventKind::Transfer
    } else if topic0.eq_ignore_ascii_case(&BURN_SIG) {
        EventKind::Burn
    } else if topic0.eq_ignore_ascii_case(&COLLECT_SIG) {
        EventKind::Collect
    } else if topic0.eq_ignore_ascii_case(&SWAP_SIG) {
        EventKind::Swap
    } else {
        EventKind::Other
    };

    Some(EventInstruction {
        has_builder: kind.triggers_build(),
        kind,
    })
}
