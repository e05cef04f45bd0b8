//! Publisher adapter: hands a serialized operation message to the
//! transport on the `<prefix>.<op>.<token0-symbol>.<token1-symbol>`
//! subject.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Builds the lowercased publish subject for an operation's outbound
/// message. `op` is one of `add`/`remove`/`swap`; `symbol0`/`symbol1`
/// come from the *published* (possibly reordered) token pair.
pub fn subject_for(prefix: &str, op: &str, symbol0: &str, symbol1: &str) -> String {
    format!("{prefix}.{op}.{symbol0}.{symbol1}").to_lowercase()
}

/// Collaborator the operation builders publish through, as a trait
/// object so a real NATS/JetStream-backed implementation can sit behind
/// the same call site used by tests and the in-memory demo.
#[async_trait]
pub trait Publisher: Send + Sync + 'static {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<()>;
}

/// A published message, captured for the channel-backed publisher below
/// and for any consumer (e.g. the demo binary) that wants to observe
/// what would have gone out over the wire.
#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub subject: String,
    pub payload: Vec<u8>,
}

/// In-process publisher: pushes every publish onto an unbounded channel.
/// Good enough for tests and the standalone demo binary — a production
/// deployment swaps this for a NATS/JetStream publisher behind the same
/// trait. A failed send is logged and tolerated — one failed publish
/// should not poison the worker that produced it.
pub struct ChannelPublisher {
    sender: mpsc::UnboundedSender<PublishedMessage>,
}

impl ChannelPublisher {
    /// `capacity` is unused by the unbounded channel but kept in the
    /// signature for parity with the dispatcher's bounded-ring sizing —
    /// callers that want a bounded publisher can swap the channel type.
    pub fn new(_capacity: usize) -> (Self, mpsc::UnboundedReceiver<PublishedMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl Publisher for ChannelPublisher {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<()> {
        info!(subject, "publishing operation");
        if self
            .sender
            .send(PublishedMessage {
                subject: subject.to_string(),
                payload,
            })
            .is_err()
        {
            warn!(subject, "publish receiver dropped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_lowercases_and_joins_fragments() {
        assert_eq!(subject_for("Ethereum.Analytics", "add", "WETH", "USDC"), "ethereum.analytics.add.weth.usdc");
    }

    #[tokio::test]
    async fn channel_publisher_delivers_to_receiver() {
        let (publisher, mut rx) = ChannelPublisher::new(10);
        publisher.publish("a.b.c", b"payload".to_vec()).await.unwrap();
        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.subject, "a.b.c");
        assert_eq!(msg.payload, b"payload");
    }
}
