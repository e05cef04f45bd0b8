//! Pub/sub transport boundary: deliberately left as a trait rather than
//! a concrete implementation — the core only needs a stream of inbound
//! `Message`s and a way to publish outbound ones. `publisher::Publisher`
//! covers the outbound side; `Subscriber` here covers the inbound side.

use crate::types::Message;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;

/// Pulls inbound `(subject, payload, receive_ts)` messages off the
/// transport. A real deployment implements this over NATS/JetStream; this
/// crate ships a channel-backed implementation for tests and the demo
/// binary.
#[async_trait]
pub trait Subscriber: Send {
    async fn recv(&mut self) -> Option<Message>;
}

/// Channel-backed subscriber paired with a cloneable handle used to feed
/// it messages — the demo binary's stand-in for a NATS subscription.
pub struct ChannelSubscriber {
    receiver: mpsc::Receiver<Message>,
}

#[async_trait]
impl Subscriber for ChannelSubscriber {
    async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }
}

/// Feeds a `ChannelSubscriber`, stamping each message with the receive
/// timestamp the way a real transport's delivery callback would.
#[derive(Clone)]
pub struct ChannelFeed {
    sender: mpsc::Sender<Message>,
}

impl ChannelFeed {
    pub fn pair(capacity: usize) -> (ChannelFeed, ChannelSubscriber) {
        let (sender, receiver) = mpsc::channel(capacity);
        (ChannelFeed { sender }, ChannelSubscriber { receiver })
    }

    pub async fn send(&self, subject: impl Into<String>, data: Vec<u8>) -> Result<(), mpsc::error::SendError<Message>> {
        self.sender
            .send(Message {
                subject: subject.into(),
                data,
                received_at: Utc::now(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn feed_stamps_receive_time_and_delivers_in_order() {
        let (feed, mut sub) = ChannelFeed::pair(10);
        feed.send("ethereum.log-event", b"one".to_vec()).await.unwrap();
        feed.send("ethereum.log-event", b"two".to_vec()).await.unwrap();

        let first = sub.recv().await.unwrap();
        let second = sub.recv().await.unwrap();
        assert_eq!(first.data, b"one");
        assert_eq!(second.data, b"two");
    }
}
