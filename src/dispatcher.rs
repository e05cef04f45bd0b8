//! Dispatcher: one bounded-ring worker per subject, draining sequentially
//! and driving the classifier + operation builders. A `JoinSet` tracks
//! one worker task per subject; a full ring drops the incoming message
//! rather than blocking the dispatch loop.

use crate::classifier::{classify, EventKind};
use crate::operations::{Addition, Operation, OperationContext, Removal, Swap};
use crate::repository::Repository;
use crate::transport::Subscriber;
use crate::types::{EventLog, Message};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Spec §5: shutdown waits up to 3s for workers to drain before forcing
/// exit — a worker stuck mid-`process_message` on an HTTP fetch isn't
/// cancellation-aware (see `worker_loop`'s `select!`), so the drain itself
/// must not wait unboundedly.
const SHUTDOWN_DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

pub struct Dispatcher<R: Repository> {
    ctx: OperationContext<R>,
}

impl<R: Repository> Dispatcher<R> {
    pub fn new(ctx: OperationContext<R>) -> Self {
        Self { ctx }
    }

    /// Drains `subscriber` until it closes or cancellation fires, lazily
    /// spinning up a bounded-ring worker per distinct subject observed.
    pub async fn run(self, mut subscriber: impl Subscriber) -> Result<()> {
        let mut workers: HashMap<String, mpsc::Sender<Message>> = HashMap::new();
        let mut join_set = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.ctx.cancel.cancelled() => break,
                maybe_msg = subscriber.recv() => {
                    let Some(msg) = maybe_msg else { break };
                    let subject = msg.subject.clone();
                    let sender = workers.entry(subject.clone()).or_insert_with(|| {
                        let (tx, rx) = mpsc::channel(self.ctx.config.buffer_size);
                        let ctx = self.ctx.clone();
                        join_set.spawn(Self::worker_loop(ctx, subject.clone(), rx));
                        tx
                    });

                    match sender.try_send(msg) {
                        Ok(()) => {}
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            warn!(subject, "subject handler buffer overflow, dropping message");
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => {}
                    }
                }
            }
        }

        drop(workers);
        if tokio::time::timeout(SHUTDOWN_DRAIN_TIMEOUT, async {
            while join_set.join_next().await.is_some() {}
        })
        .await
        .is_err()
        {
            warn!("workers did not drain within shutdown timeout, aborting");
            join_set.abort_all();
            while join_set.join_next().await.is_some() {}
        }
        Ok(())
    }

    async fn worker_loop(ctx: OperationContext<R>, subject: String, mut rx: mpsc::Receiver<Message>) {
        loop {
            tokio::select! {
                _ = ctx.cancel.cancelled() => return,
                maybe = rx.recv() => {
                    let Some(msg) = maybe else { return };
                    if let Err(e) = Self::process_message(&ctx, msg).await {
                        warn!(subject = %subject, error = %e, "failed to process message");
                    }
                }
            }
        }
    }

    /// The per-message handler: parse, cache, classify, and — for primary
    /// events — build and publish the derived operation. Never returns an
    /// error for data-dependent failures; only a deserialization failure
    /// of the message itself surfaces as `Err` so the caller can log
    /// context, and even that is swallowed by the worker loop above
    /// rather than killing the worker.
    async fn process_message(ctx: &OperationContext<R>, msg: Message) -> Result<()> {
        let log: EventLog = serde_json::from_slice(&msg.data).context("parsing event log from message")?;

        if ctx.config.filter_removed_logs && log.removed {
            return Ok(());
        }

        let Some(instruction) = classify(&log) else {
            warn!(subject = %msg.subject, "malformed log, no usable topic0, dropping");
            return Ok(());
        };

        ctx.cache.insert(log.clone()).await;

        if !instruction.has_builder {
            return Ok(());
        }

        match instruction.kind {
            EventKind::Mint => Self::build_and_publish(ctx, Addition::default(), &log, msg.received_at).await,
            EventKind::Collect => Self::build_and_publish(ctx, Removal::default(), &log, msg.received_at).await,
            EventKind::Swap => Self::build_and_publish(ctx, Swap::default(), &log, msg.received_at).await,
            EventKind::Transfer | EventKind::Burn | EventKind::Other => Ok(()),
        }
    }

    async fn build_and_publish<O: Operation<R>>(
        ctx: &OperationContext<R>,
        mut op: O,
        log: &EventLog,
        ts: DateTime<Utc>,
    ) -> Result<()> {
        if let Err(e) = op.process(ctx, log).await {
            warn!(tx_hash = %log.transaction_hash, error = %e, "operation build failed");
            return Ok(());
        }
        if !op.can_publish(&ctx.config) {
            return Ok(());
        }

        info!(tx_hash = %log.transaction_hash, summary = %op.summary(), "operation processed");
        if let Err(e) = op.publish(ctx, ts).await {
            warn!(tx_hash = %log.transaction_hash, error = %e, "transport publish failed");
        }
        if let Err(e) = op.save(ctx, ts).await {
            warn!(tx_hash = %log.transaction_hash, error = %e, "repository save failed");
        }
        Ok(())
    }
}
