//! Standalone demo binary: wires configuration, an in-memory repository,
//! a channel-backed transport, and the dispatcher into a runnable service.
//!
//! Production deployments wire a real NATS/JetStream transport and a
//! database-backed `Repository` behind the same traits — the core logic
//! in `chainpulse_analytics` doesn't change.

use anyhow::Result;
use chainpulse_analytics::cache::LogCache;
use chainpulse_analytics::config::Config;
use chainpulse_analytics::dispatcher::Dispatcher;
use chainpulse_analytics::fetcher::TokenResolver;
use chainpulse_analytics::operations::{OperationContext, UnknownPoolStats};
use chainpulse_analytics::publisher::ChannelPublisher;
use chainpulse_analytics::repository::InMemoryRepository;
use chainpulse_analytics::transport::ChannelFeed;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Arc::new(Config::from_env()?);
    let repository = Arc::new(InMemoryRepository::new());
    let resolver = Arc::new(TokenResolver::new(&config, repository.clone()));
    let cache = Arc::new(LogCache::new(config.log_cache_ttl));
    let (publisher, mut published) = ChannelPublisher::new(config.buffer_size);
    let cancel = CancellationToken::new();

    let ctx = OperationContext {
        repository,
        cache,
        resolver,
        publisher: Arc::new(publisher),
        config: config.clone(),
        stats: Arc::new(UnknownPoolStats::default()),
        cancel: cancel.clone(),
    };

    let subject = format!("{}.log-event", config.subscribe_prefix.split('.').next().unwrap_or("ethereum"));
    let (_feed, subscriber) = ChannelFeed::pair(config.buffer_size);

    info!(%subject, "chainpulse-analytics starting, waiting for inbound log-event messages");

    let dispatcher_cancel = cancel.clone();
    let dispatcher = tokio::spawn(Dispatcher::new(ctx).run(subscriber));

    let drain_published = tokio::spawn(async move {
        while let Some(msg) = published.recv().await {
            info!(subject = %msg.subject, bytes = msg.payload.len(), "would publish to transport");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    dispatcher_cancel.cancel();

    dispatcher.await??;
    drain_published.abort();

    Ok(())
}
