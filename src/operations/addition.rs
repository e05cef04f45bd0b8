//! Addition (triggered by Mint): joins sibling Transfer logs from the
//! same transaction onto a Mint's generic amount0/amount1, resolving
//! each side's token identity by numeric equality.

use super::{Operation, OperationContext, UNISWAP_POSITIONS_OWNER};
use crate::abi;
use crate::classifier::EventKind;
use crate::codec::hex_to_signed_bigint;
use crate::position::{can_publish, normalize};
use crate::repository::Repository;
use crate::types::{AdditionMessage, EventLog, Position, TokenMessage, TokenTransaction};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Liquidity addition built from a Mint log plus its sibling Transfers.
#[derive(Debug, Clone, Default)]
pub struct Addition {
    pub position: Position,
}

impl Addition {
    /// Attempts to pair a cached Transfer against Mint's amount0/amount1 by
    /// numeric equality, refusing to assign the same token to both sides.
    async fn handle_transfer<R: Repository>(
        &mut self,
        ctx: &OperationContext<R>,
        amount0: &BigInt,
        amount1: &BigInt,
        transfer: &EventLog,
        cancel: &CancellationToken,
    ) {
        if transfer.address.to_lowercase().contains(&UNISWAP_POSITIONS_OWNER[2..]) {
            return;
        }

        let transfer_amount = match abi::decode_transfer_amount(&transfer.data) {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, "failed to decode Transfer amount");
                return;
            }
        };

        let matches0 = &transfer_amount == amount0;
        let matches1 = &transfer_amount == amount1;
        if !matches0 && !matches1 {
            return;
        }

        let token = match ctx.resolver.get_token(&transfer.address, cancel).await {
            Ok(t) => t,
            Err(e) => {
                warn!(error = %e, address = %transfer.address, "failed fetching token information");
                return;
            }
        };
        let amount = abi::scale_amount(&transfer_amount, token.decimals);

        if matches0 && !token.address.eq_ignore_ascii_case(&self.position.token1.token.address) {
            self.position.token0 = TokenTransaction::for_token(token.clone(), amount);
        }
        if matches1 && !token.address.eq_ignore_ascii_case(&self.position.token0.token.address) {
            self.position.token1 = TokenTransaction::for_token(token, amount);
        }
    }

    /// Fetches the pool's canonical token order to fill in a side left
    /// unassigned after the Transfer pass.
    async fn fill_missing_token<R: Repository>(
        &mut self,
        ctx: &OperationContext<R>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let Some((addr0, addr1)) = ctx
            .repository
            .get_pool_pair_addresses(&self.position.address)
            .await?
        else {
            ctx.stats.record_miss(&self.position.address);
            bail!(
                "at least one token is completely unknown and pool {} is also unknown",
                self.position.address
            );
        };

        if self.position.token0.token.is_unset() {
            let token = ctx.resolver.get_token(&addr0, cancel).await?;
            self.position.token0 = TokenTransaction::for_token(token, 0.0);
        }
        if self.position.token1.token.is_unset() {
            let token = ctx.resolver.get_token(&addr1, cancel).await?;
            self.position.token1 = TokenTransaction::for_token(token, 0.0);
        }
        Ok(())
    }

    /// Upserts the pool only once both tokens were actually transferred and
    /// resolved to distinct addresses — the order is then known correct.
    async fn save_pool_if_resolved<R: Repository>(&self, ctx: &OperationContext<R>) -> Result<()> {
        if self.position.either_amount_zero()
            || !self.position.tokens_set()
            || self
                .position
                .token0
                .token
                .address
                .eq_ignore_ascii_case(&self.position.token1.token.address)
        {
            return Ok(());
        }
        ctx.repository
            .save_pool(crate::types::Pool {
                address: self.position.address.clone(),
                token0_address: self.position.token0.token.address.clone(),
                token1_address: self.position.token1.token.address.clone(),
            })
            .await?;
        info!(pool = %self.position.address, "saved new pool");
        Ok(())
    }
}

#[async_trait]
impl<R: Repository> Operation<R> for Addition {
    async fn process(&mut self, ctx: &OperationContext<R>, primary: &EventLog) -> Result<()> {
        if !primary.data.to_lowercase().contains(&UNISWAP_POSITIONS_OWNER[2..]) {
            bail!("not a Uniswap Positions NFT mint");
        }
        if primary.topics.len() < 4 {
            bail!("Mint log has {} topics, expected at least 4", primary.topics.len());
        }

        let lower_tick: i32 = hex_to_signed_bigint(&primary.topics[2])?
            .try_into()
            .map_err(|_| anyhow!("lower tick out of i32 range"))?;
        let upper_tick: i32 = hex_to_signed_bigint(&primary.topics[3])?
            .try_into()
            .map_err(|_| anyhow!("upper tick out of i32 range"))?;

        self.position = Position {
            address: primary.address.clone(),
            tx_hash: primary.transaction_hash.clone(),
            lower_tick,
            upper_tick,
            ..Default::default()
        };

        let amounts = abi::decode_mint(&primary.data)?;
        let amount0 = amounts.amount0()?;
        let amount1 = amounts.amount1()?;

        let siblings = ctx
            .cache
            .find(&primary.transaction_hash, |l| {
                l.topic0()
                    .map(|t| t.eq_ignore_ascii_case(&crate::classifier::TRANSFER_SIG))
                    .unwrap_or(false)
            })
            .await;

        for transfer in &siblings {
            self.handle_transfer(ctx, &amount0, &amount1, transfer, &ctx.cancel).await;
        }

        if !self.position.tokens_set() {
            if let Err(e) = self.fill_missing_token(ctx, &ctx.cancel).await {
                warn!(error = %e, "could not resolve missing token for addition");
            }
        }

        if let Err(e) = self.save_pool_if_resolved(ctx).await {
            warn!(error = %e, "error while adding new pool to database");
        }

        if self.position.tokens_set() {
            self.position.token0.price = ctx
                .resolver
                .get_price(&self.position.token0.token.address, &ctx.cancel)
                .await
                .map(|p| p.value)
                .unwrap_or(0.0);
            self.position.token1.price = ctx
                .resolver
                .get_price(&self.position.token1.token.address, &ctx.cancel)
                .await
                .map(|p| p.value)
                .unwrap_or(0.0);
            normalize(&mut self.position, &ctx.config);
        }

        Ok(())
    }

    fn can_publish(&self, config: &crate::config::Config) -> bool {
        self.position.tokens_set() && can_publish(&self.position, config)
    }

    async fn publish(&self, ctx: &OperationContext<R>, ts: DateTime<Utc>) -> Result<()> {
        let message = AdditionMessage {
            timestamp: ts,
            address: self.position.address.clone(),
            lower_token_ratio: self.position.lower_ratio,
            current_token_ratio: self.position.current_ratio,
            upper_token_ratio: self.position.upper_ratio,
            total_value_usd: self.position.total_value,
            pair: [
                TokenMessage {
                    symbol: self.position.token0.token.symbol.clone(),
                    amount: self.position.token0.amount,
                    price_usd: self.position.token0.price,
                },
                TokenMessage {
                    symbol: self.position.token1.token.symbol.clone(),
                    amount: self.position.token1.amount,
                    price_usd: self.position.token1.price,
                },
            ],
            tx_hash: self.position.tx_hash.clone(),
        };
        let payload = serde_json::to_vec(&message)?;
        let subject = crate::publisher::subject_for(
            &ctx.config.subscribe_prefix,
            EventKind::Mint.publish_fragment().unwrap(),
            &message.pair[0].symbol,
            &message.pair[1].symbol,
        );
        ctx.publisher.publish(&subject, payload).await
    }

    async fn save(&self, ctx: &OperationContext<R>, _ts: DateTime<Utc>) -> Result<()> {
        ctx.repository
            .save_addition(&self.position.tx_hash, &self.summary())
            .await
    }

    fn summary(&self) -> String {
        format!(
            "Adding {} of {} (${:.2}) and {} of {} (${:.2}) = ${:.2}. To {} between {:.6} and {:.6} while current is {:.6}",
            self.position.token0.amount,
            self.position.token0.token.symbol,
            self.position.token0.price,
            self.position.token1.amount,
            self.position.token1.token.symbol,
            self.position.token1.price,
            self.position.total_value,
            self.position.address,
            self.position.lower_ratio,
            self.position.upper_ratio,
            self.position.current_ratio,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LogCache;
    use crate::config::Config;
    use crate::fetcher::TokenResolver;
    use crate::operations::UnknownPoolStats;
    use crate::publisher::ChannelPublisher;
    use crate::repository::{InMemoryRepository, Repository as _};
    use crate::types::Token;
    use std::sync::Arc;
    use std::time::Duration;

    fn signed_tick_hex(tick: i32) -> String {
        use num_bigint::BigInt;
        if tick < 0 {
            let modulus = BigInt::from(1) << 256u32;
            let value = modulus + BigInt::from(tick);
            format!("0x{}", value.to_str_radix(16))
        } else {
            format!("0x{tick:x}")
        }
    }

    fn word_hex(n: u64) -> String {
        format!("{n:064x}")
    }

    fn mint_log(tx: &str, pool: &str, lower: i32, upper: i32, amount0: u64, amount1: u64) -> EventLog {
        let owner_word = format!("000000000000000000000000{}", &UNISWAP_POSITIONS_OWNER[2..]);
        let data = format!("0x{}{}{}{}", owner_word, word_hex(1000), word_hex(amount0), word_hex(amount1));
        EventLog {
            address: pool.to_string(),
            topics: vec![
                crate::classifier::MINT_SIG.clone(),
                format!("0x{}", word_hex(0)),
                signed_tick_hex(lower),
                signed_tick_hex(upper),
            ],
            data,
            transaction_hash: tx.to_string(),
            ..Default::default()
        }
    }

    fn transfer_log(tx: &str, token_addr: &str, amount: u64) -> EventLog {
        EventLog {
            address: token_addr.to_string(),
            topics: vec![crate::classifier::TRANSFER_SIG.clone()],
            data: format!("0x{}", word_hex(amount)),
            transaction_hash: tx.to_string(),
            ..Default::default()
        }
    }

    async fn context_with_tokens(tokens: &[(&str, &str, u32)]) -> OperationContext<InMemoryRepository> {
        let config = Arc::new(Config::default());
        let repo = Arc::new(InMemoryRepository::new());
        for (addr, symbol, decimals) in tokens {
            repo.add_token(Token {
                address: addr.to_string(),
                symbol: symbol.to_string(),
                name: symbol.to_string(),
                decimals: *decimals,
                total_supply: None,
            })
            .await
            .unwrap();
        }
        OperationContext {
            repository: repo.clone(),
            cache: Arc::new(LogCache::new(Duration::from_secs(120))),
            resolver: Arc::new(TokenResolver::new(&config, repo)),
            publisher: Arc::new(ChannelPublisher::new(100).0),
            config,
            stats: Arc::new(UnknownPoolStats::default()),
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn rejects_non_position_mint() {
        let ctx = context_with_tokens(&[]).await;
        let mut add = Addition::default();
        let log = EventLog {
            data: format!("0x{}{}{}{}", word_hex(0), word_hex(0), word_hex(1), word_hex(2)),
            topics: vec![
                crate::classifier::MINT_SIG.clone(),
                String::new(),
                signed_tick_hex(0),
                signed_tick_hex(0),
            ],
            ..Default::default()
        };
        assert!(add.process(&ctx, &log).await.is_err());
    }

    // A Mint correlated against two sibling Transfers by numeric amount
    // equality resolves both token identities.
    #[tokio::test]
    async fn correlates_mint_with_sibling_transfers_by_amount() {
        let ctx = context_with_tokens(&[
            ("0xaaaa000000000000000000000000000000000a", "AAA", 18),
            ("0xbbbb000000000000000000000000000000000b", "BBB", 6),
        ])
        .await;

        ctx.cache
            .insert(transfer_log("0xtx1", "0xaaaa000000000000000000000000000000000a", 500))
            .await;
        ctx.cache
            .insert(transfer_log("0xtx1", "0xbbbb000000000000000000000000000000000b", 700))
            .await;

        let mint = mint_log("0xtx1", "0xpool", 100, 200, 500, 700);
        let mut add = Addition::default();
        add.process(&ctx, &mint).await.unwrap();

        assert_eq!(add.position.token0.token.symbol, "AAA");
        assert_eq!(add.position.token1.token.symbol, "BBB");
        assert!((add.position.token0.amount - 500.0 / 1e18).abs() < 1e-12);
        assert!((add.position.token1.amount - 700.0 / 1e6).abs() < 1e-9);
    }
}
