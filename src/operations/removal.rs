//! Removal (triggered by Collect): matches the sibling Burn log in the
//! same transaction and pool, builds the withdrawn-principal Position,
//! then computes earned fees as collected-minus-burned.

use super::{Operation, OperationContext};
use crate::abi;
use crate::classifier::EventKind;
use crate::codec::hex_to_signed_bigint;
use crate::position::{can_publish, normalize};
use crate::repository::Repository;
use crate::types::{
    EventLog, Position, RemovalMessage, TokenEarnedMessage, TokenMessage, TokenTransaction,
};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Liquidity removal: withdrawn principal (from Burn) plus fees earned
/// (Collect amount minus Burn principal, per side).
#[derive(Debug, Clone, Default)]
pub struct Removal {
    pub position: Position,
    pub earned0: TokenTransaction,
    pub earned1: TokenTransaction,
}

impl Removal {
    /// Finds the Burn log in the same transaction emitted by the same
    /// pool address. Fails the operation if none is cached.
    async fn find_burn<R: Repository>(ctx: &OperationContext<R>, collect: &EventLog) -> Result<EventLog> {
        let burns = ctx
            .cache
            .find(&collect.transaction_hash, |l| {
                l.topic0()
                    .map(|t| t.eq_ignore_ascii_case(&crate::classifier::BURN_SIG))
                    .unwrap_or(false)
                    && l.address.eq_ignore_ascii_case(&collect.address)
            })
            .await;
        burns
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("fetched burn event has no liquidity pool"))
    }

    /// Earned-fees math: Collect's amount0/amount1, swapped to match the
    /// Position's order if normalization flipped it, minus the
    /// Burn-derived principal already on the Position.
    fn calculate_fees_earned(&mut self, collect: &EventLog, swapped: bool) -> Result<()> {
        let collect_amounts = abi::decode_collect(&collect.data)?;
        let (c0_hex, c1_hex) = if swapped {
            (collect_amounts.amount1_hex.clone(), collect_amounts.amount0_hex.clone())
        } else {
            (collect_amounts.amount0_hex.clone(), collect_amounts.amount1_hex.clone())
        };

        let c0 = hex_to_signed_bigint(&c0_hex)?;
        let c1 = hex_to_signed_bigint(&c1_hex)?;

        let dec0 = self.position.token0.token.decimals;
        let dec1 = self.position.token1.token.decimals;

        self.earned0 = TokenTransaction {
            token: self.position.token0.token.clone(),
            amount: abi::scale_amount(&c0, dec0) - self.position.token0.amount,
            price: self.position.token0.price,
        };
        self.earned1 = TokenTransaction {
            token: self.position.token1.token.clone(),
            amount: abi::scale_amount(&c1, dec1) - self.position.token1.amount,
            price: self.position.token1.price,
        };
        Ok(())
    }
}

#[async_trait]
impl<R: Repository> Operation<R> for Removal {
    async fn process(&mut self, ctx: &OperationContext<R>, primary: &EventLog) -> Result<()> {
        let pool_address = primary.address.clone();

        let burn = Self::find_burn(ctx, primary).await?;

        let Some((addr0, addr1)) = ctx.repository.get_pool_pair_addresses(&pool_address).await? else {
            ctx.stats.record_miss(&pool_address);
            bail!("SKIP - liq. pool is unknown (removal). pool address: {pool_address}");
        };

        let token0 = ctx
            .resolver
            .get_token(&addr0, &ctx.cancel)
            .await
            .map_err(|e| anyhow!("at least one token is unknown in liquidity removal: {e}"))?;
        let token1 = ctx
            .resolver
            .get_token(&addr1, &ctx.cancel)
            .await
            .map_err(|e| anyhow!("at least one token is unknown in liquidity removal: {e}"))?;

        if burn.topics.len() < 4 {
            bail!("Burn log has {} topics, expected at least 4", burn.topics.len());
        }
        let lower_tick: i32 = hex_to_signed_bigint(&burn.topics[2])?
            .try_into()
            .map_err(|_| anyhow!("lower tick out of i32 range"))?;
        let upper_tick: i32 = hex_to_signed_bigint(&burn.topics[3])?
            .try_into()
            .map_err(|_| anyhow!("upper tick out of i32 range"))?;

        let amounts = abi::decode_burn(&burn.data)?;
        let amount0 = hex_to_signed_bigint(&amounts.amount0_hex)?;
        let amount1 = hex_to_signed_bigint(&amounts.amount1_hex)?;

        let amount0_scaled = abi::scale_amount(&amount0, token0.decimals);
        let amount1_scaled = abi::scale_amount(&amount1, token1.decimals);
        self.position = Position {
            address: burn.address.clone(),
            tx_hash: burn.transaction_hash.clone(),
            lower_tick,
            upper_tick,
            token0: TokenTransaction::for_token(token0, amount0_scaled),
            token1: TokenTransaction::for_token(token1, amount1_scaled),
            ..Default::default()
        };

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

        let swapped = normalize(&mut self.position, &ctx.config);
        self.calculate_fees_earned(primary, swapped)?;

        Ok(())
    }

    fn can_publish(&self, config: &crate::config::Config) -> bool {
        self.position.tokens_set() && can_publish(&self.position, config)
    }

    async fn publish(&self, ctx: &OperationContext<R>, ts: DateTime<Utc>) -> Result<()> {
        let total_earned_usd =
            self.earned0.price * self.earned0.amount + self.earned1.price * self.earned1.amount;
        let message = RemovalMessage {
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
            earned: [
                TokenEarnedMessage {
                    symbol: self.earned0.token.symbol.clone(),
                    amount: self.earned0.amount,
                    total_value_usd: self.earned0.price * self.earned0.amount,
                },
                TokenEarnedMessage {
                    symbol: self.earned1.token.symbol.clone(),
                    amount: self.earned1.amount,
                    total_value_usd: self.earned1.price * self.earned1.amount,
                },
            ],
            total_earned_usd,
            tx_hash: self.position.tx_hash.clone(),
        };
        let payload = serde_json::to_vec(&message)?;
        let subject = crate::publisher::subject_for(
            &ctx.config.subscribe_prefix,
            EventKind::Collect.publish_fragment().unwrap(),
            &message.pair[0].symbol,
            &message.pair[1].symbol,
        );
        ctx.publisher.publish(&subject, payload).await
    }

    async fn save(&self, ctx: &OperationContext<R>, _ts: DateTime<Utc>) -> Result<()> {
        ctx.repository
            .save_removal(&self.position.tx_hash, &self.summary())
            .await
    }

    fn summary(&self) -> String {
        format!(
            "Removing {} of {} and {} of {} from {}. Earned {} of {} and {} of {} (${:.2})",
            self.position.token0.amount,
            self.position.token0.token.symbol,
            self.position.token1.amount,
            self.position.token1.token.symbol,
            self.position.address,
            self.earned0.amount,
            self.position.token0.token.symbol,
            self.earned1.amount,
            self.position.token1.token.symbol,
            self.earned0.amount * self.position.token0.price + self.earned1.amount * self.position.token1.price,
        )
    }
}
