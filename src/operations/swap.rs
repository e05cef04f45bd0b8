//! Swap (triggered by Swap): decodes signed amount0/amount1, normalizes
//! the pair order, then identifies which side the pool received (`From`)
//! and which it paid out (`To`).

use super::{Operation, OperationContext};
use crate::abi;
use crate::classifier::EventKind;
use crate::position::normalize;
use crate::repository::Repository;
use crate::types::{EventLog, Position, SwapMessage, SwapSideMessage, TokenTransaction};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A swap: the normalized Position plus which side moved `From` the pool
/// and `To` the trader. Convention: positive means the pool gained that
/// token.
#[derive(Debug, Clone, Default)]
pub struct Swap {
    pub position: Position,
    pub from: TokenTransaction,
    pub to: TokenTransaction,
}

#[async_trait]
impl<R: Repository> Operation<R> for Swap {
    async fn process(&mut self, ctx: &OperationContext<R>, primary: &EventLog) -> Result<()> {
        let Some((addr0, addr1)) = ctx.repository.get_pool_pair_addresses(&primary.address).await? else {
            ctx.stats.record_miss(&primary.address);
            bail!("(swap) pool unknown? {}", primary.address);
        };

        let token0 = ctx
            .resolver
            .get_token(&addr0, &ctx.cancel)
            .await
            .map_err(|e| anyhow!("SKIP (swap) - at least one token is unknown. Pool address: {}: {e}", primary.address))?;
        let token1 = ctx
            .resolver
            .get_token(&addr1, &ctx.cancel)
            .await
            .map_err(|e| anyhow!("SKIP (swap) - at least one token is unknown. Pool address: {}: {e}", primary.address))?;

        let amounts = abi::decode_swap(&primary.data)?;
        let amount0 = crate::codec::hex_to_signed_bigint(&amounts.amount0_hex)?;
        let amount1 = crate::codec::hex_to_signed_bigint(&amounts.amount1_hex)?;

        self.position = Position {
            address: primary.address.clone(),
            tx_hash: primary.transaction_hash.clone(),
            token0: TokenTransaction::for_token(token0.clone(), abi::scale_amount(&amount0, token0.decimals)),
            token1: TokenTransaction::for_token(token1.clone(), abi::scale_amount(&amount1, token1.decimals)),
            ..Default::default()
        };

        normalize(&mut self.position, &ctx.config);

        let a0 = self.position.token0.amount;
        let a1 = self.position.token1.amount;
        if a0 < 0.0 && a1 > 0.0 {
            self.from = self.position.token1.clone();
            self.to = self.position.token0.clone();
        } else if a1 < 0.0 && a0 > 0.0 {
            self.from = self.position.token0.clone();
            self.to = self.position.token1.clone();
        } else {
            bail!("bad swap: both token amounts are non-negative or non-positive. TX: {}", self.position.tx_hash);
        }
        self.to.amount = -self.to.amount;

        Ok(())
    }

    fn can_publish(&self, _config: &crate::config::Config) -> bool {
        !self.position.token0.token.is_unset() && !self.position.token1.token.is_unset()
    }

    async fn publish(&self, ctx: &OperationContext<R>, ts: DateTime<Utc>) -> Result<()> {
        let message = SwapMessage {
            timestamp: ts,
            address: self.position.address.clone(),
            tx_hash: self.position.tx_hash.clone(),
            from: SwapSideMessage {
                symbol: self.from.token.symbol.clone(),
                amount: self.from.amount,
            },
            to: SwapSideMessage {
                symbol: self.to.token.symbol.clone(),
                amount: self.to.amount,
            },
        };
        let payload = serde_json::to_vec(&message)?;
        let subject = crate::publisher::subject_for(
            &ctx.config.subscribe_prefix,
            EventKind::Swap.publish_fragment().unwrap(),
            &self.position.token0.token.symbol,
            &self.position.token1.token.symbol,
        );
        ctx.publisher.publish(&subject, payload).await
    }

    async fn save(&self, ctx: &OperationContext<R>, _ts: DateTime<Utc>) -> Result<()> {
        ctx.repository
            .save_swap(&self.position.tx_hash, &self.summary())
            .await
    }

    fn summary(&self) -> String {
        format!(
            "Swapping {} of {} to {} of {}.",
            self.from.amount, self.from.token.symbol, self.to.amount, self.to.token.symbol
        )
    }
}
