//! Position normalizer: tick→ratio conversion, stable/native quote
//! reorientation, lower≤upper sorting, and USD valuation.

use crate::codec::tick_to_ratio;
use crate::config::Config;
use crate::types::Position;

/// Normalizes a Position in place. Both tokens must already be resolved
/// (non-empty address/symbol) before calling this.
///
/// Returns whether the quote-convention step swapped `token0`/`token1` —
/// callers building Removal's earned-fees math need to know this to
/// decide whether to swap the Collect amounts the same way.
pub fn normalize(position: &mut Position, config: &Config) -> bool {
    let dec0 = position.token0.token.decimals;
    let dec1 = position.token1.token.decimals;
    let mut lower = tick_to_ratio(position.lower_tick, dec0, dec1);
    let mut upper = tick_to_ratio(position.upper_tick, dec0, dec1);

    let stable0 = config.is_stable(&position.token0.token.address);
    let stable1 = config.is_stable(&position.token1.token.address);
    let native0 = config.is_native(&position.token0.token.address);
    let native1 = config.is_native(&position.token1.token.address);

    let should_invert = if stable0 || stable1 {
        !stable1
    } else if native0 || native1 {
        !native1
    } else {
        false
    };

    let mut swapped = false;
    if should_invert {
        lower = 1.0 / lower;
        upper = 1.0 / upper;
        std::mem::swap(&mut position.token0, &mut position.token1);
        swapped = true;
    }

    if lower > upper {
        std::mem::swap(&mut lower, &mut upper);
    }
    position.lower_ratio = lower;
    position.upper_ratio = upper;

    let p0 = position.token0.price;
    let p1 = position.token1.price;
    let a0 = position.token0.amount;
    let a1 = position.token1.amount;
    position.total_value = p0 * a0 + p1 * a1;
    position.current_ratio = if p0 > 0.0 && p1 > 0.0 { p0 / p1 } else { 0.0 };

    swapped
}

/// Publication predicate: whether a normalized Position is complete and
/// economically relevant enough to publish.
pub fn can_publish(position: &Position, config: &Config) -> bool {
    let t0 = &position.token0.token;
    let t1 = &position.token1.token;

    if t0.symbol.is_empty() || t1.symbol.is_empty() {
        return false;
    }
    if position.lower_ratio == 0.0 && position.upper_ratio == 0.0 {
        return false;
    }
    if position.token0.amount == 0.0 && position.token1.amount == 0.0 {
        return false;
    }
    if position.token0.price <= 0.0 || position.token1.price <= 0.0 {
        return false;
    }

    let quote_present = config.is_stable(&t0.address)
        || config.is_stable(&t1.address)
        || config.is_native(&t0.address)
        || config.is_native(&t1.address);
    quote_present
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Token, TokenTransaction};

    fn position(
        token0_addr: &str,
        dec0: u32,
        token1_addr: &str,
        dec1: u32,
        lower_tick: i32,
        upper_tick: i32,
    ) -> Position {
        Position {
            token0: TokenTransaction::for_token(
                Token {
                    address: token0_addr.to_string(),
                    symbol: "T0".to_string(),
                    decimals: dec0,
                    ..Default::default()
                },
                1.0,
            ),
            token1: TokenTransaction::for_token(
                Token {
                    address: token1_addr.to_string(),
                    symbol: "T1".to_string(),
                    decimals: dec1,
                    ..Default::default()
                },
                1.0,
            ),
            lower_tick,
            upper_tick,
            ..Default::default()
        }
    }

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "expected {b}, got {a}");
    }

    // S3 case 1: native already token1, no inversion needed.
    #[test]
    fn wbtc_weth_native_already_quote() {
        let cfg = Config::default();
        let mut pos = position(
            "0xwbtc", 8,
            &cfg.native_coins[0].clone(), 18,
            259720, 259750,
        );
        normalize(&mut pos, &cfg);
        assert_close(pos.lower_ratio, 19.00782158, 1e-2);
        assert_close(pos.upper_ratio, 19.06492781, 1e-2);
    }

    // S3 case 2: stable is token0, token1 is not stable -> invert + swap.
    #[test]
    fn usdc_weth_inverts_to_quote_stable() {
        let cfg = Config::default();
        let mut pos = position(
            &cfg.stable_coins[1].clone(), 6,
            "0xweth_nonnative_for_test", 18,
            186220, 201460,
        );
        normalize(&mut pos, &cfg);
        assert_close(pos.lower_ratio, 1782.9567287, 1.0);
        assert_close(pos.upper_ratio, 8184.1296866, 1.0);
    }

    // S3 case 3: stable already token1 -> no invert; raw ticks already
    // yield the sorted, quote-correct ratios.
    #[test]
    fn weth_usdt_already_sorted() {
        let cfg = Config::default();
        let mut pos = position(
            &cfg.native_coins[0].clone(), 18,
            &cfg.stable_coins[0].clone(), 6,
            -204660, -197760,
        );
        normalize(&mut pos, &cfg);
        assert_close(pos.lower_ratio, 1294.71302559, 1.0);
        assert_close(pos.upper_ratio, 2581.20042321, 1.0);
    }

    #[test]
    fn current_ratio_is_zero_unless_both_prices_positive() {
        let cfg = Config::default();
        let mut pos = position("0xa", 18, "0xb", 18, 0, 1000);
        pos.token0.price = 0.0;
        pos.token1.price = 5.0;
        normalize(&mut pos, &cfg);
        assert_eq!(pos.current_ratio, 0.0);

        pos.token0.price = 2.0;
        normalize(&mut pos, &cfg);
        assert_close(pos.current_ratio, 0.4, 1e-9);
    }

    #[test]
    fn can_publish_requires_quote_token_and_positive_prices() {
        let cfg = Config::default();
        let mut pos = position(&cfg.native_coins[0].clone(), 18, "0xrandom", 18, 0, 1000);
        pos.token0.token.symbol = "WETH".to_string();
        pos.token1.token.symbol = "RAND".to_string();
        pos.token0.amount = 1.0;
        pos.token1.amount = 2.0;
        pos.token0.price = 2000.0;
        pos.token1.price = 1.0;
        normalize(&mut pos, &cfg);
        assert!(can_publish(&pos, &cfg));

        pos.token0.price = 0.0;
        assert!(!can_publish(&pos, &cfg));
    }

    #[test]
    fn can_publish_false_without_any_quote_token() {
        let cfg = Config::default();
        let mut pos = position("0xrandom1", 18, "0xrandom2", 18, 0, 1000);
        pos.token0.token.symbol = "AAA".to_string();
        pos.token1.token.symbol = "BBB".to_string();
        pos.token0.amount = 1.0;
        pos.token1.amount = 1.0;
        pos.token0.price = 1.0;
        pos.token1.price = 1.0;
        normalize(&mut pos, &cfg);
        assert!(!can_publish(&pos, &cfg));
    }
}
