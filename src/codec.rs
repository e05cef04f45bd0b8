//! Hex/tick codec: signed two's-complement hex decoding, tick→ratio
//! conversion, and event-signature (selector) derivation.

use alloy::primitives::keccak256;
use anyhow::{bail, Result};
use num_bigint::BigInt;
use num_traits::Pow;

/// Decodes a `0x`-prefixed hex string (up to 64 hex digits) as a
/// two's-complement signed integer of bit-width `4 * digits.len()`.
///
/// Negativity is decided by whether the first three hex digits after
/// `0x` are literally `"fff"`, not by a numeric magnitude check — this
/// matches how ticks packed into topic words are conventionally
/// sign-extended on chain.
pub fn hex_to_signed_bigint(s: &str) -> Result<BigInt> {
    let Some(digits) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) else {
        bail!("hex string missing 0x prefix: {s}");
    };
    if digits.is_empty() || digits.len() > 64 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        bail!("malformed hex string: {s}");
    }

    let lower = digits.to_ascii_lowercase();
    let unsigned = BigInt::parse_bytes(lower.as_bytes(), 16)
        .ok_or_else(|| anyhow::anyhow!("failed to parse hex digits: {s}"))?;

    if lower.starts_with("fff") {
        let bit_width = (lower.len() * 4) as u32;
        let modulus = BigInt::from(1) << bit_width;
        Ok(unsigned - modulus)
    } else {
        Ok(unsigned)
    }
}

/// Converts a tick into a raw token1-per-token0 price ratio, scaled for
/// decimal difference: `1.0001^tick / 10^(dec1 - dec0)`.
///
/// Pure function — does not range-check `tick`; callers validate against
/// the signed-24-bit tick range where that matters.
pub fn tick_to_ratio(tick: i32, dec0: u32, dec1: u32) -> f64 {
    let price = 1.0001_f64.powi(tick);
    let scale = 10.0_f64.pow(dec1 as i32 - dec0 as i32);
    price / scale
}

/// Derives the 4-byte event selector (`0x` + 8 hex digits) for an event
/// header of the form `Name(type1,type2,...)`.
pub fn event_signature(header: &str) -> String {
    let hash = keccak256(header.as_bytes());
    format!("0x{}", hex::encode(&hash[..4]))
}

/// Minimal hex-encoding helper so we don't need to pull in the `hex` crate
/// just for this one call site.
mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Event selector derivation
    #[test]
    fn mint_signature() {
        assert_eq!(
            event_signature("Mint(address,address,int24,int24,uint128,uint256,uint256)"),
            "0x7a53080b"
        );
    }

    #[test]
    fn transfer_signature() {
        assert_eq!(
            event_signature("Transfer(address,address,uint256)"),
            "0xddf252ad"
        );
    }

    #[test]
    fn burn_signature() {
        assert_eq!(
            event_signature("Burn(address,int24,int24,uint128,uint256,uint256)"),
            "0x0c396cd9"
        );
    }

    // Signed hex decoding
    #[test]
    fn negative_tick_hex() {
        let v = hex_to_signed_bigint(
            "0xfffffffffffffffffffffffffffffffffffffffffffffffffffffffffff2764c",
        )
        .unwrap();
        assert_eq!(v, BigInt::from(-887220));
    }

    #[test]
    fn positive_tick_hex() {
        let v = hex_to_signed_bigint(
            "0x00000000000000000000000000000000000000000000000000000000000d89b4",
        )
        .unwrap();
        assert_eq!(v, BigInt::from(887220));
    }

    #[test]
    fn large_positive_amount_hex() {
        let v = hex_to_signed_bigint(
            "0x0000000000000000000000000000000000000003ff0aefc357bb2bcd5150a760",
        )
        .unwrap();
        assert_eq!(v, BigInt::parse_bytes(b"316616386554458346478543873888", 10).unwrap());
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(hex_to_signed_bigint("1234").is_err());
    }

    #[test]
    fn rejects_non_hex() {
        assert!(hex_to_signed_bigint("0xzz").is_err());
    }

    // Property 1: for any 66-char 0x-prefixed hex string, decoding matches
    // the least-significant 64 hex digits minus 2^256 iff digits[0:3]=="fff".
    #[test]
    fn property_matches_two_complement_definition() {
        let cases = [
            "0x0000000000000000000000000000000000000000000000000000000000000001",
            "0xffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
            "0xfff0000000000000000000000000000000000000000000000000000000000f",
        ];
        for c in cases {
            let digits = &c[2..];
            let unsigned = BigInt::parse_bytes(digits.as_bytes(), 16).unwrap();
            let expect = if digits.starts_with("fff") {
                unsigned - (BigInt::from(1) << (digits.len() as u32 * 4))
            } else {
                unsigned
            };
            assert_eq!(hex_to_signed_bigint(c).unwrap(), expect);
        }
    }

    // Property 3: tick_to_ratio is finite, positive, and monotonic in tick.
    #[test]
    fn tick_to_ratio_monotonic_and_positive() {
        let dec0 = 18;
        let dec1 = 6;
        let mut prev = tick_to_ratio(-887272, dec0, dec1);
        assert!(prev.is_finite() && prev > 0.0);
        for tick in (-887272..=887272).step_by(50_000) {
            let r = tick_to_ratio(tick, dec0, dec1);
            assert!(r.is_finite() && r > 0.0);
            assert!(r >= prev);
            prev = r;
        }
    }

    // S3 case 1: WBTC/WETH takes the no-inversion path (native already
    // token1), so the raw tick_to_ratio output is the published quote.
    #[test]
    fn tick_to_ratio_wbtc_weth() {
        let lower = tick_to_ratio(259720, 8, 18);
        let upper = tick_to_ratio(259750, 8, 18);
        assert!((lower - 19.00782158).abs() < 1e-3);
        assert!((upper - 19.06492781).abs() < 1e-3);
    }
}
