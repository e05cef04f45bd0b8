//! ABI-lite decoder: extracts `amount0`/`amount1` from the fixed-offset
//! `data` payloads of Mint/Burn/Collect/Swap logs. Not a general ABI
//! decoder — each event's word layout is hardcoded against its known ABI.

use crate::codec::hex_to_signed_bigint;
use anyhow::{bail, Result};
use num_bigint::BigInt;

const WORD_HEX_CHARS: usize = 64;

/// Splits a `0x`-prefixed `data` string into 32-byte (64 hex-char) words
/// and returns them still `0x`-prefixed, ready for `hex_to_signed_bigint`.
fn split_words(data: &str) -> Result<Vec<String>> {
    let Some(body) = data.strip_prefix("0x") else {
        bail!("data field missing 0x prefix: {data}");
    };
    if body.len() % WORD_HEX_CHARS != 0 {
        bail!(
            "data length {} is not a multiple of {WORD_HEX_CHARS} hex chars",
            body.len()
        );
    }
    Ok(body
        .as_bytes()
        .chunks(WORD_HEX_CHARS)
        .map(|c| format!("0x{}", std::str::from_utf8(c).unwrap()))
        .collect())
}

fn word_at(words: &[String], idx: usize, expect_len: usize, event: &str) -> Result<String> {
    if words.len() != expect_len {
        bail!(
            "{event}.data has {} words, expected {expect_len}",
            words.len()
        );
    }
    words
        .get(idx)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("{event}.data missing word {idx}"))
}

/// Decoded amount0/amount1 pair, still as hex words (callers decode the
/// signed value and scale by decimals separately, since Mint/Burn/Collect
/// amounts are always non-negative while Swap amounts may be signed).
#[derive(Debug, Clone)]
pub struct Amounts {
    pub amount0_hex: String,
    pub amount1_hex: String,
}

impl Amounts {
    pub fn amount0(&self) -> Result<BigInt> {
        hex_to_signed_bigint(&self.amount0_hex)
    }
    pub fn amount1(&self) -> Result<BigInt> {
        hex_to_signed_bigint(&self.amount1_hex)
    }
}

/// Mint data layout: `owner, amount, amount0, amount1` (4 words).
pub fn decode_mint(data: &str) -> Result<Amounts> {
    let words = split_words(data)?;
    Ok(Amounts {
        amount0_hex: word_at(&words, 2, 4, "Mint")?,
        amount1_hex: word_at(&words, 3, 4, "Mint")?,
    })
}

/// Burn data layout: `amount, amount0, amount1` (3 words).
pub fn decode_burn(data: &str) -> Result<Amounts> {
    let words = split_words(data)?;
    Ok(Amounts {
        amount0_hex: word_at(&words, 1, 3, "Burn")?,
        amount1_hex: word_at(&words, 2, 3, "Burn")?,
    })
}

/// Collect data layout (Positions-contract variant): `recipient, ?,
/// amount0, amount1` (4 words).
pub fn decode_collect(data: &str) -> Result<Amounts> {
    let words = split_words(data)?;
    Ok(Amounts {
        amount0_hex: word_at(&words, 2, 4, "Collect")?,
        amount1_hex: word_at(&words, 3, 4, "Collect")?,
    })
}

/// Swap data layout: `amount0, amount1, ...` — amounts may be negative.
pub fn decode_swap(data: &str) -> Result<Amounts> {
    let words = split_words(data)?;
    if words.len() < 2 {
        bail!("Swap.data has {} words, expected at least 2", words.len());
    }
    Ok(Amounts {
        amount0_hex: words[0].clone(),
        amount1_hex: words[1].clone(),
    })
}

/// Scales a raw integer amount by `10^-decimals` into a float, the way
/// `convertTransferAmount` does via `big.Float` division.
pub fn scale_amount(raw: &BigInt, decimals: u32) -> f64 {
    let raw_f: f64 = raw.to_string().parse().unwrap_or(f64::NAN);
    raw_f / 10f64.powi(decimals as i32)
}

/// Decodes a single ERC-20 Transfer `data` field (one 32-byte word, the
/// transferred amount) into a raw BigInt.
pub fn decode_transfer_amount(data: &str) -> Result<BigInt> {
    let words = split_words(data)?;
    let w = word_at(&words, 0, 1, "Transfer")?;
    hex_to_signed_bigint(&w)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(n: u64) -> String {
        format!("{n:064x}")
    }

    #[test]
    fn decodes_mint_four_words() {
        let data = format!("0x{}{}{}{}", word(1), word(2), word(100), word(200));
        let amounts = decode_mint(&data).unwrap();
        assert_eq!(amounts.amount0().unwrap(), BigInt::from(100));
        assert_eq!(amounts.amount1().unwrap(), BigInt::from(200));
    }

    #[test]
    fn decodes_burn_three_words() {
        let data = format!("0x{}{}{}", word(5), word(10), word(20));
        let amounts = decode_burn(&data).unwrap();
        assert_eq!(amounts.amount0().unwrap(), BigInt::from(10));
        assert_eq!(amounts.amount1().unwrap(), BigInt::from(20));
    }

    #[test]
    fn decodes_collect_four_words() {
        let data = format!("0x{}{}{}{}", word(1), word(2), word(30), word(40));
        let amounts = decode_collect(&data).unwrap();
        assert_eq!(amounts.amount0().unwrap(), BigInt::from(30));
        assert_eq!(amounts.amount1().unwrap(), BigInt::from(40));
    }

    #[test]
    fn decodes_swap_two_leading_words() {
        let data = format!("0x{}{}", word(7), word(9));
        let amounts = decode_swap(&data).unwrap();
        assert_eq!(amounts.amount0().unwrap(), BigInt::from(7));
        assert_eq!(amounts.amount1().unwrap(), BigInt::from(9));
    }

    #[test]
    fn rejects_wrong_mint_word_count() {
        let data = format!("0x{}{}{}", word(1), word(2), word(3));
        assert!(decode_mint(&data).is_err());
    }

    #[test]
    fn rejects_non_multiple_of_word_length() {
        assert!(split_words("0xabcd").is_err());
    }

    #[test]
    fn scale_amount_divides_by_decimals() {
        let raw = BigInt::from(1_500_000u64);
        assert!((scale_amount(&raw, 6) - 1.5).abs() < 1e-9);
    }

    #[test]
    fn decode_transfer_single_word() {
        let data = format!("0x{}", word(42));
        assert_eq!(decode_transfer_amount(&data).unwrap(), BigInt::from(42));
    }
}
