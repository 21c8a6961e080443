// Copyright (c) Zefchain Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Conversions between ledger amounts and human-readable decimals.

use linera_sdk::linera_base_types::{AccountOwner, Amount};

use crate::error::LotteryError;

/// Number of fractional digits of an [`Amount`].
pub const DECIMALS: usize = 18;

const ATTOS_PER_TOKEN: u128 = 1_000_000_000_000_000_000;

/// Formats an amount as a decimal string, always keeping one fractional
/// digit: `1.0`, `0.01`, `12.5`.
pub fn to_decimal(amount: Amount) -> String {
    let attos = u128::from(amount);
    let whole = attos / ATTOS_PER_TOKEN;
    let fraction = attos % ATTOS_PER_TOKEN;
    if fraction == 0 {
        return format!("{whole}.0");
    }
    let digits = format!("{fraction:0width$}", width = DECIMALS);
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

/// Parses a decimal string such as `0.01` into an amount.
pub fn from_decimal(input: &str) -> Result<Amount, LotteryError> {
    let invalid = |reason: &str| LotteryError::InvalidAmount(format!("{input:?}: {reason}"));
    let trimmed = input.trim();
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("empty"));
    }
    if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
        return Err(invalid("not a decimal number"));
    }
    if fraction.len() > DECIMALS {
        return Err(invalid("too many decimal places"));
    }

    let whole_attos = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u128>()
            .ok()
            .and_then(|tokens| tokens.checked_mul(ATTOS_PER_TOKEN))
            .ok_or_else(|| invalid("too large"))?
    };
    let fraction_attos = if fraction.is_empty() {
        0
    } else {
        let padded = format!("{fraction:0<width$}", width = DECIMALS);
        padded.parse::<u128>().map_err(|_| invalid("not a decimal number"))?
    };
    whole_attos
        .checked_add(fraction_attos)
        .map(Amount::from_attos)
        .ok_or_else(|| invalid("too large"))
}

/// `0x12...abcd` style abbreviation of an address for display.
pub fn shorten_address(owner: &AccountOwner, chars: usize) -> String {
    let full = owner.to_string();
    if full.len() <= chars * 2 {
        return full;
    }
    format!("{}...{}", &full[..chars], &full[full.len() - chars..])
}

/// Serde adapter writing amounts as decimal strings.
pub mod decimal {
    use linera_sdk::linera_base_types::Amount;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(amount: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_decimal(*amount))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::from_decimal(&text).map_err(D::Error::custom)
    }
}
