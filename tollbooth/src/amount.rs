//! Money parsing and atomic unit conversion.
//!
//! Scheme servers share this module to turn human price input — `"$0.01"`,
//! `"1.50"`, a bare JSON number, or a structured `AssetAmount` — into atomic
//! token units. The atomic path is integer-only; floats never touch the
//! final amount.

use serde_json::Value;

use crate::scheme::AssetAmount;

/// The price input could not be interpreted.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid price: {reason}")]
pub struct InvalidPriceError {
    /// Why the input was rejected.
    pub reason: String,
}

impl InvalidPriceError {
    /// Creates a new invalid-price error.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Interprets a JSON price value against a default asset.
///
/// - A structured object with an `amount` key passes through as
///   [`AssetAmount`] (its own `asset` wins over the default);
/// - a string is parsed as a money amount (`"$0.01"`, `"1.50"`) and scaled
///   by `decimals`;
/// - a bare number is treated the same way.
///
/// # Errors
///
/// Returns [`InvalidPriceError`] for anything else.
pub fn parse_price_value(
    price: &Value,
    default_asset: &str,
    decimals: u8,
) -> Result<AssetAmount, InvalidPriceError> {
    if let Some(obj) = price.as_object() {
        let amount = obj
            .get("amount")
            .ok_or_else(|| InvalidPriceError::new("object price requires an 'amount' field"))?;
        let amount = amount
            .as_str()
            .map_or_else(|| amount.to_string(), String::from);
        let asset = obj
            .get("asset")
            .and_then(Value::as_str)
            .unwrap_or(default_asset)
            .to_owned();
        return Ok(AssetAmount {
            amount,
            asset,
            extra: obj.get("extra").cloned(),
        });
    }

    let decimal = match price {
        Value::String(s) => parse_money_string(s)?,
        Value::Number(n) => n
            .to_string()
            .parse::<DecimalAmount>()
            .map_err(|e| InvalidPriceError::new(e.to_string()))?,
        _ => return Err(InvalidPriceError::new("price must be a string or number")),
    };

    Ok(AssetAmount {
        amount: decimal.to_atomic(decimals)?.to_string(),
        asset: default_asset.to_owned(),
        extra: None,
    })
}

/// Parses a money string (`"$0.01"`, `"1.50"`, `" 0.5 "`) into a decimal
/// amount.
///
/// # Errors
///
/// Returns [`InvalidPriceError`] if the input is not a plain decimal.
pub fn parse_money_string(s: &str) -> Result<DecimalAmount, InvalidPriceError> {
    let cleaned = s.trim().trim_start_matches('$').trim();
    cleaned
        .parse::<DecimalAmount>()
        .map_err(|e| InvalidPriceError::new(format!("invalid money format '{s}': {e}")))
}

/// Converts a decimal amount string to atomic units.
///
/// Example: `"1.50"` with 6 decimals yields `"1500000"`. Fractional digits
/// beyond the asset's precision are rejected rather than silently truncated.
///
/// # Errors
///
/// Returns [`InvalidPriceError`] on malformed input or overflow.
pub fn decimal_to_atomic(amount: &str, decimals: u8) -> Result<String, InvalidPriceError> {
    let decimal = amount
        .parse::<DecimalAmount>()
        .map_err(|e| InvalidPriceError::new(e.to_string()))?;
    Ok(decimal.to_atomic(decimals)?.to_string())
}

/// Formats an atomic amount as a fixed-point decimal string.
///
/// Example: `1_000_000` atomic with 8 decimals and 8 displayed places
/// yields `"0.01000000"`.
#[must_use]
pub fn atomic_to_decimal(atomic: u128, decimals: u8, places: usize) -> String {
    let scale = 10u128.pow(u32::from(decimals));
    let whole = atomic / scale;
    let frac = atomic % scale;
    let frac_str = format!("{frac:0>width$}", width = decimals as usize);
    let frac_display = if places >= frac_str.len() {
        format!("{frac_str:0<places$}")
    } else {
        frac_str[..places].to_owned()
    };
    if places == 0 {
        whole.to_string()
    } else {
        format!("{whole}.{frac_display}")
    }
}

/// A non-negative decimal number split into whole and fractional digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecimalAmount {
    whole: u128,
    frac_digits: String,
}

impl DecimalAmount {
    /// Scales this amount to atomic units at the given precision.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPriceError`] if the amount has more fractional
    /// digits than the asset supports, or on overflow.
    pub fn to_atomic(&self, decimals: u8) -> Result<u128, InvalidPriceError> {
        let places = decimals as usize;
        if self.frac_digits.len() > places {
            return Err(InvalidPriceError::new(format!(
                "amount has more than {decimals} fractional digits"
            )));
        }
        let padded = format!("{:0<places$}", self.frac_digits);
        let frac: u128 = if padded.is_empty() {
            0
        } else {
            padded
                .parse()
                .map_err(|_| InvalidPriceError::new("fractional part out of range"))?
        };
        let scale = 10u128.pow(u32::from(decimals));
        self.whole
            .checked_mul(scale)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(|| InvalidPriceError::new("amount out of range"))
    }
}

impl std::str::FromStr for DecimalAmount {
    type Err = InvalidPriceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (whole_str, frac_str) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole_str.is_empty() && frac_str.is_empty() {
            return Err(InvalidPriceError::new("empty amount"));
        }
        if !whole_str.bytes().all(|b| b.is_ascii_digit())
            || !frac_str.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(InvalidPriceError::new(format!("'{s}' is not a decimal")));
        }
        let whole = if whole_str.is_empty() {
            0
        } else {
            whole_str
                .parse()
                .map_err(|_| InvalidPriceError::new("whole part out of range"))?
        };
        Ok(Self {
            whole,
            frac_digits: frac_str.trim_end_matches('0').to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dollar_string_to_atomic_usdc() {
        let parsed = parse_price_value(&json!("$0.001"), "0xUSDC", 6).unwrap();
        assert_eq!(parsed.amount, "1000");
        assert_eq!(parsed.asset, "0xUSDC");
    }

    #[test]
    fn plain_and_numeric_prices() {
        assert_eq!(
            parse_price_value(&json!("1.50"), "0xUSDC", 6).unwrap().amount,
            "1500000"
        );
        assert_eq!(
            parse_price_value(&json!(0.05), "0xUSDC", 6).unwrap().amount,
            "50000"
        );
        assert_eq!(
            parse_price_value(&json!(2), "0xUSDC", 6).unwrap().amount,
            "2000000"
        );
    }

    #[test]
    fn structured_asset_amount_passes_through() {
        let value = json!({"amount": "123456", "asset": "0xOther"});
        let parsed = parse_price_value(&value, "0xUSDC", 6).unwrap();
        assert_eq!(parsed.amount, "123456");
        assert_eq!(parsed.asset, "0xOther");
    }

    #[test]
    fn invalid_prices_rejected() {
        assert!(parse_price_value(&json!("invalid"), "0xUSDC", 6).is_err());
        assert!(parse_price_value(&json!(true), "0xUSDC", 6).is_err());
        assert!(parse_price_value(&json!("-1.00"), "0xUSDC", 6).is_err());
        assert!(parse_price_value(&json!("0.1234567"), "0xUSDC", 6).is_err());
    }

    #[test]
    fn decimal_to_atomic_exact() {
        assert_eq!(decimal_to_atomic("1.5", 6).unwrap(), "1500000");
        assert_eq!(decimal_to_atomic("0.000001", 6).unwrap(), "1");
        assert_eq!(decimal_to_atomic("3", 6).unwrap(), "3000000");
    }

    #[test]
    fn atomic_to_decimal_fixed_places() {
        assert_eq!(atomic_to_decimal(1_000_000, 8, 8), "0.01000000");
        assert_eq!(atomic_to_decimal(10_000_000, 8, 8), "0.10000000");
        assert_eq!(atomic_to_decimal(1_500_000, 6, 6), "1.500000");
    }
}
