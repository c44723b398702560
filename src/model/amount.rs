//! Amount type for monetary values.
//!
//! This module provides the `Amount` type which wraps `Decimal` and tolerates the
//! formatting variations found in user input and remote responses: an optional leading
//! currency symbol, thousands separators, and a comma used as the decimal point.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::iter::Sum;
use std::str::FromStr;

/// Represents a monetary amount.
///
/// This type wraps `Decimal` and provides custom serialization/deserialization so that
/// values arriving as `"-50.00"`, `"$1,000.00"` or `"12,50"` all parse to their numeric
/// value. It always displays and serializes as a plain decimal string, which is the form
/// the remote ledger accepts.
///
/// # Examples
///
/// ```
/// # use splitsync::model::Amount;
/// # use std::str::FromStr;
/// let amount = Amount::from_str("-$1,000.00").unwrap();
/// assert_eq!(amount.to_string(), "-1000.00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    /// Creates a new `Amount` from a `Decimal` value.
    pub const fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Returns the underlying `Decimal` value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative()
    }
}

/// An error that can occur when parsing strings into `Amount` values.
pub struct AmountError(rust_decimal::Error);

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Error for AmountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Amount::default());
        }

        // Strip a currency symbol that may appear before or after the leading minus sign.
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(r) => (true, r),
            None => (false, trimmed),
        };
        let rest = rest.trim_start_matches(['$', '€', '£']);

        // A comma that is not a thousands separator is a decimal point ("12,50").
        let normalized = if rest.contains(',') && !rest.contains('.') {
            rest.replacen(',', ".", 1)
        } else {
            rest.replace(',', "")
        };

        let unsigned = Decimal::from_str(&normalized).map_err(AmountError)?;
        let value = if negative { -unsigned } else { unsigned };
        Ok(Amount(value))
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        Amount(iter.map(|a| a.0).sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let amount = Amount::from_str("50.00").unwrap();
        assert_eq!(amount.value(), Decimal::from_str("50.00").unwrap());
    }

    #[test]
    fn test_parse_negative() {
        let amount = Amount::from_str("-50.00").unwrap();
        assert_eq!(amount.value(), Decimal::from_str("-50.00").unwrap());
    }

    #[test]
    fn test_parse_currency_symbol() {
        let amount = Amount::from_str("$50.00").unwrap();
        assert_eq!(amount.value(), Decimal::from_str("50.00").unwrap());
    }

    #[test]
    fn test_parse_negative_currency_symbol() {
        let amount = Amount::from_str("-$50.00").unwrap();
        assert_eq!(amount.value(), Decimal::from_str("-50.00").unwrap());
    }

    #[test]
    fn test_parse_thousands_separators() {
        let amount = Amount::from_str("1,234,567.89").unwrap();
        assert_eq!(amount.value(), Decimal::from_str("1234567.89").unwrap());
    }

    #[test]
    fn test_parse_comma_decimal_point() {
        let amount = Amount::from_str("12,50").unwrap();
        assert_eq!(amount.value(), Decimal::from_str("12.50").unwrap());
    }

    #[test]
    fn test_parse_empty_string() {
        let amount = Amount::from_str("").unwrap();
        assert!(amount.is_zero());
    }

    #[test]
    fn test_parse_whitespace() {
        let amount = Amount::from_str("  50.00  ").unwrap();
        assert_eq!(amount.value(), Decimal::from_str("50.00").unwrap());
    }

    #[test]
    fn test_display_plain() {
        let amount = Amount::from_str("-$1,000.00").unwrap();
        assert_eq!(amount.to_string(), "-1000.00");
    }

    #[test]
    fn test_serialize_as_plain_string() {
        let amount = Amount::from_str("$1,000.00").unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"1000.00\"");
    }

    #[test]
    fn test_deserialize() {
        let amount: Amount = serde_json::from_str("\"-42.10\"").unwrap();
        assert_eq!(amount.value(), Decimal::from_str("-42.10").unwrap());
    }

    #[test]
    fn test_sum() {
        let amounts = ["10.00", "5.50", "-2.25"];
        let total: Amount = amounts
            .iter()
            .map(|s| Amount::from_str(s).unwrap())
            .sum();
        assert_eq!(total.value(), Decimal::from_str("13.25").unwrap());
    }

    #[test]
    fn test_is_negative() {
        assert!(Amount::from_str("-0.01").unwrap().is_negative());
        assert!(!Amount::from_str("0.01").unwrap().is_negative());
    }
}
