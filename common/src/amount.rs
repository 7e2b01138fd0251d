use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const CENTS_PER_UNIT: i64 = 100;

/// A monetary amount stored as integer cents.
///
/// Balances and ledger entries never touch floating point. On the wire an
/// amount is a decimal string with two places (`"12.50"`); incoming JSON may
/// also carry a plain number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type)]
#[sqlx(transparent)]
pub struct Amount(i64);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Invalid amount: {0}")]
    Parse(String),

    #[error("Amount overflow")]
    Overflow,
}

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_cents(cents: i64) -> Self {
        Amount(cents)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(&self, other: Amount) -> Result<Amount, AmountError> {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or(AmountError::Overflow)
    }

    pub fn checked_sub(&self, other: Amount) -> Result<Amount, AmountError> {
        self.0
            .checked_sub(other.0)
            .map(Amount)
            .ok_or(AmountError::Overflow)
    }

    pub fn checked_neg(&self) -> Result<Amount, AmountError> {
        self.0.checked_neg().map(Amount).ok_or(AmountError::Overflow)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };

        let mut parts = digits.split('.');
        let whole = parts.next().unwrap_or_default();
        let fraction = parts.next().unwrap_or_default();

        if parts.next().is_some()
            || (whole.is_empty() && fraction.is_empty())
            || fraction.len() > 2
            || !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit())
        {
            return Err(AmountError::Parse(s.to_string()));
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| AmountError::Overflow)?
        };
        // "5.1" means 5 units and 10 cents
        let fraction: i64 = format!("{:0<2}", fraction)
            .parse()
            .map_err(|_| AmountError::Parse(s.to_string()))?;

        let cents = whole
            .checked_mul(CENTS_PER_UNIT)
            .and_then(|c| c.checked_add(fraction))
            .ok_or(AmountError::Overflow)?;

        Ok(Amount(if negative { -cents } else { cents }))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let abs = self.0.unsigned_abs();
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}{}.{:02}",
            sign,
            abs / CENTS_PER_UNIT as u64,
            abs % CENTS_PER_UNIT as u64
        )
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        match RawAmount::deserialize(d)? {
            RawAmount::Text(text) => text.parse().map_err(serde::de::Error::custom),
            RawAmount::Integer(units) => units
                .checked_mul(CENTS_PER_UNIT)
                .map(Amount)
                .ok_or_else(|| serde::de::Error::custom(AmountError::Overflow)),
            RawAmount::Float(value) if value.is_finite() => value
                .to_string()
                .parse()
                .map_err(serde::de::Error::custom),
            RawAmount::Float(value) => Err(serde::de::Error::custom(AmountError::Parse(
                value.to_string(),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_strings() {
        assert_eq!("0".parse::<Amount>().unwrap().cents(), 0);
        assert_eq!("5".parse::<Amount>().unwrap().cents(), 500);
        assert_eq!("5.1".parse::<Amount>().unwrap().cents(), 510);
        assert_eq!("5.25".parse::<Amount>().unwrap().cents(), 525);
        assert_eq!(".05".parse::<Amount>().unwrap().cents(), 5);
        assert_eq!("-.05".parse::<Amount>().unwrap().cents(), -5);
        assert_eq!("-12.30".parse::<Amount>().unwrap().cents(), -1230);
        assert_eq!(" 7. ".parse::<Amount>().unwrap().cents(), 700);
    }

    #[test]
    fn rejects_malformed_strings() {
        for input in ["", "-", ".", "abc", "1.2.3", "1.234", "12x.00", "1 .5"] {
            assert!(
                matches!(input.parse::<Amount>(), Err(AmountError::Parse(_))),
                "{input:?} should not parse"
            );
        }
        assert_eq!(
            "92233720368547758.08".parse::<Amount>(),
            Err(AmountError::Overflow)
        );
    }

    #[test]
    fn displays_with_two_places() {
        assert_eq!(Amount::from_cents(0).to_string(), "0.00");
        assert_eq!(Amount::from_cents(1205).to_string(), "12.05");
        assert_eq!(Amount::from_cents(-5).to_string(), "-0.05");
        assert_eq!(Amount::from_cents(i64::MIN).to_string(), "-92233720368547758.08");
    }

    #[test]
    fn deserializes_strings_and_numbers() {
        let from_str: Amount = serde_json::from_str("\"19.99\"").unwrap();
        let from_int: Amount = serde_json::from_str("20").unwrap();
        let from_float: Amount = serde_json::from_str("19.5").unwrap();
        assert_eq!(from_str.cents(), 1999);
        assert_eq!(from_int.cents(), 2000);
        assert_eq!(from_float.cents(), 1950);
        assert!(serde_json::from_str::<Amount>("1.005").is_err());
        assert_eq!(serde_json::to_string(&from_float).unwrap(), "\"19.50\"");
    }

    #[test]
    fn checked_arithmetic_reports_overflow() {
        let max = Amount::from_cents(i64::MAX);
        assert_eq!(max.checked_add(Amount::from_cents(1)), Err(AmountError::Overflow));
        assert_eq!(
            Amount::from_cents(i64::MIN).checked_neg(),
            Err(AmountError::Overflow)
        );
        assert_eq!(
            Amount::from_cents(300).checked_sub(Amount::from_cents(450)),
            Ok(Amount::from_cents(-150))
        );
    }
}
