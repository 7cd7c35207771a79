//! Core identifiers shared by every component: [`Strike`], [`Expiry`], [`OptionSide`] and the
//! [`InstrumentSelection`] that drives polling.

use crate::error::DataError;
use chrono::{DateTime, Utc};
use derive_more::{Constructor, Display, From};
use rust_decimal::{Decimal, prelude::FromPrimitive};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smol_str::SmolStr;
use std::{fmt, str::FromStr};

/// Strike price of an option contract.
///
/// Parsed from the option chain map keys (eg/ `"24000"`, `"24000.000000"`) and normalised so
/// that keys differing only in trailing zeros compare equal.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Display)]
#[display("{_0}")]
pub struct Strike(Decimal);

impl Strike {
    pub fn new(value: Decimal) -> Self {
        Self(value.normalize())
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Absolute distance between this strike and a price.
    pub fn distance(&self, price: Decimal) -> Decimal {
        (self.0 - price).abs()
    }
}

impl From<Decimal> for Strike {
    fn from(value: Decimal) -> Self {
        Self::new(value)
    }
}

impl FromStr for Strike {
    type Err = DataError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Decimal::from_str(raw.trim())
            .map(Self::new)
            .map_err(|_| DataError::InvalidStrike(raw.to_string()))
    }
}

impl Serialize for Strike {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Strike {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StrikeVisitor;

        impl serde::de::Visitor<'_> for StrikeVisitor {
            type Value = Strike;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a strike price as a number or numeric string")
            }

            fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Strike::from_str(value).map_err(E::custom)
            }

            fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Strike::new(Decimal::from(value)))
            }

            fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Strike::new(Decimal::from(value)))
            }

            fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Decimal::from_f64(value)
                    .map(Strike::new)
                    .ok_or_else(|| E::custom(format!("invalid strike: {value}")))
            }
        }

        deserializer.deserialize_any(StrikeVisitor)
    }
}

/// Option expiry, expressed as the backend's integer timestamp (epoch seconds).
#[derive(
    Debug,
    Copy,
    Clone,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Display,
    From,
    Deserialize,
    Serialize,
)]
#[serde(transparent)]
pub struct Expiry(pub i64);

impl Expiry {
    /// Expiry as a UTC datetime, if the timestamp is representable.
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.0, 0)
    }
}

/// Option side: call (CE) or put (PE).
#[derive(
    Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize,
)]
pub enum OptionSide {
    #[default]
    #[serde(alias = "CE", alias = "ce")]
    Call,
    #[serde(alias = "PE", alias = "pe")]
    Put,
}

impl OptionSide {
    pub const ALL: [OptionSide; 2] = [OptionSide::Call, OptionSide::Put];

    /// Convert to the exchange shorthand used in the chain payload.
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionSide::Call => "CE",
            OptionSide::Put => "PE",
        }
    }

    pub fn is_call(&self) -> bool {
        matches!(self, OptionSide::Call)
    }
}

impl fmt::Display for OptionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Underlying symbol and expiry currently selected for polling.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Constructor)]
pub struct InstrumentSelection {
    pub symbol: SmolStr,
    pub expiry: Expiry,
}

impl fmt::Display for InstrumentSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.expiry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_strike_from_str() {
        struct TestCase {
            input: &'static str,
            expected: Result<Strike, DataError>,
        }

        let tests = vec![
            TestCase {
                // TC0: integer key
                input: "24000",
                expected: Ok(Strike::new(dec!(24000))),
            },
            TestCase {
                // TC1: key with trailing zeros normalises to the integer strike
                input: "24000.000000",
                expected: Ok(Strike::new(dec!(24000))),
            },
            TestCase {
                // TC2: fractional strike
                input: "102.5",
                expected: Ok(Strike::new(dec!(102.5))),
            },
            TestCase {
                // TC3: invalid key
                input: "ATM",
                expected: Err(DataError::InvalidStrike("ATM".to_string())),
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = Strike::from_str(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_strike_display_is_normalised() {
        let strike = Strike::from_str("24100.000000").unwrap();
        assert_eq!(strike.to_string(), "24100");
    }

    #[test]
    fn test_strike_deserialize_number_and_string() {
        let from_number: Strike = serde_json::from_str("24100").unwrap();
        let from_string: Strike = serde_json::from_str(r#""24100.00""#).unwrap();
        assert_eq!(from_number, from_string);
    }

    #[test]
    fn test_strike_serializes_as_number() {
        let strike = Strike::new(dec!(24100));
        assert_eq!(serde_json::to_string(&strike).unwrap(), "24100.0");
    }

    #[test]
    fn test_expiry_datetime() {
        let expiry = Expiry(1_700_000_000);
        assert_eq!(expiry.datetime().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_option_side_deserialize_aliases() {
        let call: OptionSide = serde_json::from_str(r#""CE""#).unwrap();
        let put: OptionSide = serde_json::from_str(r#""Put""#).unwrap();
        assert_eq!(call, OptionSide::Call);
        assert_eq!(put, OptionSide::Put);
    }
}
