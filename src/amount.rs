use crate::error::EngineError;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Non-negative ledger amount with exact decimal arithmetic.
///
/// Amounts only ever enter the engine as strings; they are never routed
/// through floating point. The ledger's base unit is `10^-PRECISION`, and
/// every amount is at most [`Amount::MAX_UNITS`] base units, so it always
/// converts to units without loss.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(Decimal);

impl Amount {
    pub const PRECISION: u32 = 8;
    /// Largest mantissa a `Decimal` holds at any scale.
    pub const MAX_UNITS: u128 = (1u128 << 96) - 1;

    pub const MAX: Amount = Amount(Decimal::from_parts(
        u32::MAX,
        u32::MAX,
        u32::MAX,
        false,
        Self::PRECISION,
    ));

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// `self + other`, or `None` past [`Amount::MAX`].
    pub fn checked_add(&self, other: &Amount) -> Option<Amount> {
        let units = self.to_units().ok()?.checked_add(other.to_units().ok()?)?;
        Amount::from_units(units).ok()
    }

    /// `self - other`, or `None` when the result would be negative.
    pub fn checked_sub(&self, other: &Amount) -> Option<Amount> {
        if other.0 > self.0 {
            return None;
        }
        self.0.checked_sub(other.0).map(Amount)
    }

    pub fn checked_sum<'a, I>(amounts: I) -> Option<Amount>
    where
        I: IntoIterator<Item = &'a Amount>,
    {
        amounts
            .into_iter()
            .try_fold(Amount::zero(), |total, amount| total.checked_add(amount))
    }

    /// The amount as an integer count of base units.
    pub fn to_units(&self) -> Result<u128, EngineError> {
        let mut scaled = self.0;
        scaled.rescale(Self::PRECISION);
        if scaled.scale() != Self::PRECISION {
            return Err(EngineError::MalformedAmount(self.to_string()));
        }
        u128::try_from(scaled.mantissa()).map_err(|_| EngineError::MalformedAmount(self.to_string()))
    }

    pub fn from_units(units: u128) -> Result<Self, EngineError> {
        if units > Self::MAX_UNITS {
            return Err(EngineError::MalformedAmount(units.to_string()));
        }
        let mantissa = i128::try_from(units)
            .map_err(|_| EngineError::MalformedAmount(units.to_string()))?;
        Decimal::try_from_i128_with_scale(mantissa, Self::PRECISION)
            .map(|value| Amount(value.normalize()))
            .map_err(|_| EngineError::MalformedAmount(units.to_string()))
    }
}

impl FromStr for Amount {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty()
            || !trimmed
                .chars()
                .all(|c| c.is_ascii_digit() || c == '.' || c == '-')
        {
            return Err(EngineError::MalformedAmount(s.to_string()));
        }
        let value = Decimal::from_str(trimmed)
            .map_err(|_| EngineError::MalformedAmount(s.to_string()))?
            .normalize();
        if value < Decimal::ZERO || value.scale() > Self::PRECISION || value > Self::MAX.0 {
            return Err(EngineError::MalformedAmount(s.to_string()));
        }
        Ok(Amount(value))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({self})")
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Amount::from_str(&raw).map_err(serde::de::Error::custom)
    }
}
