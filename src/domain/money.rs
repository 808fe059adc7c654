use std::ops::Neg;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Signed monetary amount, normalized to 4 decimal places.
///
/// Rounding uses banker's rounding (`round_dp`'s default), so amounts
/// arriving with more precision than we store are rounded half-to-even.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Money(Decimal);

impl Money {
    pub const TARGET_DECIMALS: u32 = 4;

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    pub fn new(value: Decimal) -> Self {
        Self(value.round_dp(Self::TARGET_DECIMALS))
    }

    /// Parses a decimal string such as `"2.50"` or `"-0.0001"`.
    /// Returns `None` on anything that is not a plain decimal number.
    pub fn from_decimal_str(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        Decimal::from_str(s).ok().map(Self::new)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self::new(value)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut value = self.0;
        value.rescale(Self::TARGET_DECIMALS);
        write!(f, "{}", value)
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Decimal's visitor accepts both JSON numbers and strings. The
        // trait method must be named explicitly because Decimal also has
        // an inherent `deserialize(bytes)` constructor that shadows it.
        let value = <Decimal as Deserialize>::deserialize(deserializer)?;
        Ok(Money::new(value))
    }
}
