use rust_decimal::Decimal;

use crate::domain::{Error, Money};

/// Commission tier derived from a user's current balance.
///
/// The tier is a pure function of the balance at the time of the read and
/// is intentionally non-monotonic: a withdrawal that drops the balance
/// below a threshold drops the tier with it. Callers that want a tier
/// floor must persist their own high-water mark and swap this policy out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    One,
    Two,
    Three,
}

impl Tier {
    /// Inclusive lower bound of tier 2.
    pub fn tier_two_threshold() -> Money {
        Money::new(Decimal::from(20))
    }

    /// Inclusive lower bound of tier 3.
    pub fn tier_three_threshold() -> Money {
        Money::new(Decimal::from(30))
    }

    /// Classifies a balance. Total over non-negative balances; a negative
    /// balance is a caller error.
    pub fn of(balance: Money) -> Result<Tier, Error> {
        if balance.is_negative() {
            return Err(Error::invalid(format!(
                "cannot derive tier from negative balance {}",
                balance
            )));
        }
        if balance >= Self::tier_three_threshold() {
            Ok(Tier::Three)
        } else if balance >= Self::tier_two_threshold() {
            Ok(Tier::Two)
        } else {
            Ok(Tier::One)
        }
    }

    pub fn level(&self) -> u8 {
        match self {
            Tier::One => 1,
            Tier::Two => 2,
            Tier::Three => 3,
        }
    }

    /// Commission rate in percent applied to rewards earned at this tier.
    pub fn commission_rate(&self) -> Decimal {
        match self {
            Tier::One => Decimal::from(50),
            Tier::Two => Decimal::from(60),
            Tier::Three => Decimal::from(70),
        }
    }

    /// Balance required to reach the next tier, `None` at the top.
    pub fn next_threshold(&self) -> Option<Money> {
        match self {
            Tier::One => Some(Self::tier_two_threshold()),
            Tier::Two => Some(Self::tier_three_threshold()),
            Tier::Three => None,
        }
    }
}
