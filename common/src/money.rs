//! [`Money`]-related definitions.

use std::{fmt, str::FromStr};

use rust_decimal::{
    prelude::ToPrimitive as _, Decimal, RoundingStrategy,
};

use crate::define_kind;

/// Amount of money in some [`Currency`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Money {
    /// Amount of this [`Money`].
    pub amount: Decimal,

    /// [`Currency`] of this amount.
    pub currency: Currency,
}

impl Money {
    /// Multiplies this [`Money`] by the provided whole factor.
    ///
    /// The result is rounded to 2 decimal places with a standard
    /// (midpoint-away-from-zero) strategy.
    #[must_use]
    pub fn scale(self, factor: u32) -> Self {
        Self {
            amount: round2(self.amount * Decimal::from(factor)),
            currency: self.currency,
        }
    }

    /// Adds another [`Money`] amount of the same [`Currency`].
    ///
    /// [`None`] is returned on a [`Currency`] mismatch.
    #[must_use]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        (self.currency == rhs.currency).then(|| Self {
            amount: round2(self.amount + rhs.amount),
            currency: self.currency,
        })
    }
}

/// Rounds the provided amount to 2 decimal places.
fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { amount, currency } = self;
        if amount.is_integer() {
            write!(f, "{}{currency}", amount.to_i128().expect("integer"))
        } else {
            write!(f, "{amount}{currency}")
        }
    }
}

impl FromStr for Money {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() < 4 {
            return Err("too short");
        }

        let (amount, currency) = s.split_at(s.len() - 3);
        let amount = Decimal::from_str(amount).map_err(|_| "invalid amount")?;
        let currency =
            Currency::from_str(currency).map_err(|_| "invalid currency")?;

        Ok(Self { amount, currency })
    }
}

define_kind! {
    #[doc = "Currency of a [`Money`] amount."]
    enum Currency {
        #[doc = "Mauritian Rupee."]
        Mur = 1,

        #[doc = "US Dollar."]
        Usd = 2,

        #[doc = "Euro."]
        Eur = 3,
    }
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use rust_decimal::Decimal;

    use super::{Currency, Money};

    fn mur(s: &str) -> Money {
        Money {
            amount: Decimal::from_str(s).unwrap(),
            currency: Currency::Mur,
        }
    }

    #[test]
    fn from_str() {
        assert_eq!(Money::from_str("123.45MUR").unwrap(), mur("123.45"));
        assert_eq!(
            Money::from_str("99USD").unwrap(),
            Money {
                amount: Decimal::from(99),
                currency: Currency::Usd,
            },
        );

        assert!(Money::from_str("123.45").is_err());
        assert!(Money::from_str("123.45Mu").is_err());
        assert!(Money::from_str("123.45Rupees").is_err());
    }

    #[test]
    fn to_string() {
        assert_eq!(mur("123.45").to_string(), "123.45MUR");
        assert_eq!(mur("123.00").to_string(), "123MUR");
        assert_eq!(mur("123").to_string(), "123MUR");
    }

    #[test]
    fn scale_rounds_to_cents() {
        assert_eq!(mur("33.335").scale(2), mur("66.67"));
        assert_eq!(mur("100").scale(2), mur("200"));
        assert_eq!(mur("0.01").scale(0), mur("0"));
    }

    #[test]
    fn checked_add_requires_same_currency() {
        assert_eq!(mur("100").checked_add(mur("50.5")), Some(mur("150.5")));
        assert_eq!(
            mur("100").checked_add(Money {
                amount: Decimal::ONE,
                currency: Currency::Eur,
            }),
            None,
        );
    }
}
