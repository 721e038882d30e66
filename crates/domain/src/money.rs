//! Fixed-point money amounts.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Money amount stored as hundredths of the currency unit.
///
/// Prices in the catalog are whole rupiah with two decimal places, so
/// `Money::from_major(50_000)` is `50000.00`. Serialized as that decimal
/// string; deserializes from a decimal string or a whole-unit integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money {
    /// Amount in hundredths (e.g., 1000 = 10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from hundredths.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from whole currency units, saturating at
    /// the representable range.
    pub fn from_major(units: i64) -> Self {
        Self {
            cents: units.saturating_mul(100),
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in hundredths.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the whole-unit portion, truncating the fraction.
    pub fn major(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the fractional portion (remainder after whole units).
    pub fn minor_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Returns true if the amount has no fractional part.
    pub fn is_whole(&self) -> bool {
        self.cents % 100 == 0
    }

    /// Multiplies by a quantity, saturating on overflow.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents.saturating_mul(i64::from(quantity)),
        }
    }

    /// Multiplies by a quantity, or `None` on overflow.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
    }

    /// Adds two amounts, or `None` on overflow.
    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.cents.checked_add(rhs.cents).map(Money::from_cents)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

/// Renders as a plain decimal with two places, e.g. `115000.00`.
///
/// Payment notification signatures are computed over this exact rendering.
impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-{}.{:02}", self.major().abs(), self.minor_part())
        } else {
            write!(f, "{}.{:02}", self.major(), self.minor_part())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid money amount: {0:?}")]
pub struct ParseMoneyError(pub String);

impl std::str::FromStr for Money {
    type Err = ParseMoneyError;

    /// Parses `"115000"`, `"115000.5"` or `"115000.50"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseMoneyError(s.to_string());
        let trimmed = s.trim();
        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty()
            || fraction.len() > 2
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };
        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(fraction))
            .ok_or_else(invalid)?;
        Ok(Money::from_cents(if negative { -cents } else { cents }))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Units(i64),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Text(text) => text.parse().map_err(serde::de::Error::custom),
            Repr::Units(units) => units
                .checked_mul(100)
                .map(Money::from_cents)
                .ok_or_else(|| serde::de::Error::custom("money amount out of range")),
        }
    }
}

// Operators saturate; use the `checked_*` methods where overflow must be
// reported.
impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents.saturating_add(rhs.cents),
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents.saturating_sub(rhs.cents),
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents = self.cents.saturating_add(rhs.cents);
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_major_and_parts() {
        let money = Money::from_major(50_000);
        assert_eq!(money.cents(), 5_000_000);
        assert_eq!(money.major(), 50_000);
        assert_eq!(money.minor_part(), 0);

        let money = Money::from_cents(1234);
        assert_eq!(money.major(), 12);
        assert_eq!(money.minor_part(), 34);
    }

    #[test]
    fn display_is_plain_two_decimal() {
        assert_eq!(Money::from_major(115_000).to_string(), "115000.00");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-12.34");
    }

    #[test]
    fn parse_and_serde() {
        assert_eq!("115000.00".parse::<Money>(), Ok(Money::from_major(115_000)));
        assert_eq!("12.5".parse::<Money>(), Ok(Money::from_cents(1250)));
        assert_eq!("-0.05".parse::<Money>(), Ok(Money::from_cents(-5)));
        assert!("12.345".parse::<Money>().is_err());
        assert!("1e5".parse::<Money>().is_err());
        assert!(".5".parse::<Money>().is_err());

        let json = serde_json::to_value(Money::from_major(50_000)).unwrap();
        assert_eq!(json, serde_json::json!("50000.00"));
        let back: Money = serde_json::from_value(json).unwrap();
        assert_eq!(back, Money::from_major(50_000));
        let units: Money = serde_json::from_value(serde_json::json!(15_000)).unwrap();
        assert_eq!(units, Money::from_major(15_000));
    }

    #[test]
    fn arithmetic() {
        let a = Money::from_major(100);
        let b = Money::from_major(15);
        assert_eq!(a + b, Money::from_major(115));
        assert_eq!(a - b, Money::from_major(85));
        assert_eq!(b.multiply(3), Money::from_major(45));

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total, Money::from_major(130));
    }

    #[test]
    fn overflow_is_reported_or_saturated() {
        let huge = Money::from_cents(i64::MAX / 2 + 1);
        assert_eq!(huge.checked_multiply(2), None);
        assert_eq!(huge.checked_add(huge), None);
        assert_eq!(
            Money::from_major(10).checked_multiply(3),
            Some(Money::from_major(30))
        );

        assert_eq!(huge.multiply(2), Money::from_cents(i64::MAX));
        assert_eq!(huge + huge, Money::from_cents(i64::MAX));
        assert_eq!(Money::from_major(i64::MAX), Money::from_cents(i64::MAX));
    }

    #[test]
    fn whole_units() {
        assert!(Money::from_major(65_000).is_whole());
        assert!(!"50000.50".parse::<Money>().unwrap().is_whole());
        assert!(Money::from_cents(-300).is_whole());
    }

    #[test]
    fn sign_checks() {
        assert!(Money::from_cents(1).is_positive());
        assert!(Money::zero().is_zero());
        assert!(Money::from_cents(-1).is_negative());
    }
}
