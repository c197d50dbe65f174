//! Exact two-decimal currency amounts.
//!
//! Prices are rendered by the shop as text (`$10.90`, `$ 25.00`). They are
//! parsed into integer cents so line subtotals and cart totals compare
//! exactly instead of through floating point.

use crate::result::{ShopError, ShopResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Currency amount in cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self { cents: 0 };

    /// Create from a cent count
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Create from whole units and cents, e.g. `Money::new(10, 90)` is 10.90
    #[must_use]
    pub const fn new(units: i64, cents: i64) -> Self {
        Self {
            cents: units * 100 + cents,
        }
    }

    /// Cent count
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.cents
    }

    /// Approximate value as a float, for display only
    #[must_use]
    pub fn as_f64(self) -> f64 {
        self.cents as f64 / 100.0
    }

    /// Line subtotal, exact
    #[must_use]
    pub const fn times(self, quantity: u32) -> Self {
        Self {
            cents: self.cents * quantity as i64,
        }
    }

    /// Parse rendered price text.
    ///
    /// Leading currency markers and whitespace are dropped, thousands
    /// separators are ignored and extra fraction digits round half-up.
    pub fn parse(text: &str) -> ShopResult<Self> {
        let parse_err = || ShopError::Parse {
            what: "price".to_string(),
            input: text.to_string(),
        };

        let trimmed = text.trim();
        let (leading_sign, rest) = split_sign(trimmed);
        let rest = rest.trim_start_matches(|c: char| !c.is_ascii_digit() && c != '.' && c != '-');
        let (marker_sign, rest) = split_sign(rest.trim_start());
        if leading_sign && marker_sign {
            return Err(parse_err());
        }
        let negative = leading_sign || marker_sign;
        let numeric: String = rest
            .chars()
            .filter(|c| *c != ',' && !c.is_whitespace())
            .collect();
        if numeric.is_empty() {
            return Err(parse_err());
        }

        let (int_part, frac_part) = match numeric.split_once('.') {
            Some((i, f)) => (i, f),
            None => (numeric.as_str(), ""),
        };
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
            || (int_part.is_empty() && frac_part.is_empty())
        {
            return Err(parse_err());
        }

        let units: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| parse_err())?
        };
        let digits: Vec<i64> = frac_part
            .chars()
            .filter_map(|c| c.to_digit(10))
            .map(i64::from)
            .collect();
        let mut cents = digits.first().copied().unwrap_or(0) * 10 + digits.get(1).copied().unwrap_or(0);
        if digits.get(2).copied().unwrap_or(0) >= 5 {
            cents += 1;
        }

        let total = units
            .checked_mul(100)
            .and_then(|c| c.checked_add(cents))
            .ok_or_else(parse_err)?;
        Ok(Self {
            cents: if negative { -total } else { total },
        })
    }

    /// Format with a space after the currency marker, as the cart footer and
    /// the checkout alert render it (`$ 25.00`)
    #[must_use]
    pub fn spaced(self) -> String {
        format!("$ {}", self.amount())
    }

    /// Bare amount with two decimals (`25.00`)
    #[must_use]
    pub fn amount(self) -> String {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.abs();
        format!("{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// `-` before or after the currency marker
fn split_sign(text: &str) -> (bool, &str) {
    match text.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, text),
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.amount())
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::from_cents(self.cents + rhs.cents)
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::from_cents(self.cents - rhs.cents)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}
