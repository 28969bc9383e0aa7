use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// Estimated emission mass in kilograms of CO₂-equivalent, two decimal places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Carbon(Decimal);

impl Carbon {
    pub fn from_decimal(kg: Decimal) -> Self {
        Carbon(kg.round_dp(2))
    }

    pub fn zero() -> Self {
        Carbon(Decimal::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Carbon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} kg CO₂", self.0)
    }
}

impl Add for Carbon {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Carbon(self.0 + rhs.0)
    }
}

impl Sum for Carbon {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Carbon::zero(), |a, b| a + b)
    }
}
