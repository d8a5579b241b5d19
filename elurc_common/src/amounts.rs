use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const ELURC_CURRENCY_CODE: &str = "ELURC";
/// Number of decimal places between one whole ELURC token and its smallest unit.
pub const ELURC_DECIMALS: u32 = 9;

const UNITS_PER_ELURC: i64 = 10i64.pow(ELURC_DECIMALS);

//--------------------------------------     ElurcAmount       ---------------------------------------------------------
/// An amount of the ELURC payment token, expressed in its smallest indivisible unit.
///
/// Amounts are signed so that differences (e.g. overpayment vs. underpayment) can be represented with the same type.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct ElurcAmount(i64);

op!(binary ElurcAmount, Add, add);
op!(binary ElurcAmount, Sub, sub);
op!(inplace ElurcAmount, AddAssign, add_assign);
op!(inplace ElurcAmount, SubAssign, sub_assign);
op!(unary ElurcAmount, Neg, neg);

impl Mul<i64> for ElurcAmount {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for ElurcAmount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a token amount: {0}")]
pub struct AmountConversionError(String);

impl From<i64> for ElurcAmount {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl TryFrom<u64> for ElurcAmount {
    type Error = AmountConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        i64::try_from(value)
            .map(Self)
            .map_err(|_| AmountConversionError(format!("{value} is too large to convert to an ElurcAmount")))
    }
}

impl TryFrom<ElurcAmount> for u64 {
    type Error = AmountConversionError;

    fn try_from(value: ElurcAmount) -> Result<Self, Self::Error> {
        u64::try_from(value.0).map_err(|_| AmountConversionError(format!("{} is negative", value.0)))
    }
}

impl Display for ElurcAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.abs() < 10_000 {
            write!(f, "{} units", self.0)
        } else {
            let elurc = self.0 as f64 / UNITS_PER_ELURC as f64;
            write!(f, "{elurc:0.6} {ELURC_CURRENCY_CODE}")
        }
    }
}

impl ElurcAmount {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }

    pub fn from_elurc(elurc: i64) -> Self {
        Self(elurc * UNITS_PER_ELURC)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

//--------------------------------------       EurCents        ---------------------------------------------------------
/// A Euro amount in cents. Only used for display and record keeping; payments are always settled in ELURC.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct EurCents(i64);

op!(binary EurCents, Add, add);
op!(binary EurCents, Sub, sub);

impl From<i64> for EurCents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for EurCents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.abs();
        write!(f, "{sign}€{}.{:02}", cents / 100, cents % 100)
    }
}

impl EurCents {
    pub fn value(&self) -> i64 {
        self.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_amounts() {
        assert_eq!(ElurcAmount::from(9000).to_string(), "9000 units");
        assert_eq!(ElurcAmount::from(-9000).to_string(), "-9000 units");
        assert_eq!(ElurcAmount::from(10_000_000).to_string(), "0.010000 ELURC");
        assert_eq!(ElurcAmount::from_elurc(3).to_string(), "3.000000 ELURC");
        assert_eq!(EurCents::from(1234).to_string(), "€12.34");
        assert_eq!(EurCents::from(-5).to_string(), "-€0.05");
    }

    #[test]
    fn arithmetic() {
        let a = ElurcAmount::from(10_000_000);
        let b = ElurcAmount::from(4_000_000);
        assert_eq!((a - b).value(), 6_000_000);
        assert_eq!((b - a).abs().value(), 6_000_000);
        let total: ElurcAmount = vec![a, b, -b].into_iter().sum();
        assert_eq!(total, a);
        let mut c = a;
        c += b;
        c -= a;
        assert_eq!(c, b);
    }

    #[test]
    fn conversions() {
        assert!(ElurcAmount::try_from(u64::MAX).is_err());
        assert_eq!(ElurcAmount::try_from(42u64).unwrap().value(), 42);
        assert!(u64::try_from(ElurcAmount::from(-1)).is_err());
        assert_eq!(serde_json::to_string(&ElurcAmount::from(5)).unwrap(), "5");
    }
}
