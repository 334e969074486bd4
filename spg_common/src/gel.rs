use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const GEL_CURRENCY_CODE: &str = "GEL";
pub const GEL_CURRENCY_CODE_LOWER: &str = "gel";

//--------------------------------------        Gel         ----------------------------------------------------------
/// An amount of Georgian Lari, stored as an integer number of tetri (1 GEL = 100 tetri).
///
/// All arithmetic happens on integers. Conversion to and from decimal GEL only happens at the wire boundary (the
/// payment gateway and the HTTP DTOs both speak decimal GEL).
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Gel(i64);

op!(binary Gel, Add, add);
op!(binary Gel, Sub, sub);
op!(inplace Gel, SubAssign, sub_assign);
op!(unary Gel, Neg, neg);

impl Mul<i64> for Gel {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Gel {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in tetri: {0}")]
pub struct GelConversionError(String);

impl From<i64> for Gel {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Gel {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Gel {}

impl TryFrom<f64> for Gel {
    type Error = GelConversionError;

    /// Convert a decimal GEL amount (as received on the wire) into tetri, rounding to the nearest tetri.
    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() {
            return Err(GelConversionError(format!("{value} is not a finite amount")));
        }
        let tetri = (value * 100.0).round();
        if tetri.abs() > i64::MAX as f64 {
            return Err(GelConversionError(format!("{value} GEL is too large")));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(tetri as i64))
    }
}

impl Display for Gel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} ₾", self.0 as f64 / 100.0)
    }
}

impl Gel {
    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn from_gel(gel: i64) -> Self {
        Self(gel * 100)
    }

    pub fn from_tetri(tetri: i64) -> Self {
        Self(tetri)
    }

    /// The decimal GEL representation used in gateway payloads and API responses.
    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}
