// src/balance.rs
//
// Arbitrary-precision coin amounts. Every balance carries a fixed scale of
// eight fractional digits; arithmetic is exact and amounts never go negative.
//

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::NodeError;

/// Fractional digits carried by every balance.
pub const BALANCE_SCALE: u32 = 8;

fn scale_factor() -> BigUint {
    BigUint::from(10u32).pow(BALANCE_SCALE)
}

/// Non-negative amount counted in 10^-8 units.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Balance(BigUint);

impl Balance {
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// From a raw count of smallest units.
    pub fn from_units<T: Into<BigUint>>(units: T) -> Self {
        Self(units.into())
    }

    /// From a whole-coin count.
    pub fn from_whole(whole: u64) -> Self {
        Self(BigUint::from(whole) * scale_factor())
    }

    pub fn units(&self) -> &BigUint {
        &self.0
    }

    /// Exact subtraction; `None` when the result would go negative.
    pub fn checked_sub(&self, other: &Balance) -> Option<Balance> {
        if self.0 < other.0 {
            None
        } else {
            Some(Balance(&self.0 - &other.0))
        }
    }
}

impl Add for Balance {
    type Output = Balance;
    fn add(self, rhs: Balance) -> Balance {
        Balance(self.0 + rhs.0)
    }
}

impl Add<&Balance> for &Balance {
    type Output = Balance;
    fn add(self, rhs: &Balance) -> Balance {
        Balance(&self.0 + &rhs.0)
    }
}

impl AddAssign<&Balance> for Balance {
    fn add_assign(&mut self, rhs: &Balance) {
        self.0 += &rhs.0;
    }
}

impl Sum for Balance {
    fn sum<I: Iterator<Item = Balance>>(iter: I) -> Balance {
        iter.fold(Balance::zero(), |acc, b| acc + b)
    }
}

/// Canonical decimal form: no leading zeros, fraction trimmed of trailing
/// zeros, omitted entirely when zero. This rendering feeds the wallet
/// checksum, so it must stay stable.
impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = scale_factor();
        let int = &self.0 / &scale;
        let frac = &self.0 % &scale;
        if frac.is_zero() {
            return write!(f, "{int}");
        }
        let frac_digits = format!("{:0>width$}", frac, width = BALANCE_SCALE as usize);
        write!(f, "{int}.{}", frac_digits.trim_end_matches('0'))
    }
}

impl FromStr for Balance {
    type Err = NodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(NodeError::InvalidArgument("empty amount".to_string()));
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(NodeError::InvalidArgument(format!("bad amount: {s}")));
        }
        if frac_part.len() > BALANCE_SCALE as usize {
            return Err(NodeError::InvalidArgument(format!(
                "more than {BALANCE_SCALE} fractional digits: {s}"
            )));
        }
        let mut digits = String::with_capacity(int_part.len() + BALANCE_SCALE as usize);
        digits.push_str(if int_part.is_empty() { "0" } else { int_part });
        digits.push_str(frac_part);
        for _ in frac_part.len()..BALANCE_SCALE as usize {
            digits.push('0');
        }
        let units = BigUint::from_str(&digits)
            .map_err(|e| NodeError::InvalidArgument(e.to_string()))?;
        Ok(Balance(units))
    }
}

impl Serialize for Balance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Balance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
