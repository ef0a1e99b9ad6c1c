//! Fixed-point money representation shared by prices and volumes.
//!
//! Only addition, subtraction, comparison and price-by-volume
//! multiplication are needed, so a single scaled-integer representation is
//! used uniformly for both sides of the book and for order volumes, rather
//! than mixing floats and ints across call sites.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Number of decimal digits carried after the point. `1 Amount == 1e8` raw
/// units, matching 8-decimal base-currency precision.
pub const SCALE: i128 = 100_000_000;

/// A scaled fixed-point decimal used for prices, volumes and quote totals.
///
/// Internally this is an `i128` holding the value multiplied by [`SCALE`].
/// Addition and subtraction are exact; multiplying two `Amount`s (price by
/// volume) divides the raw product by `SCALE` once so the result stays in
/// the same fixed-point representation instead of doubling the scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(i128);

impl Amount {
    /// The additive identity.
    pub const ZERO: Amount = Amount(0);

    /// Build an `Amount` from a raw scaled integer (already multiplied by
    /// [`SCALE`]). Used when decoding wire values that are already fixed
    /// point.
    pub const fn from_raw(raw: i128) -> Self {
        Amount(raw)
    }

    /// The raw scaled integer backing this amount.
    pub const fn raw(self) -> i128 {
        self.0
    }

    /// Build an `Amount` from a floating point value, as received from a
    /// transport that decodes JSON numbers as `f64`. This is the one place
    /// precision can be lost; it only happens at the transport boundary,
    /// never inside the engine itself.
    pub fn from_f64(value: f64) -> Self {
        Amount((value * SCALE as f64).round() as i128)
    }

    /// Convert back to `f64` for logging or UI display.
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    /// True if this amount is exactly zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Saturating subtraction, clamping the result to [`Amount::ZERO`]
    /// rather than going negative. Used for trade-driven volume decrements
    /// where the reported fill can (due to rounding upstream) slightly
    /// overshoot the level's remaining volume.
    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount((self.0 - other.0).max(0))
    }

    /// Multiply a volume by a price, producing a quote-currency total in
    /// the same fixed-point scale (used for `total_bid` and the quote-side
    /// cumulative cache).
    pub fn mul_scaled(self, other: Amount) -> Amount {
        Amount((self.0 * other.0) / SCALE)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.8}", self.to_f64())
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.0 += rhs.0;
    }
}

impl Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Amount) -> Amount {
        Amount(self.0 - rhs.0)
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        self.0 -= rhs.0;
    }
}

impl Neg for Amount {
    type Output = Amount;
    fn neg(self) -> Amount {
        Amount(-self.0)
    }
}

impl Mul<i64> for Amount {
    type Output = Amount;
    fn mul(self, rhs: i64) -> Amount {
        Amount(self.0 * rhs as i128)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Add::add)
    }
}
