//! Per-session prices.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A price of `price_per_unit` wei for every `pixels_per_unit` output pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Price {
    pub price_per_unit: i64,
    pub pixels_per_unit: i64,
}

impl Price {
    pub const fn new(price_per_unit: i64, pixels_per_unit: i64) -> Self {
        Self {
            price_per_unit,
            pixels_per_unit,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.pixels_per_unit > 0 && self.price_per_unit >= 0
    }

    pub fn is_positive(&self) -> bool {
        self.price_per_unit > 0
    }

    /// Fee in wei for `units` pixels, rounded up.
    ///
    /// An invalid price charges nothing.
    pub fn fee(&self, units: u64) -> i128 {
        if !self.is_valid() {
            return 0;
        }
        let numerator = i128::from(units) * i128::from(self.price_per_unit);
        let denominator = i128::from(self.pixels_per_unit);
        (numerator + denominator - 1) / denominator
    }

    /// Fee for a single billable unit, the solvency threshold.
    pub fn unit_fee(&self) -> i128 {
        if !self.is_valid() {
            return 0;
        }
        i128::from(self.price_per_unit)
    }

    /// Compare two prices by wei per pixel.
    pub fn per_pixel_cmp(&self, other: &Price) -> std::cmp::Ordering {
        let lhs = i128::from(self.price_per_unit) * i128::from(other.pixels_per_unit);
        let rhs = i128::from(other.price_per_unit) * i128::from(self.pixels_per_unit);
        lhs.cmp(&rhs)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} wei / {} pixels",
            self.price_per_unit, self.pixels_per_unit
        )
    }
}
