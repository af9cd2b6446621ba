use std::{cmp, fmt, iter, ops};

use serde::{Deserialize, Serialize};

/// A distance, in meters. Can be negative, which is how heights below ground are expressed.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Distance(f64);

// By construction, Distance is a finite f64.
impl Eq for Distance {}

#[allow(clippy::derive_ord_xor_partial_ord)] // false positive
impl Ord for Distance {
    fn cmp(&self, other: &Distance) -> cmp::Ordering {
        self.partial_cmp(other).unwrap()
    }
}

impl Distance {
    pub const ZERO: Distance = Distance::const_meters(0.0);

    /// Creates a distance in meters.
    pub fn meters(value: f64) -> Distance {
        if !value.is_finite() {
            panic!("Bad Distance {}", value);
        }
        Distance(value)
    }

    // TODO Can't panic inside a const fn, seemingly. Don't pass in anything bad!
    pub const fn const_meters(value: f64) -> Distance {
        Distance(value)
    }

    /// Creates a distance in millimeters, the unit rail gauges are tagged in.
    pub fn millimeters(value: f64) -> Distance {
        Distance::meters(value / 1000.0)
    }

    pub fn abs(self) -> Distance {
        Distance(self.0.abs())
    }

    /// Returns the distance in meters. Prefer to work with type-safe `Distance`s.
    pub fn inner_meters(self) -> f64 {
        self.0
    }

    pub fn max(self, other: Distance) -> Distance {
        if self >= other {
            self
        } else {
            other
        }
    }

    pub fn min(self, other: Distance) -> Distance {
        if self <= other {
            self
        } else {
            other
        }
    }

    /// Calculates a percentage, usually in [0.0, 1.0], of self / other. If the denominator is
    /// zero, returns 0%.
    pub fn safe_percent(self, other: Distance) -> f64 {
        if other == Distance::ZERO {
            return 0.0;
        }
        self / other
    }

    pub fn approx_eq(self, other: Distance, threshold: Distance) -> bool {
        (self - other).abs() <= threshold
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}m", (self.0 * 1000.0).round() / 1000.0)
    }
}

impl ops::Add for Distance {
    type Output = Distance;

    fn add(self, other: Distance) -> Distance {
        Distance::meters(self.0 + other.0)
    }
}

impl ops::AddAssign for Distance {
    fn add_assign(&mut self, other: Distance) {
        *self = *self + other;
    }
}

impl ops::Sub for Distance {
    type Output = Distance;

    fn sub(self, other: Distance) -> Distance {
        Distance::meters(self.0 - other.0)
    }
}

impl ops::SubAssign for Distance {
    fn sub_assign(&mut self, other: Distance) {
        *self = *self - other;
    }
}

impl ops::Neg for Distance {
    type Output = Distance;

    fn neg(self) -> Distance {
        Distance(-self.0)
    }
}

impl ops::Mul<f64> for Distance {
    type Output = Distance;

    fn mul(self, scalar: f64) -> Distance {
        Distance::meters(self.0 * scalar)
    }
}

impl ops::Mul<Distance> for f64 {
    type Output = Distance;

    fn mul(self, other: Distance) -> Distance {
        Distance::meters(self * other.0)
    }
}

impl ops::Div<Distance> for Distance {
    type Output = f64;

    fn div(self, other: Distance) -> f64 {
        if other.0 == 0.0 {
            panic!("Can't divide {} / {}", self, other);
        }
        self.0 / other.0
    }
}

impl ops::Div<f64> for Distance {
    type Output = Distance;

    fn div(self, scalar: f64) -> Distance {
        if scalar == 0.0 {
            panic!("Can't divide {} / {}", self, scalar);
        }
        Distance::meters(self.0 / scalar)
    }
}

impl iter::Sum for Distance {
    fn sum<I>(iter: I) -> Distance
    where
        I: Iterator<Item = Distance>,
    {
        iter.fold(Distance::ZERO, |a, b| a + b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EPSILON_DIST;

    #[test]
    fn arithmetic() {
        let a = Distance::meters(3.0);
        let b = Distance::meters(1.5);
        assert_eq!(a + b, Distance::meters(4.5));
        assert_eq!(a - b, Distance::meters(1.5));
        assert_eq!(a / b, 2.0);
        assert_eq!(-a, Distance::meters(-3.0));
        assert_eq!(vec![a, b, b].into_iter().sum::<Distance>(), Distance::meters(6.0));
        assert_eq!(Distance::ZERO.safe_percent(Distance::ZERO), 0.0);
    }

    #[test]
    fn gauge_in_millimeters() {
        assert!(Distance::millimeters(1435.0).approx_eq(Distance::meters(1.435), EPSILON_DIST));
    }
}
