use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

/// An angle, stored in radians. Counter-clockwise from the positive x axis, with y pointing up.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Angle(f64);

impl Angle {
    pub const ZERO: Angle = Angle(0.0);

    pub fn new_rads(rads: f64) -> Angle {
        Angle(rads)
    }

    pub fn degrees(degs: f64) -> Angle {
        Angle(degs.to_radians())
    }

    /// Flips the angle 180 degrees.
    pub fn opposite(self) -> Angle {
        Angle(self.0 + PI)
    }

    pub fn rotate_degs(self, degrees: f64) -> Angle {
        Angle(self.0 + degrees.to_radians())
    }

    /// Returns [0, 2pi)
    pub fn normalized_radians(self) -> f64 {
        self.0.rem_euclid(2.0 * PI)
    }

    /// Returns [0, 360)
    pub fn normalized_degrees(self) -> f64 {
        self.normalized_radians().to_degrees()
    }

    /// The counter-clockwise rotation needed to get from this angle to `other`, in [0, 360).
    pub fn ccw_degrees_to(self, other: Angle) -> f64 {
        let diff = (other.normalized_degrees() - self.normalized_degrees()).rem_euclid(360.0);
        // rem_euclid can return exactly 360.0 due to rounding
        if diff >= 360.0 {
            0.0
        } else {
            diff
        }
    }

    /// The shortest signed rotation from this angle to `other`, in (-180, 180]. Positive is
    /// counter-clockwise.
    pub fn shortest_rotation_towards(self, other: Angle) -> f64 {
        let diff = self.ccw_degrees_to(other);
        if diff > 180.0 {
            diff - 360.0
        } else {
            diff
        }
    }

    /// The unsigned difference between two angles, in [0, 180].
    pub fn abs_diff_degrees(self, other: Angle) -> f64 {
        self.shortest_rotation_towards(other).abs()
    }

    pub fn approx_eq(self, other: Angle, within_degrees: f64) -> bool {
        self.abs_diff_degrees(other) < within_degrees
    }

    /// Unit vector pointing this way.
    pub fn unit_vector(self) -> (f64, f64) {
        let (sin, cos) = self.0.sin_cos();
        (cos, sin)
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Angle({} degrees)", self.normalized_degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotations() {
        let east = Angle::degrees(0.0);
        let north = Angle::degrees(90.0);
        let south = Angle::degrees(-90.0);
        assert!((east.ccw_degrees_to(north) - 90.0).abs() < 1e-9);
        assert!((east.ccw_degrees_to(south) - 270.0).abs() < 1e-9);
        assert!((east.shortest_rotation_towards(south) + 90.0).abs() < 1e-9);
        assert!((north.abs_diff_degrees(south) - 180.0).abs() < 1e-9);
        assert!(east.opposite().approx_eq(Angle::degrees(180.0), 1e-6));
    }
}
