use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Angle, Distance};

/// This represents a tile's local space, in meters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pt2D {
    x: f64,
    y: f64,
}

impl Pt2D {
    pub fn new(x: f64, y: f64) -> Pt2D {
        if !x.is_finite() || !y.is_finite() {
            panic!("Bad Pt2D {}, {}", x, y);
        }
        Pt2D { x, y }
    }

    pub fn x(self) -> f64 {
        self.x
    }

    pub fn y(self) -> f64 {
        self.y
    }

    pub fn dist_to(self, to: Pt2D) -> Distance {
        Distance::meters(((self.x - to.x).powi(2) + (self.y - to.y).powi(2)).sqrt())
    }

    pub fn approx_eq(self, other: Pt2D, threshold: Distance) -> bool {
        self.dist_to(other) <= threshold
    }

    pub fn angle_to(self, to: Pt2D) -> Angle {
        Angle::new_rads((to.y - self.y).atan2(to.x - self.x))
    }

    pub fn project_away(self, dist: Distance, theta: Angle) -> Pt2D {
        let (cos, sin) = theta.unit_vector();
        let d = dist.inner_meters();
        Pt2D::new(self.x + d * cos, self.y + d * sin)
    }

    pub fn offset(self, dx: f64, dy: f64) -> Pt2D {
        Pt2D::new(self.x + dx, self.y + dy)
    }

    /// Signed distance of this point along the direction `theta`, measured from `origin`.
    pub fn projected_dist(self, origin: Pt2D, theta: Angle) -> Distance {
        let (cos, sin) = theta.unit_vector();
        Distance::meters((self.x - origin.x) * cos + (self.y - origin.y) * sin)
    }

    pub fn center(pts: &[Pt2D]) -> Pt2D {
        if pts.is_empty() {
            panic!("Can't find center of 0 points");
        }
        let mut x = 0.0;
        let mut y = 0.0;
        for pt in pts {
            x += pt.x;
            y += pt.y;
        }
        let len = pts.len() as f64;
        Pt2D::new(x / len, y / len)
    }

    /// Removes consecutive points closer than the threshold.
    pub fn approx_dedupe(pts: Vec<Pt2D>, threshold: Distance) -> Vec<Pt2D> {
        let mut result: Vec<Pt2D> = Vec::new();
        for pt in pts {
            if result
                .last()
                .map(|last| !last.approx_eq(pt, threshold))
                .unwrap_or(true)
            {
                result.push(pt);
            }
        }
        result
    }
}

impl fmt::Display for Pt2D {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Pt2D({0}, {1})", self.x, self.y)
    }
}

impl From<Pt2D> for geo::Coordinate<f64> {
    fn from(pt: Pt2D) -> Self {
        geo::Coordinate { x: pt.x, y: pt.y }
    }
}

impl From<Pt2D> for geo::Point<f64> {
    fn from(pt: Pt2D) -> Self {
        geo::Point::new(pt.x, pt.y)
    }
}
