use serde::{Deserialize, Serialize};

use crate::{Distance, Pt2D};

/// An axis-aligned bounding box.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Default for Bounds {
    fn default() -> Bounds {
        Bounds::new()
    }
}

impl Bounds {
    /// An empty bounding box, ready to be updated.
    pub fn new() -> Bounds {
        Bounds {
            min_x: f64::MAX,
            min_y: f64::MAX,
            max_x: f64::MIN,
            max_y: f64::MIN,
        }
    }

    pub fn from(pts: &[Pt2D]) -> Bounds {
        let mut b = Bounds::new();
        for pt in pts {
            b.update(*pt);
        }
        b
    }

    pub fn update(&mut self, pt: Pt2D) {
        self.min_x = self.min_x.min(pt.x());
        self.max_x = self.max_x.max(pt.x());
        self.min_y = self.min_y.min(pt.y());
        self.max_y = self.max_y.max(pt.y());
    }

    /// Inclusive on every side.
    pub fn contains(&self, pt: Pt2D) -> bool {
        pt.x() >= self.min_x && pt.x() <= self.max_x && pt.y() >= self.min_y && pt.y() <= self.max_y
    }

    /// Inclusive on the min sides, exclusive on the max sides, so that a grid of adjacent
    /// bounds assigns every point to exactly one cell.
    pub fn contains_half_open(&self, pt: Pt2D) -> bool {
        pt.x() >= self.min_x && pt.x() < self.max_x && pt.y() >= self.min_y && pt.y() < self.max_y
    }

    /// Grows (or shrinks, if negative) every side.
    pub fn expanded(&self, by: Distance) -> Bounds {
        let d = by.inner_meters();
        Bounds {
            min_x: self.min_x - d,
            min_y: self.min_y - d,
            max_x: self.max_x + d,
            max_y: self.max_y + d,
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Pt2D {
        Pt2D::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    pub fn get_corners(&self) -> Vec<Pt2D> {
        vec![
            Pt2D::new(self.min_x, self.min_y),
            Pt2D::new(self.max_x, self.min_y),
            Pt2D::new(self.max_x, self.max_y),
            Pt2D::new(self.min_x, self.max_y),
        ]
    }

    /// How far is the point from the nearest side? Negative if it's outside.
    pub fn dist_to_edge(&self, pt: Pt2D) -> Distance {
        let dx = (pt.x() - self.min_x).min(self.max_x - pt.x());
        let dy = (pt.y() - self.min_y).min(self.max_y - pt.y());
        Distance::meters(dx.min(dy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_open_grid() {
        let left = Bounds {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 100.0,
            max_y: 100.0,
        };
        let right = Bounds {
            min_x: 100.0,
            min_y: 0.0,
            max_x: 200.0,
            max_y: 100.0,
        };
        let border = Pt2D::new(100.0, 50.0);
        assert!(left.contains(border));
        assert!(!left.contains_half_open(border));
        assert!(right.contains_half_open(border));
        assert_eq!(left.dist_to_edge(Pt2D::new(90.0, 50.0)), Distance::meters(10.0));
    }
}
