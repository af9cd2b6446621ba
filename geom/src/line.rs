use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{Angle, Distance, Pt2D, EPSILON_DIST};

/// A line segment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Line(Pt2D, Pt2D);

impl Line {
    /// Creates a line segment between two points, which must not be the same.
    pub fn new(pt1: Pt2D, pt2: Pt2D) -> Result<Line> {
        if pt1.dist_to(pt2) <= EPSILON_DIST {
            bail!("Line from {} to {} too small", pt1, pt2);
        }
        Ok(Line(pt1, pt2))
    }

    /// Equivalent to `Line::new(pt1, pt2).unwrap()`. Use this to effectively document an assertion
    /// at the call-site.
    pub fn must_new(pt1: Pt2D, pt2: Pt2D) -> Line {
        Line::new(pt1, pt2).unwrap()
    }

    pub fn infinite(self) -> InfiniteLine {
        InfiniteLine(self.0, self.1)
    }

    pub fn pt1(self) -> Pt2D {
        self.0
    }

    pub fn pt2(self) -> Pt2D {
        self.1
    }

    pub fn points(self) -> Vec<Pt2D> {
        vec![self.0, self.1]
    }

    pub fn length(self) -> Distance {
        self.0.dist_to(self.1)
    }

    pub fn angle(self) -> Angle {
        self.0.angle_to(self.1)
    }

    pub fn reversed(self) -> Line {
        Line(self.1, self.0)
    }

    /// The point where two line segments cross, if they do. Touching endpoints count.
    pub fn intersection(self, other: Line) -> Option<Pt2D> {
        let hit = self.infinite().intersection(&other.infinite())?;
        if self.contains_pt(hit) && other.contains_pt(hit) {
            Some(hit)
        } else {
            None
        }
    }

    /// Is the point on this segment, within a small tolerance?
    pub fn contains_pt(self, pt: Pt2D) -> bool {
        let len = self.length();
        let along = pt.projected_dist(self.0, self.angle());
        if along < -EPSILON_DIST || along > len + EPSILON_DIST {
            return false;
        }
        self.dist_along(along.max(Distance::ZERO).min(len))
            .approx_eq(pt, Distance::meters(0.01))
    }

    /// Interpolates a point `dist` along the line. Doesn't check bounds.
    pub fn dist_along(self, dist: Distance) -> Pt2D {
        self.percent_along(dist.safe_percent(self.length()))
    }

    pub fn percent_along(self, percent: f64) -> Pt2D {
        Pt2D::new(
            self.0.x() + percent * (self.1.x() - self.0.x()),
            self.0.y() + percent * (self.1.y() - self.0.y()),
        )
    }

    pub fn middle(self) -> Pt2D {
        self.percent_along(0.5)
    }

    /// Shifts the segment perpendicular to its direction. Positive widths shift right.
    pub fn shift_right(self, width: Distance) -> Line {
        let angle = self.angle().rotate_degs(-90.0);
        Line(
            self.0.project_away(width, angle),
            self.1.project_away(width, angle),
        )
    }

    pub fn shift_left(self, width: Distance) -> Line {
        self.shift_right(-width)
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Line::new({}, {})", self.0, self.1)
    }
}

/// An infinite line passing through two points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InfiniteLine(Pt2D, Pt2D);

impl InfiniteLine {
    /// Where two infinite lines cross. None if they're parallel.
    pub fn intersection(&self, other: &InfiniteLine) -> Option<Pt2D> {
        // From http://paulbourke.net/geometry/pointlineplane/
        let (x1, y1) = (self.0.x(), self.0.y());
        let (x2, y2) = (self.1.x(), self.1.y());
        let (x3, y3) = (other.0.x(), other.0.y());
        let (x4, y4) = (other.1.x(), other.1.y());

        let denom = (y4 - y3) * (x2 - x1) - (x4 - x3) * (y2 - y1);
        // Nearly parallel lines intersect at absurd places; treat them as parallel.
        let len1 = ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt();
        let len2 = ((x4 - x3).powi(2) + (y4 - y3).powi(2)).sqrt();
        if denom.abs() <= 1e-9 * len1 * len2 {
            return None;
        }
        let u = ((x4 - x3) * (y1 - y3) - (y4 - y3) * (x1 - x3)) / denom;
        Some(Pt2D::new(x1 + u * (x2 - x1), y1 + u * (y2 - y1)))
    }
}
