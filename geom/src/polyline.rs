use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{Angle, Distance, Line, Pt2D, EPSILON_DIST};

/// An ordered sequence of at least two points. Adjacent points are never the same.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolyLine {
    pts: Vec<Pt2D>,
    length: Distance,
}

impl PolyLine {
    pub fn new(pts: Vec<Pt2D>) -> Result<PolyLine> {
        if pts.len() < 2 {
            bail!("Need at least two points for a PolyLine");
        }
        if let Some(pair) = pts
            .windows(2)
            .find(|pair| pair[0].dist_to(pair[1]) <= EPSILON_DIST)
        {
            bail!(
                "PolyLine has ~dupe adjacent points {} and {}",
                pair[0],
                pair[1]
            );
        }
        let length = pts.windows(2).map(|pair| pair[0].dist_to(pair[1])).sum();
        Ok(PolyLine { pts, length })
    }

    /// Like `new`, but first drops adjacent points that're too close together.
    pub fn deduping_new(pts: Vec<Pt2D>) -> Result<PolyLine> {
        PolyLine::new(Pt2D::approx_dedupe(pts, EPSILON_DIST))
    }

    /// Equivalent to `PolyLine::new(pts).unwrap()`. Use this to effectively document an
    /// assertion at the call-site.
    pub fn must_new(pts: Vec<Pt2D>) -> PolyLine {
        PolyLine::new(pts).unwrap()
    }

    pub fn points(&self) -> &Vec<Pt2D> {
        &self.pts
    }

    pub fn length(&self) -> Distance {
        self.length
    }

    pub fn lines(&self) -> impl Iterator<Item = Line> + '_ {
        self.pts.windows(2).map(|pair| Line::must_new(pair[0], pair[1]))
    }

    pub fn first_pt(&self) -> Pt2D {
        self.pts[0]
    }

    pub fn last_pt(&self) -> Pt2D {
        *self.pts.last().unwrap()
    }

    pub fn first_line(&self) -> Line {
        Line::must_new(self.pts[0], self.pts[1])
    }

    pub fn last_line(&self) -> Line {
        Line::must_new(self.pts[self.pts.len() - 2], self.pts[self.pts.len() - 1])
    }

    pub fn reversed(&self) -> PolyLine {
        let mut pts = self.pts.clone();
        pts.reverse();
        PolyLine {
            pts,
            length: self.length,
        }
    }

    /// Glues another PolyLine onto the end of this one. The other must begin where this one
    /// ends.
    pub fn extend(self, other: PolyLine) -> Result<PolyLine> {
        if !self.last_pt().approx_eq(other.first_pt(), Distance::meters(0.01)) {
            bail!(
                "Can't extend PolyLine ending at {} with one starting at {}",
                self.last_pt(),
                other.first_pt()
            );
        }
        let mut pts = self.pts;
        pts.pop();
        pts.extend(other.pts);
        PolyLine::deduping_new(pts)
    }

    /// The distance from the start of the line to every point.
    pub fn cumulative_dists(&self) -> Vec<Distance> {
        let mut result = vec![Distance::ZERO];
        let mut so_far = Distance::ZERO;
        for pair in self.pts.windows(2) {
            so_far += pair[0].dist_to(pair[1]);
            result.push(so_far);
        }
        result
    }

    /// Returns the point and the direction of travel `dist_along` the line.
    pub fn dist_along(&self, dist_along: Distance) -> Result<(Pt2D, Angle)> {
        if dist_along < Distance::ZERO {
            bail!("dist_along {} is negative", dist_along);
        }
        if dist_along > self.length + EPSILON_DIST {
            bail!("dist_along {} is longer than {}", dist_along, self.length);
        }
        let mut dist_left = dist_along;
        let num_lines = self.pts.len() - 1;
        for (idx, l) in self.lines().enumerate() {
            let length = l.length();
            if dist_left <= length || idx == num_lines - 1 {
                return Ok((l.dist_along(dist_left.min(length)), l.angle()));
            }
            dist_left -= length;
        }
        unreachable!()
    }

    pub fn middle(&self) -> Pt2D {
        // Can't fail; half the length is always in bounds
        self.dist_along(self.length / 2.0).unwrap().0
    }

    /// Returns the piece of the line between two distances.
    pub fn exact_slice(&self, start: Distance, end: Distance) -> Result<PolyLine> {
        if start < Distance::ZERO || end > self.length + EPSILON_DIST || start >= end {
            bail!(
                "Can't get a slice [{}, {}] of a PolyLine with length {}",
                start,
                end,
                self.length
            );
        }
        let end = end.min(self.length);

        let mut result: Vec<Pt2D> = Vec::new();
        let mut dist_so_far = Distance::ZERO;
        for line in self.lines() {
            let length = line.length();

            // Does this line contain the first point of the slice?
            if result.is_empty() && dist_so_far + length >= start {
                result.push(line.dist_along(start - dist_so_far));
            }

            // Does this line contain the last point of the slice?
            if dist_so_far + length >= end {
                result.push(line.dist_along(end - dist_so_far));
                return PolyLine::deduping_new(result);
            }

            // If we're in the middle, just collect the endpoint.
            if !result.is_empty() {
                result.push(line.pt2());
            }

            dist_so_far += length;
        }

        // Rounding can leave us just short of the end
        result.push(self.last_pt());
        PolyLine::deduping_new(result)
    }

    /// Shifts every point perpendicular to the local direction of travel. The corners are
    /// mitered, so long straight stretches stay exactly `width` away from the original.
    pub fn shift_right(&self, width: Distance) -> Result<PolyLine> {
        if width == Distance::ZERO {
            return Ok(self.clone());
        }
        let last = self.pts.len() - 1;
        let mut result = Vec::with_capacity(self.pts.len());
        for idx in 0..self.pts.len() {
            let (angle, scale) = if idx == 0 {
                (self.pts[0].angle_to(self.pts[1]), 1.0)
            } else if idx == last {
                (self.pts[last - 1].angle_to(self.pts[last]), 1.0)
            } else {
                let incoming = self.pts[idx - 1].angle_to(self.pts[idx]);
                let outgoing = self.pts[idx].angle_to(self.pts[idx + 1]);
                let turn = incoming.shortest_rotation_towards(outgoing);
                let bisector = incoming.rotate_degs(turn / 2.0);
                // Keep hairpins from shooting the miter off to infinity
                let scale = (1.0 / (turn / 2.0).to_radians().cos()).min(2.0);
                (bisector, scale)
            };
            result.push(
                self.pts[idx].project_away(width * scale, angle.rotate_degs(-90.0)),
            );
        }
        PolyLine::deduping_new(result)
    }

    pub fn shift_left(&self, width: Distance) -> Result<PolyLine> {
        self.shift_right(-width)
    }

    /// The first place this line hits another, searching from the start of this one. Returns
    /// the hit and the angle of this line there.
    pub fn intersection(&self, other: &PolyLine) -> Option<(Pt2D, Angle)> {
        for l1 in self.lines() {
            let mut closest: Option<(Pt2D, Distance)> = None;
            for l2 in other.lines() {
                if let Some(pt) = l1.intersection(l2) {
                    let dist = l1.pt1().dist_to(pt);
                    if closest.map(|(_, d)| dist < d).unwrap_or(true) {
                        closest = Some((pt, dist));
                    }
                }
            }
            if let Some((pt, _)) = closest {
                return Some((pt, l1.angle()));
            }
        }
        None
    }

    /// If the point is on the line, how far along is it?
    pub fn dist_along_of_point(&self, pt: Pt2D) -> Option<Distance> {
        let mut dist_so_far = Distance::ZERO;
        for l in self.lines() {
            if l.contains_pt(pt) {
                return Some(dist_so_far + l.pt1().dist_to(pt));
            }
            dist_so_far += l.length();
        }
        None
    }
}

impl fmt::Display for PolyLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "PolyLine::new(vec![")?;
        for pt in &self.pts {
            writeln!(f, "  Pt2D::new({}, {}),", pt.x(), pt.y())?;
        }
        write!(f, "])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l_shape() -> PolyLine {
        PolyLine::must_new(vec![
            Pt2D::new(0.0, 0.0),
            Pt2D::new(10.0, 0.0),
            Pt2D::new(10.0, 10.0),
        ])
    }

    #[test]
    fn slicing() {
        let pl = l_shape();
        assert_eq!(pl.length(), Distance::meters(20.0));
        let slice = pl.exact_slice(Distance::meters(5.0), Distance::meters(15.0)).unwrap();
        assert_eq!(slice.points().len(), 3);
        assert!(slice.first_pt().approx_eq(Pt2D::new(5.0, 0.0), EPSILON_DIST));
        assert!(slice.last_pt().approx_eq(Pt2D::new(10.0, 5.0), EPSILON_DIST));
        assert!(pl.exact_slice(Distance::meters(15.0), Distance::meters(5.0)).is_err());
    }

    #[test]
    fn shifting_keeps_straight_parts_parallel() {
        let pl = l_shape();
        let right = pl.shift_right(Distance::meters(1.0)).unwrap();
        assert!(right.first_pt().approx_eq(Pt2D::new(0.0, -1.0), EPSILON_DIST));
        // The mitered corner sits exactly 1m from both legs
        assert!(right.points()[1].approx_eq(Pt2D::new(11.0, -1.0), Distance::meters(0.01)));
        assert!(right.last_pt().approx_eq(Pt2D::new(11.0, 10.0), EPSILON_DIST));

        let left = pl.shift_left(Distance::meters(1.0)).unwrap();
        assert!(left.first_pt().approx_eq(Pt2D::new(0.0, 1.0), EPSILON_DIST));
    }

    #[test]
    fn dist_along_and_back() {
        let pl = l_shape();
        let (pt, angle) = pl.dist_along(Distance::meters(12.0)).unwrap();
        assert!(pt.approx_eq(Pt2D::new(10.0, 2.0), EPSILON_DIST));
        assert!(angle.approx_eq(Angle::degrees(90.0), 0.01));
        let back = pl.dist_along_of_point(pt).unwrap();
        assert!(back.approx_eq(Distance::meters(12.0), EPSILON_DIST));
        assert!(pl.dist_along(Distance::meters(25.0)).is_err());
    }

    #[test]
    fn extending() {
        let a = PolyLine::must_new(vec![Pt2D::new(0.0, 0.0), Pt2D::new(5.0, 0.0)]);
        let b = PolyLine::must_new(vec![Pt2D::new(5.0, 0.0), Pt2D::new(5.0, 5.0)]);
        let joined = a.clone().extend(b).unwrap();
        assert_eq!(joined.points().len(), 3);
        assert_eq!(joined.length(), Distance::meters(10.0));
        assert!(joined.clone().extend(a).is_err());
    }
}
