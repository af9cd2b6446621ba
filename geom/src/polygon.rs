use std::fmt;

use anyhow::Result;
use geo::{Area, Contains};
use serde::{Deserialize, Serialize};

use crate::{Bounds, Distance, Line, Pt2D};

/// A simple polygon without holes. The ring is stored open; the last point is implicitly
/// connected back to the first.
#[derive(PartialEq, Serialize, Deserialize, Clone, Debug)]
pub struct Polygon {
    points: Vec<Pt2D>,
}

impl Polygon {
    /// Builds a polygon from a ring of points. A closing point equal to the first is dropped, as
    /// are consecutive duplicates.
    pub fn new(pts: Vec<Pt2D>) -> Result<Polygon> {
        let mut pts = Pt2D::approx_dedupe(pts, Distance::meters(0.01));
        if pts.len() > 1 && pts[0].approx_eq(*pts.last().unwrap(), Distance::meters(0.01)) {
            pts.pop();
        }
        if pts.len() < 3 {
            bail!("Polygon needs at least 3 distinct points, got {}", pts.len());
        }
        Ok(Polygon { points: pts })
    }

    pub fn rectangle(bounds: &Bounds) -> Polygon {
        Polygon {
            points: bounds.get_corners(),
        }
    }

    pub fn points(&self) -> &Vec<Pt2D> {
        &self.points
    }

    /// The edges of the ring, including the closing one.
    pub fn edges(&self) -> Vec<(Pt2D, Pt2D)> {
        let n = self.points.len();
        (0..n)
            .map(|idx| (self.points[idx], self.points[(idx + 1) % n]))
            .collect()
    }

    /// Does this polygon contain the point in its interior?
    pub fn contains_pt(&self, pt: Pt2D) -> bool {
        self.to_geo().contains(&geo::Point::from(pt))
    }

    pub fn area(&self) -> f64 {
        self.to_geo().unsigned_area()
    }

    pub fn center(&self) -> Pt2D {
        Pt2D::center(&self.points)
    }

    /// Do any two non-adjacent edges cross?
    pub fn is_self_intersecting(&self) -> bool {
        let edges: Vec<Option<Line>> = self
            .edges()
            .into_iter()
            .map(|(pt1, pt2)| Line::new(pt1, pt2).ok())
            .collect();
        let n = edges.len();
        for i in 0..n {
            for j in (i + 2)..n {
                // The first and last edges share a point
                if i == 0 && j == n - 1 {
                    continue;
                }
                if let (Some(l1), Some(l2)) = (edges[i], edges[j]) {
                    if l1.intersection(l2).is_some() {
                        return true;
                    }
                }
            }
        }
        false
    }

    fn to_geo(&self) -> geo::Polygon<f64> {
        let mut coords: Vec<geo::Coordinate<f64>> =
            self.points.iter().map(|pt| (*pt).into()).collect();
        coords.push(self.points[0].into());
        geo::Polygon::new(geo::LineString::from(coords), Vec::new())
    }
}

impl fmt::Display for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Polygon with {} points", self.points.len())?;
        for pt in &self.points {
            writeln!(f, "  {}", pt)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};
    use rand_xorshift::XorShiftRng;

    use super::*;

    #[test]
    fn square() {
        let square = Polygon::new(vec![
            Pt2D::new(0.0, 0.0),
            Pt2D::new(10.0, 0.0),
            Pt2D::new(10.0, 10.0),
            Pt2D::new(0.0, 10.0),
            Pt2D::new(0.0, 0.0),
        ])
        .unwrap();
        assert_eq!(square.points().len(), 4);
        assert!((square.area() - 100.0).abs() < 1e-9);
        assert!(square.contains_pt(Pt2D::new(5.0, 5.0)));
        assert!(!square.contains_pt(Pt2D::new(15.0, 5.0)));
        assert!(!square.is_self_intersecting());
    }

    #[test]
    fn bowtie() {
        let bowtie = Polygon::new(vec![
            Pt2D::new(0.0, 0.0),
            Pt2D::new(10.0, 10.0),
            Pt2D::new(10.0, 0.0),
            Pt2D::new(0.0, 10.0),
        ])
        .unwrap();
        assert!(bowtie.is_self_intersecting());
    }

    #[test]
    fn random_convex_polygons_are_simple() {
        let mut rng = XorShiftRng::seed_from_u64(42);
        for _ in 0..50 {
            let n = rng.gen_range(3..12);
            let mut angles: Vec<f64> = (0..n).map(|_| rng.gen_range(0.0..360.0)).collect();
            angles.sort_by(|a, b| a.partial_cmp(b).unwrap());
            angles.dedup_by(|a, b| (*a - *b).abs() < 1.0);
            if angles.len() < 3 {
                continue;
            }
            let pts: Vec<Pt2D> = angles
                .into_iter()
                .map(|a: f64| Pt2D::new(50.0 * a.to_radians().cos(), 50.0 * a.to_radians().sin()))
                .collect();
            let poly = Polygon::new(pts).unwrap();
            assert!(!poly.is_self_intersecting());
        }
    }

    #[test]
    fn too_few_points() {
        assert!(Polygon::new(vec![Pt2D::new(0.0, 0.0), Pt2D::new(1.0, 0.0)]).is_err());
    }
}
