use anyhow::Result;

use abstutil::wraparound_get;
use geom::{Distance, PolyLine, Polygon, Pt2D};

use super::ordering::{self, Approach};
use crate::config::NetworkConfig;
use crate::lanes::{Endpoint, LaneCollection};
use crate::tile::Tile;
use crate::types::{CollectionID, IntersectionRef};

// Corners closer than this to a boundary point are the same point.
const CORNER_DEDUPE: Distance = Distance::const_meters(0.01);

/// The result of laying out an intersection, not yet applied to the tile.
pub(crate) struct Plan {
    /// Every member, counter-clockwise.
    pub ring: Vec<(CollectionID, Endpoint)>,
    /// Two points per member, where its trimmed outlines end.
    pub boundary: Vec<Pt2D>,
    pub polygon: Polygon,
    /// The members, trimmed back and pointing at the intersection.
    pub updated: Vec<LaneCollection>,
}

/// Orders the members around the center, finds the corners between neighboring approaches,
/// trims every member back past those corners, and traces the polygon. Nothing in the tile
/// changes; fails if some corner can't be found.
pub(crate) fn plan(
    tile: &Tile,
    center: Pt2D,
    members: &[(CollectionID, Endpoint)],
    at: IntersectionRef,
    cfg: &NetworkConfig,
) -> Result<Plan> {
    let groups = ordering::group(tile, members, cfg.driving_side);
    if groups.len() < 2 {
        bail!("only {} approach, so it's a dead end", groups.len());
    }
    let approaches = ordering::approaches(tile, center, groups)?;
    let n = approaches.len();

    // corners[i] sits between approach i and the next one counter-clockwise
    let mut corners: Vec<(Pt2D, f64)> = Vec::new();
    for i in 0..n {
        let j = (i + 1) % n;
        let gap = approaches[i]
            .sort_angle
            .ccw_degrees_to(approaches[j].sort_angle);
        match find_corner(&approaches[i], &approaches[j], gap, center, cfg) {
            Some(pt) => corners.push((pt, gap)),
            None => bail!(
                "no corner between {} and {}",
                tile.get_collection(approaches[i].members[0].0).key,
                tile.get_collection(approaches[j].members[0].0).key
            ),
        }
    }

    let mut ring = Vec::new();
    let mut updated = Vec::new();
    let mut approach_pts: Vec<Vec<Pt2D>> = Vec::new();
    for (i, approach) in approaches.iter().enumerate() {
        let before = wraparound_get(&corners, i as isize - 1).0;
        let after = corners[i].0;
        let trim = [before, after]
            .into_iter()
            .map(|pt| pt.projected_dist(approach.node_pt, approach.angle))
            .fold(cfg.min_trim, Distance::max);

        let mut pts = Vec::new();
        for (id, endpoint) in &approach.members {
            let mut c = tile.get_collection(*id).clone();
            c.set_trim(*endpoint, trim);
            c.set_intersection(*endpoint, Some(at));
            c.rebuild_geometry()?;
            match endpoint {
                Endpoint::Start => {
                    pts.push(c.right.pts.first_pt());
                    pts.push(c.left.pts.first_pt());
                }
                Endpoint::End => {
                    pts.push(c.left.pts.last_pt());
                    pts.push(c.right.pts.last_pt());
                }
            }
            ring.push((*id, *endpoint));
            updated.push(c);
        }
        approach_pts.push(pts);
    }

    let boundary: Vec<Pt2D> = approach_pts.iter().flatten().cloned().collect();

    // Where the curb turns sharply between two approaches, the corner itself belongs on the
    // boundary
    let mut with_corners = Vec::new();
    for (i, approach) in approaches.iter().enumerate() {
        with_corners.extend(approach_pts[i].iter().cloned());
        let (corner, gap) = corners[i];
        let next = wraparound_get(&approaches, i as isize + 1);
        let turn = approach
            .left
            .first_line()
            .angle()
            .abs_diff_degrees(next.right.first_line().angle());
        if gap > cfg.reflex_degrees || turn <= cfg.disambiguation_degrees {
            continue;
        }
        let prev_pt = approach_pts[i][approach_pts[i].len() - 1];
        let next_pt = wraparound_get(&approach_pts, i as isize + 1)[0];
        if !corner.approx_eq(prev_pt, CORNER_DEDUPE) && !corner.approx_eq(next_pt, CORNER_DEDUPE) {
            with_corners.push(corner);
        }
    }

    let polygon = match Polygon::new(with_corners) {
        Ok(poly) if !poly.is_self_intersecting() => poly,
        _ => Polygon::new(boundary.clone())?,
    };

    Ok(Plan {
        ring,
        boundary,
        polygon,
        updated,
    })
}

/// Where the left edge of one approach meets the right edge of the next one counter-clockwise.
fn find_corner(
    a: &Approach,
    b: &Approach,
    gap: f64,
    center: Pt2D,
    cfg: &NetworkConfig,
) -> Option<Pt2D> {
    let pt = if gap > cfg.reflex_degrees {
        // Edges this far apart meet far away or behind the node, so just take whichever edge
        // sticks out further
        farther_start(a, b, center, cfg)
    } else {
        let crossing = a.left.intersection(&b.right).map(|(pt, _)| pt).or_else(|| {
            a.left
                .first_line()
                .infinite()
                .intersection(&b.right.first_line().infinite())
        });
        match crossing {
            Some(pt) => pt,
            // Approaches from different nodes of a merged intersection can run side by side
            None if !a.node_pt.approx_eq(b.node_pt, CORNER_DEDUPE) => {
                farther_start(a, b, center, cfg)
            }
            None => {
                return None;
            }
        }
    };
    if pt.dist_to(center) <= cfg.max_corner_distance {
        Some(pt)
    } else {
        None
    }
}

fn farther_start(a: &Approach, b: &Approach, center: Pt2D, cfg: &NetworkConfig) -> Pt2D {
    let x = point_near_start(&a.left, cfg.min_trim);
    let y = point_near_start(&b.right, cfg.min_trim);
    if x.dist_to(center) >= y.dist_to(center) {
        x
    } else {
        y
    }
}

fn point_near_start(pl: &PolyLine, dist: Distance) -> Pt2D {
    pl.dist_along(dist.min(pl.length()))
        .map(|(pt, _)| pt)
        .unwrap_or_else(|_| pl.first_pt())
}

#[cfg(test)]
mod tests {
    use geom::Angle;

    use super::*;

    fn approach(angle: f64, width: f64) -> Approach {
        let angle = Angle::degrees(angle);
        let origin = Pt2D::new(0.0, 0.0);
        let center_line = PolyLine::must_new(vec![origin, origin.project_away(Distance::meters(100.0), angle)]);
        let half = Distance::meters(width / 2.0);
        Approach {
            members: Vec::new(),
            angle,
            sort_angle: angle,
            node_pt: origin,
            right: center_line.shift_right(half).unwrap(),
            left: center_line.shift_left(half).unwrap(),
        }
    }

    #[test]
    fn right_angle_corner() {
        let cfg = NetworkConfig::default();
        let east = approach(0.0, 6.0);
        let north = approach(90.0, 6.0);
        let corner = find_corner(&east, &north, 90.0, Pt2D::new(0.0, 0.0), &cfg).unwrap();
        assert!(corner.approx_eq(Pt2D::new(3.0, 3.0), Distance::meters(0.01)));
    }

    #[test]
    fn reflex_gap_uses_the_fallback() {
        let cfg = NetworkConfig::default();
        let east = approach(0.0, 6.0);
        let west = approach(180.0, 8.0);
        let corner = find_corner(&east, &west, 180.0, Pt2D::new(0.0, 0.0), &cfg).unwrap();
        // The wider road's edge is further out
        assert!(corner.approx_eq(Pt2D::new(-1.0, 4.0), Distance::meters(0.01)));
    }

    #[test]
    fn parallel_edges_have_no_corner() {
        let cfg = NetworkConfig::default();
        let a = approach(0.0, 6.0);
        let b = approach(0.0, 6.0);
        assert!(find_corner(&a, &b, 0.0, Pt2D::new(0.0, 0.0), &cfg).is_none());
    }
}
