use std::cmp::Ordering;
use std::collections::BTreeSet;

use anyhow::Result;

use geom::{Angle, Distance, PolyLine, Pt2D};

use crate::lanes::{Endpoint, LaneCollection};
use crate::tile::Tile;
use crate::types::{CollectionID, DrivingSide};

// How far along an approach to look when sorting around the center.
const SORT_PROBE: Distance = Distance::const_meters(10.0);

/// The collections arriving from one direction: both directions of a two-way road, or one
/// oneway collection.
pub(crate) struct Approach {
    /// Right to left, looking away from the intersection.
    pub members: Vec<(CollectionID, Endpoint)>,
    /// Pointing away from the intersection.
    pub angle: Angle,
    /// Where the approach lies, seen from the center. The same as `angle` unless the
    /// intersection covers several nodes.
    pub sort_angle: Angle,
    pub node_pt: Pt2D,
    /// The untrimmed outer edges, pointing away from the intersection.
    pub right: PolyLine,
    pub left: PolyLine,
}

/// Pairs opposite directions of the same road. Members within a group are ordered right to
/// left, looking away from the intersection.
pub(crate) fn group(
    tile: &Tile,
    members: &[(CollectionID, Endpoint)],
    side: DrivingSide,
) -> Vec<Vec<(CollectionID, Endpoint)>> {
    let mut groups = Vec::new();
    let mut seen: BTreeSet<CollectionID> = BTreeSet::new();
    for (id, endpoint) in members {
        if !seen.insert(*id) {
            continue;
        }
        let mut group = vec![(*id, *endpoint)];
        if let Some(other) = tile.get_collection(*id).other {
            if let Some(pair) = members.iter().find(|(m, _)| *m == other) {
                if seen.insert(other) {
                    group.push(*pair);
                }
            }
        }
        // Traffic leaving the intersection is on the driving side
        group.sort_by_key(|(_, e)| match (side, e) {
            (DrivingSide::Right, Endpoint::Start) | (DrivingSide::Left, Endpoint::End) => 0,
            _ => 1,
        });
        groups.push(group);
    }
    groups
}

/// The (right, left) edges of one collection, pointing away from the intersection.
pub(crate) fn away_edges(c: &LaneCollection, endpoint: Endpoint) -> Result<(PolyLine, PolyLine)> {
    let (left, right) = c.full_outlines()?;
    Ok(match endpoint {
        Endpoint::Start => (right, left),
        Endpoint::End => (left.reversed(), right.reversed()),
    })
}

/// Sorts the groups counter-clockwise around the center, starting from the first one with
/// incoming traffic. Exact ties put outgoing traffic first, then go by collection ID.
pub(crate) fn approaches(
    tile: &Tile,
    center: Pt2D,
    groups: Vec<Vec<(CollectionID, Endpoint)>>,
) -> Result<Vec<Approach>> {
    let mut result = Vec::new();
    for members in groups {
        let (first, first_end) = members[0];
        let (last, last_end) = members[members.len() - 1];
        let c = tile.get_collection(first);
        let (right, _) = away_edges(c, first_end)?;
        let (_, left) = away_edges(tile.get_collection(last), last_end)?;
        let angle = c.away_angle(first_end);
        let node_pt = c.node_pt(first_end);
        result.push(Approach {
            angle,
            sort_angle: center.angle_to(node_pt.project_away(SORT_PROBE, angle)),
            node_pt,
            members,
            right,
            left,
        });
    }

    let zero = result
        .iter()
        .find(|a| a.members.iter().any(|(_, e)| *e == Endpoint::End))
        .or_else(|| result.first())
        .map(|a| a.sort_angle)
        .unwrap_or(Angle::ZERO);
    result.sort_by(|a, b| {
        zero.ccw_degrees_to(a.sort_angle)
            .partial_cmp(&zero.ccw_degrees_to(b.sort_angle))
            .unwrap_or(Ordering::Equal)
            .then_with(|| leads_inward(a).cmp(&leads_inward(b)))
            .then_with(|| a.members[0].0.cmp(&b.members[0].0))
    });
    Ok(result)
}

fn leads_inward(a: &Approach) -> bool {
    a.members[0].1 == Endpoint::End
}

#[cfg(test)]
mod tests {
    use abstutil::{Tags, Timer};

    use super::*;
    use crate::config::NetworkConfig;
    use crate::element::ElementStore;
    use crate::lanes::{assemble_segment, Segment};
    use crate::osm::{NodeID, WayID};
    use crate::road_class::RoadClass;
    use crate::types::TileCoord;

    fn add(tile: &mut Tile, way: i64, nodes: Vec<(i64, f64, f64)>) -> CollectionID {
        let cfg = NetworkConfig::default();
        let tags: Tags = vec![("highway", "residential"), ("oneway", "yes")]
            .into_iter()
            .collect();
        let (class, kind) = RoadClass::from_tags(&tags).unwrap();
        let segment = Segment {
            way: WayID(way),
            nodes: nodes.iter().map(|(n, _, _)| NodeID(*n)).collect(),
            pts: nodes.iter().map(|(_, x, y)| Pt2D::new(*x, *y)).collect(),
            tags,
            class,
            kind,
        };
        let mut collections = assemble_segment(&segment, &cfg).unwrap();
        assert_eq!(collections.len(), 1);
        tile.insert_collection(collections.remove(0), &mut Timer::throwaway())
            .unwrap()
    }

    #[test]
    fn outgoing_comes_first_on_a_tie() {
        let mut tile = Tile::new(
            TileCoord::new(0, 0),
            Distance::meters(1000.0),
            ElementStore::new(),
        );
        let center = Pt2D::new(500.0, 500.0);
        // Both point due east, away from the node
        let incoming = add(&mut tile, 1, vec![(1, 600.0, 500.0), (100, 500.0, 500.0)]);
        let outgoing = add(&mut tile, 2, vec![(100, 500.0, 500.0), (2, 700.0, 500.0)]);

        let members = vec![(incoming, Endpoint::End), (outgoing, Endpoint::Start)];
        let groups = group(&tile, &members, DrivingSide::Right);
        assert_eq!(groups.len(), 2);
        let sorted = approaches(&tile, center, groups).unwrap();
        assert_eq!(sorted[0].members, vec![(outgoing, Endpoint::Start)]);
        assert_eq!(sorted[1].members, vec![(incoming, Endpoint::End)]);
    }
}
