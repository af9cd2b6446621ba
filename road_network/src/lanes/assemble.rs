use anyhow::Result;
use enumset::EnumSet;
use serde::{Deserialize, Serialize};

use abstutil::Tags;
use geom::{Distance, PolyLine, Pt2D};

use super::specs::{get_characteristics, get_lane_counts, get_oneway, Oneway};
use super::turns::{default_turn_lanes, parse_turn_lanes, TurnDirection};
use super::{Lane, LaneCollection, Outline};
use crate::config::NetworkConfig;
use crate::osm::{self, NodeID, WayID};
use crate::road_class::RoadClass;
use crate::types::{CollectionID, DrivingSide, LaneCollectionKey, NetworkKind};

/// A piece of a way between two junctions (or a junction and a dead end), in the way's node
/// order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Segment {
    pub way: WayID,
    pub nodes: Vec<NodeID>,
    pub pts: Vec<Pt2D>,
    pub tags: Tags,
    pub class: RoadClass,
    pub kind: NetworkKind,
}

/// Turns one segment into one or two collections. A two-way road produces the forward
/// collection first. The returned collections have placeholder IDs and no `other` link; the
/// caller assigns both once they're stored.
pub fn assemble_segment(segment: &Segment, cfg: &NetworkConfig) -> Result<Vec<LaneCollection>> {
    let reference = PolyLine::deduping_new(segment.pts.clone())?;
    if reference.length() <= geom::EPSILON_DIST {
        bail!("{} has a zero-length segment", segment.way);
    }

    let oneway = get_oneway(&segment.tags, segment.class);
    let (num_fwd, num_back) = get_lane_counts(&segment.tags, segment.class, oneway);
    let characteristics = get_characteristics(
        &segment.tags,
        segment.class,
        segment.kind,
        num_fwd + num_back,
        cfg,
    );
    let lane_width = characteristics.lane_width;

    // Collections sit on the driving side of the way's centerline, unless there's only one
    // direction, in which case they're centered on it.
    let side = match cfg.driving_side {
        DrivingSide::Right => 1.0,
        DrivingSide::Left => -1.0,
    };

    let mut result = Vec::new();
    match oneway {
        Oneway::No => {
            let fwd_turns = turns_for(
                &segment.tags,
                vec![osm::TURN_LANES_FWD],
                num_fwd,
            );
            result.push(make_collection(
                segment,
                segment.nodes.clone(),
                reference.clone(),
                (lane_width * (num_fwd as f64) / 2.0) * side,
                fwd_turns,
                characteristics.clone(),
            ));

            let back_turns = turns_for(
                &segment.tags,
                vec![osm::TURN_LANES_BACK],
                num_back,
            );
            let mut back_nodes = segment.nodes.clone();
            back_nodes.reverse();
            result.push(make_collection(
                segment,
                back_nodes,
                reference.reversed(),
                (lane_width * (num_back as f64) / 2.0) * side,
                back_turns,
                characteristics,
            ));
        }
        Oneway::Forwards => {
            let turns = turns_for(
                &segment.tags,
                vec![osm::TURN_LANES, osm::TURN_LANES_FWD],
                num_fwd,
            );
            result.push(make_collection(
                segment,
                segment.nodes.clone(),
                reference,
                Distance::ZERO,
                turns,
                characteristics,
            ));
        }
        Oneway::Backwards => {
            let turns = turns_for(
                &segment.tags,
                vec![osm::TURN_LANES, osm::TURN_LANES_BACK],
                num_fwd,
            );
            let mut nodes = segment.nodes.clone();
            nodes.reverse();
            result.push(make_collection(
                segment,
                nodes,
                reference.reversed(),
                Distance::ZERO,
                turns,
                characteristics,
            ));
        }
    }

    for collection in &mut result {
        collection.rebuild_geometry()?;
    }
    Ok(result)
}

fn turns_for(tags: &Tags, keys: Vec<&str>, num_lanes: usize) -> Vec<EnumSet<TurnDirection>> {
    for key in keys {
        if let Some(raw) = tags.get(key) {
            if let Some(turns) = parse_turn_lanes(raw, num_lanes) {
                return turns;
            }
            debug!(
                "{}={} doesn't describe {} lanes, using defaults",
                key, raw, num_lanes
            );
        }
    }
    default_turn_lanes(num_lanes)
}

fn make_collection(
    segment: &Segment,
    nodes: Vec<NodeID>,
    reference: PolyLine,
    offset: Distance,
    turns: Vec<EnumSet<TurnDirection>>,
    characteristics: super::Characteristics,
) -> LaneCollection {
    let key = LaneCollectionKey::new(nodes[0], nodes[nodes.len() - 1], segment.kind);
    let lanes = turns
        .into_iter()
        .map(|turns| Lane {
            pts: reference.clone(),
            turns,
            successors: Vec::new(),
        })
        .collect();
    LaneCollection {
        id: CollectionID(0),
        key,
        way: segment.way,
        nodes,
        characteristics,
        left: Outline::flat(reference.clone()),
        right: Outline::flat(reference.clone()),
        reference,
        offset,
        start_trim: Distance::ZERO,
        end_trim: Distance::ZERO,
        lanes,
        other: None,
        prev: None,
        next: None,
        elevation: None,
        removed: false,
        dummy: false,
        mirrored_from: None,
    }
}

#[cfg(test)]
mod tests {
    use geom::Angle;

    use super::*;

    fn segment(tags: Vec<(&str, &str)>, pts: Vec<Pt2D>) -> Segment {
        let tags: Tags = tags.into_iter().collect();
        let (class, kind) = RoadClass::from_tags(&tags).unwrap();
        Segment {
            way: WayID(7),
            nodes: (0..pts.len()).map(|i| NodeID(i as i64 + 1)).collect(),
            pts,
            tags,
            class,
            kind,
        }
    }

    fn straight() -> Vec<Pt2D> {
        vec![Pt2D::new(0.0, 0.0), Pt2D::new(100.0, 0.0)]
    }

    #[test]
    fn two_way_road() {
        let cfg = NetworkConfig::default();
        let result = assemble_segment(
            &segment(vec![("highway", "primary"), ("lanes", "4")], straight()),
            &cfg,
        )
        .unwrap();
        assert_eq!(result.len(), 2);
        let (fwd, back) = (&result[0], &result[1]);
        assert_eq!(fwd.key.reversed(), back.key);
        assert_eq!(fwd.lanes.len(), 2);
        assert_eq!(back.lanes.len(), 2);

        // The two collections share the centerline as their left edge
        let lw = fwd.characteristics.lane_width.inner_meters();
        assert!(fwd.left.pts.first_pt().approx_eq(Pt2D::new(0.0, 0.0), Distance::meters(0.01)));
        assert!(fwd
            .right
            .pts
            .first_pt()
            .approx_eq(Pt2D::new(0.0, -2.0 * lw), Distance::meters(0.01)));
        assert!(back
            .right
            .pts
            .first_pt()
            .approx_eq(Pt2D::new(100.0, 2.0 * lw), Distance::meters(0.01)));
        assert!(back.away_angle(super::super::Endpoint::Start).approx_eq(Angle::degrees(180.0), 0.1));

        // Lane centers step outwards from the middle
        assert!(fwd.lanes[0].pts.first_pt().y() > fwd.lanes[1].pts.first_pt().y());
    }

    #[test]
    fn left_hand_traffic() {
        let mut cfg = NetworkConfig::default();
        cfg.driving_side = DrivingSide::Left;
        let result = assemble_segment(&segment(vec![("highway", "residential")], straight()), &cfg)
            .unwrap();
        // Forward traffic is north of an eastbound centerline
        assert!(result[0].lanes[0].pts.first_pt().y() > 0.0);
        assert!(result[1].lanes[0].pts.first_pt().y() < 0.0);
    }

    #[test]
    fn oneway_reversed() {
        let cfg = NetworkConfig::default();
        let result = assemble_segment(
            &segment(
                vec![("highway", "residential"), ("oneway", "-1")],
                straight(),
            ),
            &cfg,
        )
        .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].key.start, NodeID(2));
        assert_eq!(result[0].offset, Distance::ZERO);
        assert!(result[0].reference.first_pt().approx_eq(Pt2D::new(100.0, 0.0), Distance::meters(0.01)));
    }

    #[test]
    fn rail_and_turn_lanes() {
        let cfg = NetworkConfig::default();
        let rail = assemble_segment(&segment(vec![("railway", "rail")], straight()), &cfg).unwrap();
        assert_eq!(rail.len(), 1);
        assert_eq!(rail[0].kind(), NetworkKind::Rail);
        assert!(rail[0]
            .width()
            .approx_eq(Distance::meters(2.435), Distance::meters(0.001)));

        let road = assemble_segment(
            &segment(
                vec![
                    ("highway", "secondary"),
                    ("oneway", "yes"),
                    ("lanes", "2"),
                    ("turn:lanes", "left|through;right"),
                ],
                straight(),
            ),
            &cfg,
        )
        .unwrap();
        assert_eq!(road[0].lanes[0].turns, EnumSet::only(TurnDirection::Left));
    }

    #[test]
    fn degenerate_segment() {
        let cfg = NetworkConfig::default();
        let pts = vec![Pt2D::new(5.0, 5.0), Pt2D::new(5.0, 5.0)];
        assert!(assemble_segment(&segment(vec![("highway", "residential")], pts), &cfg).is_err());
    }
}
