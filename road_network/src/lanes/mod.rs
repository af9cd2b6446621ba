//! Directional bundles of lanes between two nodes, and how they're built from split segments.

mod assemble;
mod specs;
pub(crate) mod stage;
mod turns;

use anyhow::Result;
use enumset::EnumSet;
use serde::{Deserialize, Serialize};

use geom::{Angle, Distance, PolyLine, Pt2D};

use crate::osm::{NodeID, WayID};
use crate::road_class::RoadClass;
use crate::types::{
    CollectionID, ElevationID, IntersectionRef, LaneCollectionKey, NetworkKind, TileCoord,
};

pub use self::assemble::{assemble_segment, Segment};
pub use self::specs::Characteristics;
pub use self::turns::{parse_turn_lanes, TurnDirection};

// Trimming never leaves a collection shorter than this.
const MIN_REMAINING_LENGTH: Distance = Distance::const_meters(0.1);

/// Which end of a collection touches something.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Endpoint {
    Start,
    End,
}

impl Endpoint {
    pub fn opposite(self) -> Endpoint {
        match self {
            Endpoint::Start => Endpoint::End,
            Endpoint::End => Endpoint::Start,
        }
    }
}

/// Points at one lane of a collection in the same tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LaneRef {
    pub collection: CollectionID,
    pub lane: usize,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lane {
    /// The centerline, in the direction of travel.
    pub pts: PolyLine,
    pub turns: EnumSet<TurnDirection>,
    pub successors: Vec<LaneRef>,
}

/// One side of a collection, with a height offset for every point.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Outline {
    pub pts: PolyLine,
    pub heights: Vec<Distance>,
}

impl Outline {
    pub fn flat(pts: PolyLine) -> Outline {
        let heights = vec![Distance::ZERO; pts.points().len()];
        Outline { pts, heights }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LaneCollection {
    pub id: CollectionID,
    pub key: LaneCollectionKey,
    pub way: WayID,
    /// Every node passed through, in the direction of travel.
    pub nodes: Vec<NodeID>,
    pub characteristics: Characteristics,

    /// The way's geometry in the direction of travel, before trimming and offsetting.
    pub reference: PolyLine,
    /// How far right of the reference the center of this collection sits. Negative is left.
    pub offset: Distance,
    pub start_trim: Distance,
    pub end_trim: Distance,

    /// Ordered left to right, relative to the direction of travel.
    pub lanes: Vec<Lane>,
    pub left: Outline,
    pub right: Outline,

    /// The collection going the opposite way between the same nodes.
    pub other: Option<CollectionID>,
    pub prev: Option<IntersectionRef>,
    pub next: Option<IntersectionRef>,
    pub elevation: Option<ElevationID>,

    pub removed: bool,
    /// Provisional. Either created by a tile that handed the underlying fragment over, or a
    /// local copy of a collection owned by a neighboring tile.
    pub dummy: bool,
    /// For copies of a neighbor's collection, where the original lives.
    pub mirrored_from: Option<(TileCoord, CollectionID)>,
}

impl LaneCollection {
    pub fn kind(&self) -> NetworkKind {
        self.key.kind
    }

    pub fn class(&self) -> RoadClass {
        self.characteristics.class
    }

    pub fn width(&self) -> Distance {
        self.characteristics.lane_width * (self.lanes.len() as f64)
    }

    pub fn start_node(&self) -> NodeID {
        self.key.start
    }

    pub fn end_node(&self) -> NodeID {
        self.key.end
    }

    /// Not removed and not provisional.
    pub fn is_committed(&self) -> bool {
        !self.removed && !self.dummy
    }

    /// Which end touches a node. A collection looping back to the same node answers `Start`.
    pub fn endpoint_at(&self, node: NodeID) -> Option<Endpoint> {
        if self.key.start == node {
            Some(Endpoint::Start)
        } else if self.key.end == node {
            Some(Endpoint::End)
        } else {
            None
        }
    }

    pub fn node_at(&self, endpoint: Endpoint) -> NodeID {
        match endpoint {
            Endpoint::Start => self.key.start,
            Endpoint::End => self.key.end,
        }
    }

    pub fn intersection_at(&self, endpoint: Endpoint) -> Option<IntersectionRef> {
        match endpoint {
            Endpoint::Start => self.prev,
            Endpoint::End => self.next,
        }
    }

    pub fn set_intersection(&mut self, endpoint: Endpoint, i: Option<IntersectionRef>) {
        match endpoint {
            Endpoint::Start => {
                self.prev = i;
            }
            Endpoint::End => {
                self.next = i;
            }
        }
    }

    pub fn trim_at(&self, endpoint: Endpoint) -> Distance {
        match endpoint {
            Endpoint::Start => self.start_trim,
            Endpoint::End => self.end_trim,
        }
    }

    /// The length of the trimmed collection.
    pub fn length(&self) -> Distance {
        (self.reference.length() - self.start_trim - self.end_trim).max(Distance::ZERO)
    }

    /// The most that one end can be trimmed, given the trim already on the other end.
    pub fn max_trim_at(&self, endpoint: Endpoint) -> Distance {
        let other_trim = match endpoint {
            Endpoint::Start => self.end_trim,
            Endpoint::End => self.start_trim,
        };
        (self.reference.length() - other_trim - MIN_REMAINING_LENGTH).max(Distance::ZERO)
    }

    pub fn set_trim(&mut self, endpoint: Endpoint, trim: Distance) {
        let trim = trim.max(Distance::ZERO).min(self.max_trim_at(endpoint));
        match endpoint {
            Endpoint::Start => {
                self.start_trim = trim;
            }
            Endpoint::End => {
                self.end_trim = trim;
            }
        }
    }

    /// The direction pointing away from one end.
    pub fn away_angle(&self, endpoint: Endpoint) -> Angle {
        match endpoint {
            Endpoint::Start => self.reference.first_line().angle(),
            Endpoint::End => self.reference.last_line().angle().opposite(),
        }
    }

    /// The position of the node at one end.
    pub fn node_pt(&self, endpoint: Endpoint) -> Pt2D {
        match endpoint {
            Endpoint::Start => self.reference.first_pt(),
            Endpoint::End => self.reference.last_pt(),
        }
    }

    /// The untrimmed (left, right) outlines.
    pub fn full_outlines(&self) -> Result<(PolyLine, PolyLine)> {
        let half = self.width() / 2.0;
        Ok((
            self.reference.shift_right(self.offset - half)?,
            self.reference.shift_right(self.offset + half)?,
        ))
    }

    /// Regenerates lanes and outlines from the reference, offset, and trims. Heights reset to
    /// zero.
    pub fn rebuild_geometry(&mut self) -> Result<()> {
        let len = self.reference.length();
        let trimmed = if self.start_trim == Distance::ZERO && self.end_trim == Distance::ZERO {
            self.reference.clone()
        } else {
            self.reference
                .exact_slice(self.start_trim, len - self.end_trim)?
        };

        let lane_width = self.characteristics.lane_width;
        let half = self.width() / 2.0;
        for (idx, lane) in self.lanes.iter_mut().enumerate() {
            let shift = self.offset - half + lane_width * (idx as f64 + 0.5);
            lane.pts = trimmed.shift_right(shift)?;
        }
        self.left = Outline::flat(trimmed.shift_right(self.offset - half)?);
        self.right = Outline::flat(trimmed.shift_right(self.offset + half)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use abstutil::Tags;

    use super::*;
    use crate::config::NetworkConfig;

    fn segment(tags: Vec<(&str, &str)>) -> Segment {
        let tags: Tags = tags.into_iter().collect();
        let (class, kind) = RoadClass::from_tags(&tags).unwrap();
        Segment {
            way: WayID(1),
            nodes: vec![NodeID(1), NodeID(2), NodeID(3)],
            pts: vec![
                Pt2D::new(0.0, 0.0),
                Pt2D::new(50.0, 0.0),
                Pt2D::new(100.0, 0.0),
            ],
            tags,
            class,
            kind,
        }
    }

    #[test]
    fn trimming_shortens_every_line() {
        let cfg = NetworkConfig::default();
        let mut collections =
            assemble_segment(&segment(vec![("highway", "residential")]), &cfg).unwrap();
        let mut fwd = collections.remove(0);
        let before = fwd.left.pts.length();

        fwd.set_trim(Endpoint::Start, Distance::meters(10.0));
        fwd.set_trim(Endpoint::End, Distance::meters(5.0));
        fwd.rebuild_geometry().unwrap();
        assert!(fwd.length().approx_eq(Distance::meters(85.0), Distance::meters(0.01)));
        assert!(fwd
            .left
            .pts
            .length()
            .approx_eq(before - Distance::meters(15.0), Distance::meters(0.01)));
        assert!(fwd.lanes[0]
            .pts
            .first_pt()
            .approx_eq(Pt2D::new(10.0, -fwd.width().inner_meters() / 2.0), Distance::meters(0.01)));
        assert_eq!(fwd.left.heights.len(), fwd.left.pts.points().len());
    }

    #[test]
    fn trims_never_consume_the_collection() {
        let cfg = NetworkConfig::default();
        let mut fwd = assemble_segment(&segment(vec![("highway", "residential")]), &cfg)
            .unwrap()
            .remove(0);
        fwd.set_trim(Endpoint::Start, Distance::meters(70.0));
        fwd.set_trim(Endpoint::End, Distance::meters(70.0));
        assert!(fwd.length() >= MIN_REMAINING_LENGTH - Distance::meters(0.001));
        fwd.rebuild_geometry().unwrap();
    }

    #[test]
    fn away_directions() {
        let cfg = NetworkConfig::default();
        let fwd = assemble_segment(&segment(vec![("highway", "residential")]), &cfg)
            .unwrap()
            .remove(0);
        assert!(fwd.away_angle(Endpoint::Start).approx_eq(Angle::degrees(0.0), 0.1));
        assert!(fwd.away_angle(Endpoint::End).approx_eq(Angle::degrees(180.0), 0.1));
        assert_eq!(fwd.endpoint_at(NodeID(3)), Some(Endpoint::End));
        assert_eq!(fwd.endpoint_at(NodeID(2)), None);
    }
}
