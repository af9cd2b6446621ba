//! Cutting raw ways into pieces: first at tile borders, then at junctions.

pub mod boundary;
pub mod junctions;

use crate::element::{GeometryKind, RawElement};
use crate::road_class::RoadClass;
use crate::types::NetworkKind;

/// Roads and railways get cut at junctions. Paths are kept whole, and anything else isn't part
/// of a network.
pub(crate) fn network_of(element: &RawElement) -> Option<(RoadClass, NetworkKind)> {
    if element.kind != GeometryKind::Line {
        return None;
    }
    RoadClass::from_tags(&element.tags)
}
