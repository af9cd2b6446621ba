use crate::lanes::{LaneRef, TurnDirection};
use crate::tile::Tile;
use crate::types::IntersectionID;

/// Rebuilds the successors of every incoming lane. A lane continues into every lane of an
/// outgoing collection on the same network, as long as its turn markings allow the turn.
/// U-turns onto the opposite direction of the same road aren't linked.
pub(crate) fn link_lanes(tile: &mut Tile, id: IntersectionID) {
    let i = tile.get_intersection(id);
    let incoming = i.incoming.clone();
    let outgoing = i.outgoing.clone();

    for src in incoming {
        let from = tile.get_collection(src);
        let arrive = from.reference.last_line().angle();

        let mut per_lane: Vec<Vec<LaneRef>> = vec![Vec::new(); from.lanes.len()];
        for dst in &outgoing {
            let to = tile.get_collection(*dst);
            if *dst == src || Some(*dst) == from.other || to.kind() != from.kind() {
                continue;
            }
            let turn = TurnDirection::between(arrive, to.reference.first_line().angle());
            for (lane, successors) in from.lanes.iter().zip(per_lane.iter_mut()) {
                if turn.allowed_by(lane.turns) {
                    successors.extend((0..to.lanes.len()).map(|idx| LaneRef {
                        collection: *dst,
                        lane: idx,
                    }));
                }
            }
        }

        let from = tile.mut_collection(src);
        for (lane, successors) in from.lanes.iter_mut().zip(per_lane) {
            lane.successors = successors;
        }
    }
}

