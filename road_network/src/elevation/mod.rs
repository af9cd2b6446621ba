//! Lifts bridges and sinks tunnels: finds the structures, settles the height at every
//! intersection, and ramps each collection between the heights at its ends.

mod classify;
mod heights;
mod reconcile;

use serde::{Deserialize, Serialize};

use geom::{Distance, PolyLine, Polygon, Pt2D};

use crate::osm::NodeID;
use crate::pipeline::StageContext;
use crate::tile::Tile;
use crate::types::{CollectionID, ElevationID};

pub use self::classify::{bridge_base, structure_base, tunnel_base, tunnel_inner_height};
pub use self::heights::{ramp_profile, RampProfile};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum ElevationKind {
    Bridge,
    Tunnel {
        /// Clearance between the road and the roof.
        inner_height: Distance,
        /// The side walls, in the direction of the first collection. Each side sits outside the
        /// road by its own offset.
        left_wall: PolyLine,
        right_wall: PolyLine,
    },
    BridgeSupport {
        bridge: ElevationID,
        position: Pt2D,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ElevationStructure {
    pub id: ElevationID,
    pub kind: ElevationKind,
    pub polygon: Polygon,
    /// Relative to the ground. Negative for tunnels.
    pub base_height: Distance,
    /// Both directions of the road carried, when there are two.
    pub collections: Vec<CollectionID>,
    /// Ends whose junction lies on the structure, where only structures meet.
    pub inner_nodes: Vec<NodeID>,
    /// Ends where the road comes back to the ground.
    pub ramp_nodes: Vec<NodeID>,
    /// Other structures sharing an inner node.
    pub adjacent: Vec<ElevationID>,
}

impl ElevationStructure {
    pub fn is_bridge(&self) -> bool {
        matches!(self.kind, ElevationKind::Bridge)
    }

    pub fn is_tunnel(&self) -> bool {
        matches!(self.kind, ElevationKind::Tunnel { .. })
    }
}

/// Returns true when done.
pub fn step(tile: &mut Tile, ctx: &mut StageContext) -> bool {
    if tile.progress.phase == 0 {
        ctx.timer.start("reconcile border junctions");
        reconcile::reconcile_borders(tile, ctx);
        ctx.timer.stop("reconcile border junctions");
        tile.progress.next_phase();
    }

    if tile.progress.phase == 1 {
        ctx.timer.start("find elevation structures");
        tile.elevations = classify::find_structures(tile, ctx);
        ctx.timer.stop("find elevation structures");
        tile.progress.next_phase();
    }

    if tile.progress.phase == 2 {
        let ids: Vec<_> = tile.live_intersections().map(|i| i.id).collect();
        for id in ids {
            let (height, elevation) = heights::intersection_height(tile, id, ctx.cfg);
            let i = tile.mut_intersection(id);
            i.height = height;
            i.elevation = elevation;
        }
        tile.progress.next_phase();
    }

    if tile.progress.phase == 3 {
        ctx.timer.start_iter(
            "ramp collections",
            tile.collections.len() - tile.progress.cursor,
        );
        while tile.progress.cursor < tile.collections.len() {
            if !ctx.budget.keep_going() {
                ctx.timer.cancel_iter();
                return false;
            }
            ctx.timer.next();
            let id = CollectionID(tile.progress.cursor);
            tile.progress.cursor += 1;
            if tile.get_collection(id).is_committed() {
                heights::apply_heights(tile, id, ctx);
            }
        }
        tile.progress.next_phase();
    }

    debug!(
        "{} has {} elevation structures",
        tile.coord,
        tile.elevations.len()
    );
    true
}
