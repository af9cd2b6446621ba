//! Turns every junction node into an intersection: trimmed approaches, a boundary polygon, and
//! who yields to whom.

mod gather;
mod merge;
mod ordering;
mod pass_through;
mod polygon;
mod priority;
mod successors;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use geom::{Distance, Polygon, Pt2D};

use crate::lanes::Endpoint;
use crate::osm::NodeID;
use crate::pipeline::StageContext;
use crate::tile::Tile;
use crate::types::{CollectionID, ElevationID, IntersectionID, IntersectionRef};

pub use self::merge::MAX_MERGE_ITERATIONS;
pub use self::priority::{assign_priorities, ApproachPriority, Priority};

use self::pass_through::PassThrough;
use self::polygon::Plan;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Intersection {
    pub id: IntersectionID,
    /// The node this intersection was first built at. It's also how other tiles refer to it.
    pub node: NodeID,
    /// Every node covered, including those absorbed by merging.
    pub nodes: Vec<NodeID>,
    pub center: Pt2D,
    /// Every member collection counter-clockwise around the center, with the end touching this
    /// intersection.
    pub ring: Vec<(CollectionID, Endpoint)>,
    pub incoming: Vec<CollectionID>,
    pub outgoing: Vec<CollectionID>,
    /// Two points per member, in ring order.
    pub boundary: Vec<Pt2D>,
    pub polygon: Polygon,
    /// One entry per incoming collection.
    pub priorities: Vec<ApproachPriority>,
    pub elevation: Option<ElevationID>,
    /// Resolved by elevation stacking.
    pub height: Distance,
    pub merged_into: Option<IntersectionID>,
}

impl Intersection {
    pub fn is_merged(&self) -> bool {
        self.merged_into.is_some()
    }

    pub fn priority_of(&self, c: CollectionID) -> Option<Priority> {
        self.priorities
            .iter()
            .find(|p| p.collection == c)
            .map(|p| p.priority)
    }
}

/// A node where a road just continues into another tile. There's no polygon and nothing is
/// joined; both tiles keep their side.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Seam {
    pub node: NodeID,
    pub pt: Pt2D,
    pub collections: Vec<CollectionID>,
}

/// Builds intersections at every junction this tile owns, merges clusters of them, and then
/// cleans up and links lanes through them. Returns true when done.
pub fn step(tile: &mut Tile, ctx: &mut StageContext) -> bool {
    if tile.progress.phase == 0 {
        queue_junctions(tile, ctx);
        tile.progress.next_phase();
    }

    if tile.progress.phase == 1 {
        ctx.timer.start_iter(
            "synthesize intersections",
            tile.synthesis_queue.len() - tile.progress.cursor,
        );
        while tile.progress.cursor < tile.synthesis_queue.len() {
            if !ctx.budget.keep_going() {
                ctx.timer.cancel_iter();
                return false;
            }
            ctx.timer.next();
            let (node, pt) = tile.synthesis_queue[tile.progress.cursor];
            tile.progress.cursor += 1;
            synthesize_node(tile, node, pt, ctx);
        }
        tile.progress.next_phase();
    }

    if tile.progress.phase == 2 {
        if ctx.cfg.merge_intersections {
            while tile.progress.cursor < tile.intersections.len() {
                if !ctx.budget.keep_going() {
                    return false;
                }
                let id = IntersectionID(tile.progress.cursor);
                tile.progress.cursor += 1;
                if !tile.get_intersection(id).is_merged() {
                    merge::merge_from(tile, id, ctx);
                }
            }
        }
        tile.progress.next_phase();
    }

    if tile.progress.phase == 3 {
        while tile.progress.cursor < tile.intersections.len() {
            if !ctx.budget.keep_going() {
                return false;
            }
            let id = IntersectionID(tile.progress.cursor);
            tile.progress.cursor += 1;
            if !tile.get_intersection(id).is_merged() {
                finish(tile, id, ctx);
            }
        }
        tile.progress.next_phase();
    }

    debug!(
        "{} has {} intersections and {} seams",
        tile.coord,
        tile.live_intersections().count(),
        tile.seams.len()
    );
    true
}

// Junctions on the tile's own ground, plus those at the edge of the world that nobody else
// will build
fn queue_junctions(tile: &mut Tile, ctx: &StageContext) {
    let mut candidates: Vec<(NodeID, Pt2D)> =
        tile.junctions.iter().map(|(n, pt)| (*n, *pt)).collect();
    for neighbor in ctx.registry.neighbors(tile.coord) {
        candidates.extend(neighbor.junctions.iter().map(|(n, pt)| (*n, *pt)));
    }

    let mut seen = BTreeSet::new();
    let mut queue = Vec::new();
    for (node, pt) in candidates {
        if !seen.insert(node) {
            continue;
        }
        let owner = ctx.registry.coord_containing(pt);
        if tile.owns(pt) || (!ctx.registry.in_world(owner) && tile.junctions.contains_key(&node)) {
            queue.push((node, pt));
        }
    }
    tile.synthesis_queue = queue;
}

fn synthesize_node(tile: &mut Tile, node: NodeID, pt: Pt2D, ctx: &mut StageContext) {
    if tile.intersection_at(node).is_some() {
        return;
    }

    let members = gather::gather(tile, node, ctx);
    let groups = ordering::group(tile, &members, ctx.cfg.driving_side);
    if groups.len() < 2 {
        // Dead ends keep their untrimmed ends
        return;
    }
    if groups.len() == 2 {
        match pass_through::try_pass_through(tile, node, pt, &groups, ctx) {
            PassThrough::Joined | PassThrough::Seam => {
                return;
            }
            PassThrough::NotApplicable => {}
        }
    }

    let at = IntersectionRef {
        tile: tile.coord,
        node,
    };
    match polygon::plan(tile, pt, &members, at, ctx.cfg) {
        Ok(plan) => {
            commit(tile, node, vec![node], pt, plan);
        }
        Err(err) => {
            ctx.timer.warn(format!(
                "{}: abandoning the intersection at {}: {}",
                tile.coord, node, err
            ));
        }
    }
}

fn commit(
    tile: &mut Tile,
    node: NodeID,
    nodes: Vec<NodeID>,
    center: Pt2D,
    plan: Plan,
) -> IntersectionID {
    for c in plan.updated {
        let id = c.id;
        *tile.mut_collection(id) = c;
    }
    tile.insert_intersection(Intersection {
        id: IntersectionID(0),
        node,
        nodes,
        center,
        ring: plan.ring,
        incoming: Vec::new(),
        outgoing: Vec::new(),
        boundary: plan.boundary,
        polygon: plan.polygon,
        priorities: Vec::new(),
        elevation: None,
        height: Distance::ZERO,
        merged_into: None,
    })
}

// Drops collections that merging turned into loops, then works out what flows in and out.
fn finish(tile: &mut Tile, id: IntersectionID, ctx: &mut StageContext) {
    let nodes: BTreeSet<NodeID> = tile.get_intersection(id).nodes.iter().cloned().collect();
    let ring = tile.get_intersection(id).ring.clone();

    // Both ends here means it's both incoming and outgoing
    let loops: BTreeSet<CollectionID> = ring
        .iter()
        .map(|(c, _)| *c)
        .filter(|c| {
            let c = tile.get_collection(*c);
            nodes.contains(&c.start_node()) && nodes.contains(&c.end_node())
        })
        .collect();
    for c in &loops {
        if !tile.get_collection(*c).removed {
            debug!(
                "{} removes {}, which loops through one intersection",
                tile.coord,
                tile.get_collection(*c).key
            );
            tile.remove_collection(*c);
        }
    }

    let ring: Vec<(CollectionID, Endpoint)> = ring
        .into_iter()
        .filter(|(c, _)| !tile.get_collection(*c).removed)
        .collect();
    let incoming: Vec<CollectionID> = ring
        .iter()
        .filter(|(_, e)| *e == Endpoint::End)
        .map(|(c, _)| *c)
        .collect();
    let outgoing: Vec<CollectionID> = ring
        .iter()
        .filter(|(_, e)| *e == Endpoint::Start)
        .map(|(c, _)| *c)
        .collect();
    if incoming.len() + outgoing.len() < 2 {
        ctx.timer.warn(format!(
            "{}: the intersection at {} only has {} collections left",
            tile.coord,
            tile.get_intersection(id).node,
            incoming.len() + outgoing.len()
        ));
    }
    let priorities = assign_priorities(
        incoming
            .iter()
            .map(|c| (*c, tile.get_collection(*c).class().priority_rank()))
            .collect(),
    );

    let i = tile.mut_intersection(id);
    i.ring = ring;
    i.incoming = incoming;
    i.outgoing = outgoing;
    i.priorities = priorities;

    successors::link_lanes(tile, id);
}
