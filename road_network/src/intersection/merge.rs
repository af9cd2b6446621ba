use std::collections::BTreeSet;

use anyhow::Result;

use geom::{Distance, Pt2D};

use super::{polygon, Intersection};
use crate::config::NetworkConfig;
use crate::lanes::Endpoint;
use crate::osm::NodeID;
use crate::pipeline::StageContext;
use crate::tile::Tile;
use crate::types::{CollectionID, IntersectionID, IntersectionRef, NetworkKind};

/// Clusters can chain indefinitely, so stop absorbing neighbors after this many rounds.
pub const MAX_MERGE_ITERATIONS: usize = 20;

/// Repeatedly absorbs nearby intersections connected to this one by a short road.
pub(crate) fn merge_from(tile: &mut Tile, root: IntersectionID, ctx: &mut StageContext) {
    let mut rejected: BTreeSet<IntersectionID> = BTreeSet::new();
    let mut iterations = 0;
    while let Some(other) = find_candidate(tile, root, &rejected, ctx.cfg) {
        if iterations == MAX_MERGE_ITERATIONS {
            ctx.timer.warn(format!(
                "{}: stopped merging into the intersection at {} after {} rounds",
                tile.coord,
                tile.get_intersection(root).node,
                MAX_MERGE_ITERATIONS
            ));
            return;
        }
        iterations += 1;

        if let Err(err) = absorb(tile, root, other, ctx.cfg) {
            debug!(
                "{}: not merging {} into {}: {}",
                tile.coord,
                tile.get_intersection(other).node,
                tile.get_intersection(root).node,
                err
            );
            rejected.insert(other);
        }
    }
}

fn find_candidate(
    tile: &Tile,
    root: IntersectionID,
    rejected: &BTreeSet<IntersectionID>,
    cfg: &NetworkConfig,
) -> Option<IntersectionID> {
    let i = tile.get_intersection(root);
    if !roads_only(tile, i) {
        return None;
    }
    let radius = merge_radius(tile, i, cfg);

    for (id, endpoint) in &i.ring {
        let c = tile.get_collection(*id);
        if !c.is_committed() || c.reference.length() >= cfg.merge_max_connector_length {
            continue;
        }
        let j = match tile.intersection_at(c.node_at(endpoint.opposite())) {
            Some(j) => j,
            None => continue,
        };
        if j.id == root || rejected.contains(&j.id) || !roads_only(tile, j) {
            continue;
        }
        if i.center.dist_to(j.center) < radius + merge_radius(tile, j, cfg) {
            return Some(j.id);
        }
    }
    None
}

fn roads_only(tile: &Tile, i: &Intersection) -> bool {
    i.ring
        .iter()
        .all(|(c, _)| tile.get_collection(*c).kind() == NetworkKind::Road)
}

// How far the intersection reaches, inflated for its most important road
fn merge_radius(tile: &Tile, i: &Intersection, cfg: &NetworkConfig) -> Distance {
    let reach = i
        .boundary
        .iter()
        .map(|pt| pt.dist_to(i.center))
        .max()
        .unwrap_or(Distance::ZERO);
    let multiplier = i
        .ring
        .iter()
        .map(|(c, _)| tile.get_collection(*c).class())
        .max_by_key(|class| class.priority_rank())
        .map(|class| cfg.merge_radius_multiplier(class))
        .unwrap_or(1.0);
    reach * multiplier
}

// Lays out the combined intersection first, so nothing changes if that fails.
fn absorb(
    tile: &mut Tile,
    root: IntersectionID,
    other: IntersectionID,
    cfg: &NetworkConfig,
) -> Result<()> {
    let i = tile.get_intersection(root);
    let j = tile.get_intersection(other);

    let mut nodes = i.nodes.clone();
    for n in &j.nodes {
        if !nodes.contains(n) {
            nodes.push(*n);
        }
    }
    let covered: BTreeSet<NodeID> = nodes.iter().cloned().collect();

    let mut seen: BTreeSet<CollectionID> = BTreeSet::new();
    let mut inner = Vec::new();
    let mut members = Vec::new();
    for (id, _) in i.ring.iter().chain(j.ring.iter()) {
        if !seen.insert(*id) {
            continue;
        }
        let c = tile.get_collection(*id);
        if c.removed {
            continue;
        }
        let start_inside = covered.contains(&c.start_node());
        if start_inside && covered.contains(&c.end_node()) {
            if c.dummy {
                bail!("{} is owned by another tile", c.key);
            }
            inner.push(*id);
        } else if start_inside {
            members.push((*id, Endpoint::Start));
        } else {
            members.push((*id, Endpoint::End));
        }
    }

    let center = Pt2D::center(&[i.center, j.center]);
    let at = IntersectionRef {
        tile: tile.coord,
        node: i.node,
    };
    let absorbed_nodes = j.nodes.clone();
    let plan = polygon::plan(tile, center, &members, at, cfg)?;

    for id in inner {
        debug!(
            "{} removes {}, now inside a merged intersection",
            tile.coord,
            tile.get_collection(id).key
        );
        tile.remove_collection(id);
    }
    for c in plan.updated {
        let id = c.id;
        *tile.mut_collection(id) = c;
    }

    let i = tile.mut_intersection(root);
    i.nodes = nodes;
    i.center = center;
    i.ring = plan.ring;
    i.boundary = plan.boundary;
    i.polygon = plan.polygon;
    tile.mut_intersection(other).merged_into = Some(root);
    for n in absorbed_nodes {
        tile.index_intersection_node(n, root);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use abstutil::{Tags, Timer};

    use super::*;
    use crate::element::ElementStore;
    use crate::intersection;
    use crate::lanes::{assemble_segment, Segment};
    use crate::osm::WayID;
    use crate::pipeline::TimeBudget;
    use crate::registry::{Outbox, TileRegistry};
    use crate::road_class::RoadClass;
    use crate::types::TileCoord;

    fn add(tile: &mut Tile, way: i64, nodes: Vec<(i64, f64, f64)>) {
        let cfg = NetworkConfig::default();
        let tags: Tags = vec![("highway", "residential")].into_iter().collect();
        let (class, kind) = RoadClass::from_tags(&tags).unwrap();
        let segment = Segment {
            way: WayID(way),
            nodes: nodes.iter().map(|(n, _, _)| NodeID(*n)).collect(),
            pts: nodes.iter().map(|(_, x, y)| Pt2D::new(*x, *y)).collect(),
            tags,
            class,
            kind,
        };
        let mut timer = Timer::throwaway();
        let ids: Vec<CollectionID> = assemble_segment(&segment, &cfg)
            .unwrap()
            .into_iter()
            .filter_map(|c| tile.insert_collection(c, &mut timer))
            .collect();
        tile.link_pair(ids[0], ids[1]);
    }

    // A main road running east, crossed by side streets every `spacing` meters
    fn ladder(crossings: usize, spacing: f64) -> Tile {
        let mut tile = Tile::new(
            TileCoord::new(0, 0),
            Distance::meters(1000.0),
            ElementStore::new(),
        );
        let mut way = 1;
        let y = 500.0;
        let x0 = 300.0;
        add(&mut tile, way, vec![(1, x0 - 100.0, y), (100, x0, y)]);
        for idx in 0..crossings {
            let node = 100 + idx as i64;
            let x = x0 + spacing * (idx as f64);
            way += 1;
            add(&mut tile, way, vec![(node, x, y), (node + 1, x + spacing, y)]);
            way += 1;
            add(&mut tile, way, vec![(1000 + node, x, y + 100.0), (node, x, y)]);
            way += 1;
            add(&mut tile, way, vec![(node, x, y), (2000 + node, x, y - 100.0)]);
            tile.junctions.insert(NodeID(node), Pt2D::new(x, y));
        }
        tile
    }

    fn run(tile: &mut Tile, cfg: &NetworkConfig) -> Vec<String> {
        let registry = TileRegistry::new(cfg.tile_size);
        let mut timer = Timer::throwaway();
        let mut budget = TimeBudget::unlimited();
        let mut outbox = Outbox::default();
        let mut ctx = StageContext {
            cfg,
            registry: &registry,
            budget: &mut budget,
            timer: &mut timer,
            outbox: &mut outbox,
        };
        assert!(intersection::step(tile, &mut ctx));
        timer.take_warnings()
    }

    #[test]
    fn close_pair_becomes_one() {
        let cfg = NetworkConfig::default();
        let mut tile = ladder(2, 6.0);
        run(&mut tile, &cfg);

        assert_eq!(tile.live_intersections().count(), 1);
        let i = tile.intersection_at(NodeID(101)).unwrap();
        assert_eq!(i.node, NodeID(100));
        assert_eq!(i.nodes, vec![NodeID(100), NodeID(101)]);
        // The main road on both sides, plus two side streets on each node
        assert_eq!(i.ring.len(), 12);
        assert_eq!(i.boundary.len(), 24);
        assert_eq!(i.incoming.len(), 6);

        let connector = tile
            .all_collections()
            .iter()
            .filter(|c| c.key.touches(NodeID(100)) && c.key.touches(NodeID(101)))
            .collect::<Vec<_>>();
        assert_eq!(connector.len(), 2);
        assert!(connector.iter().all(|c| c.removed));
        for (c, _) in &i.ring {
            assert!(!tile.get_collection(*c).removed);
        }
    }

    #[test]
    fn far_apart_stay_separate() {
        let cfg = NetworkConfig::default();
        let mut tile = ladder(2, 40.0);
        run(&mut tile, &cfg);
        assert_eq!(tile.live_intersections().count(), 2);
    }

    #[test]
    fn merging_can_be_disabled() {
        let mut cfg = NetworkConfig::default();
        cfg.merge_intersections = false;
        let mut tile = ladder(2, 6.0);
        run(&mut tile, &cfg);
        assert_eq!(tile.live_intersections().count(), 2);
    }

    #[test]
    fn long_chains_stop() {
        let cfg = NetworkConfig::default();
        let mut tile = ladder(30, 6.0);
        run(&mut tile, &cfg);

        for i in tile.live_intersections() {
            let absorbed = tile
                .all_intersections()
                .iter()
                .filter(|j| j.merged_into == Some(i.id))
                .count();
            assert!(absorbed <= MAX_MERGE_ITERATIONS);
        }
        // Every junction is still covered by something
        for idx in 0..30 {
            assert!(tile.intersection_at(NodeID(100 + idx)).is_some());
        }
    }
}
