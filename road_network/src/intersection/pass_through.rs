use anyhow::Result;

use geom::Pt2D;

use super::Seam;
use crate::lanes::{Endpoint, LaneCollection};
use crate::osm::NodeID;
use crate::pipeline::StageContext;
use crate::tile::Tile;
use crate::types::{CollectionID, LaneCollectionKey};

pub(crate) enum PassThrough {
    /// The collections on both sides were joined.
    Joined,
    /// The node continues a road into another tile.
    Seam,
    /// Needs a real intersection.
    NotApplicable,
}

/// When a node just continues one road, the collections on both sides become one instead of
/// meeting at an intersection.
pub(crate) fn try_pass_through(
    tile: &mut Tile,
    node: NodeID,
    pt: Pt2D,
    groups: &[Vec<(CollectionID, Endpoint)>],
    ctx: &mut StageContext,
) -> PassThrough {
    if groups.len() != 2 || groups[0].len() != groups[1].len() {
        return PassThrough::NotApplicable;
    }

    // Each incoming collection continues into the outgoing one on the other side
    let mut pairs: Vec<(CollectionID, CollectionID)> = Vec::new();
    for (from, to) in [(0, 1), (1, 0)] {
        for (incoming, endpoint) in &groups[from] {
            if *endpoint != Endpoint::End {
                continue;
            }
            match groups[to].iter().find(|(_, e)| *e == Endpoint::Start) {
                Some((outgoing, _)) => pairs.push((*incoming, *outgoing)),
                None => {
                    return PassThrough::NotApplicable;
                }
            }
        }
    }
    if pairs.len() * 2 != groups[0].len() + groups[1].len() {
        return PassThrough::NotApplicable;
    }

    for (incoming, outgoing) in &pairs {
        let a = tile.get_collection(*incoming);
        let b = tile.get_collection(*outgoing);
        if !a.characteristics.matches(&b.characteristics) || a.lanes.len() != b.lanes.len() {
            return PassThrough::NotApplicable;
        }
    }

    let (first, first_end) = groups[0][0];
    let (second, second_end) = groups[1][0];
    let turn = 180.0
        - tile
            .get_collection(first)
            .away_angle(first_end)
            .abs_diff_degrees(tile.get_collection(second).away_angle(second_end));
    if turn >= ctx.cfg.pass_through_max_degrees {
        return PassThrough::NotApplicable;
    }

    let members: Vec<CollectionID> = groups.iter().flatten().map(|(id, _)| *id).collect();
    if members.iter().any(|id| tile.get_collection(*id).dummy) {
        debug!("{} continues into another tile at {}", tile.coord, node);
        tile.seams.push(Seam {
            node,
            pt,
            collections: members,
        });
        return PassThrough::Seam;
    }

    // Joining mustn't create a loop or collide with something that already exists
    for (incoming, outgoing) in &pairs {
        let key = joined_key(tile, *incoming, *outgoing);
        if key.start == key.end {
            return PassThrough::NotApplicable;
        }
        if let Some(existing) = tile.find_collection(key) {
            if !existing.removed && existing.id != *incoming && existing.id != *outgoing {
                return PassThrough::NotApplicable;
            }
        }
    }

    let mut joined = Vec::new();
    for (incoming, outgoing) in &pairs {
        match concatenate(tile, *incoming, *outgoing) {
            Ok(c) => joined.push(c),
            Err(err) => {
                ctx.timer.warn(format!(
                    "{}: can't join the roads at {}: {}",
                    tile.coord, node, err
                ));
                return PassThrough::NotApplicable;
            }
        }
    }

    for ((incoming, outgoing), c) in pairs.iter().zip(joined) {
        let key = c.key;
        *tile.mut_collection(*incoming) = c;
        tile.rekey_collection(*incoming, key);
        tile.remove_collection(*outgoing);
        tile.replacements.insert(*outgoing, *incoming);
        repoint_intersections(tile, *outgoing, *incoming);
    }
    if pairs.len() == 2 {
        tile.link_pair(pairs[0].0, pairs[1].0);
    }
    PassThrough::Joined
}

fn joined_key(tile: &Tile, incoming: CollectionID, outgoing: CollectionID) -> LaneCollectionKey {
    let a = tile.get_collection(incoming);
    let b = tile.get_collection(outgoing);
    LaneCollectionKey::new(a.start_node(), b.end_node(), a.kind())
}

/// The incoming collection extended by the outgoing one. The result keeps the incoming
/// collection's identity and start, and takes everything about the far end from the outgoing
/// one.
fn concatenate(
    tile: &Tile,
    incoming: CollectionID,
    outgoing: CollectionID,
) -> Result<LaneCollection> {
    let out = tile.get_collection(outgoing);
    let mut joined = tile.get_collection(incoming).clone();
    joined.reference = joined.reference.clone().extend(out.reference.clone())?;
    joined.nodes.extend(out.nodes.iter().skip(1).cloned());
    joined.key = joined_key(tile, incoming, outgoing);
    joined.end_trim = out.end_trim;
    joined.next = out.next;
    joined.other = None;
    for (lane, out_lane) in joined.lanes.iter_mut().zip(out.lanes.iter()) {
        lane.turns = out_lane.turns;
        lane.successors.clear();
    }
    joined.rebuild_geometry()?;
    Ok(joined)
}

fn repoint_intersections(tile: &mut Tile, from: CollectionID, to: CollectionID) {
    for i in &mut tile.intersections {
        for (id, _) in &mut i.ring {
            if *id == from {
                *id = to;
            }
        }
        for id in i.incoming.iter_mut().chain(i.outgoing.iter_mut()) {
            if *id == from {
                *id = to;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use abstutil::{Tags, Timer};
    use geom::Distance;

    use super::*;
    use crate::config::NetworkConfig;
    use crate::element::ElementStore;
    use crate::intersection::ordering;
    use crate::lanes::{assemble_segment, Segment};
    use crate::osm::WayID;
    use crate::pipeline::TimeBudget;
    use crate::registry::{Outbox, TileRegistry};
    use crate::road_class::RoadClass;
    use crate::types::{DrivingSide, TileCoord};

    fn add(tile: &mut Tile, way: i64, nodes: Vec<(i64, f64, f64)>, tags: Vec<(&str, &str)>) {
        let cfg = NetworkConfig::default();
        let tags: Tags = tags.into_iter().collect();
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
        if ids.len() == 2 {
            tile.link_pair(ids[0], ids[1]);
        }
    }

    fn attempt(tile: &mut Tile, node: i64) -> PassThrough {
        let cfg = NetworkConfig::default();
        let registry = TileRegistry::new(cfg.tile_size);
        let mut timer = Timer::throwaway();
        let mut budget = TimeBudget::unlimited();
        let mut outbox = Outbox::default();
        let mut ctx = StageContext {
            cfg: &cfg,
            registry: &registry,
            budget: &mut budget,
            timer: &mut timer,
            outbox: &mut outbox,
        };
        let members: Vec<(CollectionID, Endpoint)> = tile
            .collections_at(NodeID(node))
            .into_iter()
            .map(|id| (id, tile.get_collection(id).endpoint_at(NodeID(node)).unwrap()))
            .collect();
        let groups = ordering::group(tile, &members, DrivingSide::Right);
        try_pass_through(tile, NodeID(node), Pt2D::new(50.0, 50.0), &groups, &mut ctx)
    }

    fn new_tile() -> Tile {
        Tile::new(TileCoord::new(0, 0), Distance::meters(1000.0), ElementStore::new())
    }

    #[test]
    fn gentle_bend_is_joined() {
        let mut tile = new_tile();
        let residential = vec![("highway", "residential")];
        add(&mut tile, 1, vec![(1, 0.0, 50.0), (2, 50.0, 50.0)], residential.clone());
        add(&mut tile, 2, vec![(2, 50.0, 50.0), (3, 100.0, 60.0)], residential);
        assert!(matches!(attempt(&mut tile, 2), PassThrough::Joined));

        let committed: Vec<&LaneCollection> = tile.committed_collections().collect();
        assert_eq!(committed.len(), 2);
        let fwd = tile
            .find_collection(LaneCollectionKey::new(
                NodeID(1),
                NodeID(3),
                crate::types::NetworkKind::Road,
            ))
            .unwrap();
        assert_eq!(fwd.nodes, vec![NodeID(1), NodeID(2), NodeID(3)]);
        let back = tile.get_collection(fwd.other.unwrap());
        assert_eq!(back.key, fwd.key.reversed());
        assert_eq!(back.other, Some(fwd.id));
        assert_eq!(tile.resolve_collection(CollectionID(2)), fwd.id);
    }

    #[test]
    fn sharp_turn_needs_an_intersection() {
        let mut tile = new_tile();
        let residential = vec![("highway", "residential")];
        add(&mut tile, 1, vec![(1, 0.0, 50.0), (2, 50.0, 50.0)], residential.clone());
        add(&mut tile, 2, vec![(2, 50.0, 50.0), (3, 50.0, 100.0)], residential);
        assert!(matches!(
            attempt(&mut tile, 2),
            PassThrough::NotApplicable
        ));
    }

    #[test]
    fn different_roads_need_an_intersection() {
        let mut tile = new_tile();
        add(
            &mut tile,
            1,
            vec![(1, 0.0, 50.0), (2, 50.0, 50.0)],
            vec![("highway", "residential")],
        );
        add(
            &mut tile,
            2,
            vec![(2, 50.0, 50.0), (3, 100.0, 50.0)],
            vec![("highway", "primary")],
        );
        assert!(matches!(
            attempt(&mut tile, 2),
            PassThrough::NotApplicable
        ));
    }

    #[test]
    fn mirrored_collections_make_a_seam() {
        let mut tile = new_tile();
        let residential = vec![("highway", "residential")];
        add(&mut tile, 1, vec![(1, 0.0, 50.0), (2, 50.0, 50.0)], residential.clone());
        add(&mut tile, 2, vec![(2, 50.0, 50.0), (3, 100.0, 50.0)], residential);
        tile.mut_collection(CollectionID(2)).dummy = true;
        assert!(matches!(attempt(&mut tile, 2), PassThrough::Seam));
        assert_eq!(tile.seams.len(), 1);
        assert_eq!(tile.seams[0].collections.len(), 4);
    }
}
