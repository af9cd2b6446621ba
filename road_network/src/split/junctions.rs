use std::collections::BTreeSet;

use abstutil::Counter;
use geom::Pt2D;

use super::network_of;
use crate::element::RawElement;
use crate::lanes::Segment;
use crate::osm::NodeID;
use crate::pipeline::StageContext;
use crate::road_class::RoadClass;
use crate::tile::Tile;
use crate::types::NetworkKind;

/// Splits every road and railway fragment into segments at shared nodes, skipping whatever a
/// neighbor already turned into segments. Returns true when done.
pub fn step(tile: &mut Tile, ctx: &mut StageContext) -> bool {
    if tile.progress.phase == 0 {
        find_cut_nodes(tile, ctx);
        tile.progress.next_phase();
    }

    if tile.progress.phase == 1 {
        ctx.timer.start_iter(
            "split fragments at junctions",
            tile.fragments.len() - tile.progress.cursor,
        );
        while tile.progress.cursor < tile.fragments.len() {
            if !ctx.budget.keep_going() {
                ctx.timer.cancel_iter();
                return false;
            }
            ctx.timer.next();
            let idx = tile.progress.cursor;
            tile.progress.cursor += 1;
            split_fragment(tile, idx, ctx);
        }
        tile.progress.next_phase();
    }

    find_junctions(tile);
    debug!(
        "{} has {} segments and {} junctions",
        tile.coord,
        tile.segments.len(),
        tile.junctions.len()
    );
    true
}

fn find_cut_nodes(tile: &mut Tile, ctx: &StageContext) {
    // How many times is each node used?
    let mut counts = Counter::new();
    for fragment in &tile.fragments {
        if let Some((_, kind)) = network_of(fragment) {
            if kind != NetworkKind::Path {
                for node in &fragment.nodes {
                    counts.inc(*node);
                }
            }
        }
    }

    let mut cut_nodes: BTreeSet<NodeID> = counts
        .borrow()
        .iter()
        .filter(|(_, count)| **count >= 2)
        .map(|(node, _)| *node)
        .collect();
    cut_nodes.extend(tile.split_points.keys().cloned());
    for neighbor in ctx.registry.neighbors(tile.coord) {
        cut_nodes.extend(neighbor.junctions.keys().cloned());
        cut_nodes.extend(neighbor.split_points.keys().cloned());
    }
    tile.cut_nodes = cut_nodes;
}

fn split_fragment(tile: &mut Tile, idx: usize, ctx: &mut StageContext) {
    let fragment = &tile.fragments[idx];
    let (class, kind) = match network_of(fragment) {
        Some(pair) => pair,
        None => {
            return;
        }
    };
    let pts = match fragment.resolved_points() {
        Some(pts) => pts.clone(),
        None => {
            ctx.timer
                .warn(format!("{} has no points; not splitting it", fragment.id));
            return;
        }
    };
    let fragment = fragment.clone();

    // Paths aren't part of any junction
    if kind == NetworkKind::Path {
        tile.segments
            .push(make_segment(&fragment, &pts, 0, pts.len() - 1, class, kind));
        return;
    }

    // Edges a neighbor already turned into segments
    let mut covered: BTreeSet<(NodeID, NodeID)> = BTreeSet::new();
    for neighbor in ctx.registry.neighbors(tile.coord) {
        covered.extend(neighbor.split_records.get(fragment.id).iter().cloned());
    }
    let is_covered = |a: NodeID, b: NodeID| covered.contains(&(a, b)) || covered.contains(&(b, a));

    // Inclusive ranges of point indices that nobody has claimed yet
    let nodes = &fragment.nodes;
    let mut runs: Vec<(usize, usize)> = Vec::new();
    let mut start: Option<usize> = None;
    for i in 0..nodes.len() - 1 {
        if is_covered(nodes[i], nodes[i + 1]) {
            if let Some(s) = start.take() {
                runs.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        runs.push((s, nodes.len() - 1));
    }
    if runs.is_empty() {
        debug!(
            "{} was already split entirely by a neighbor; dropping it from {}",
            fragment.id, tile.coord
        );
        return;
    }
    let truncated = runs.len() > 1 || runs[0] != (0, nodes.len() - 1);

    for (start, end) in runs {
        if truncated {
            // Where our copy meets the neighbor's segments, the two sides have to connect
            for i in [start, end] {
                if i != 0 && i != nodes.len() - 1 {
                    tile.split_points.insert(nodes[i], pts[i]);
                }
            }
        }

        let mut seg_start = start;
        for i in (start + 1)..=end {
            if i == end || tile.cut_nodes.contains(&nodes[i]) {
                let mut from = seg_start;
                for to in loop_cuts(nodes, seg_start, i).into_iter().chain([i]) {
                    for pair in nodes[from..=to].windows(2) {
                        tile.split_records.insert(fragment.id, (pair[0], pair[1]));
                    }
                    tile.segments
                        .push(make_segment(&fragment, &pts, from, to, class, kind));
                    from = to;
                }
                seg_start = i;
            }
        }
    }
}

/// A closed way only cut where it closes would start and end at the same node. Cut it into
/// thirds instead, so no two pieces connect the same pair of nodes either.
fn loop_cuts(nodes: &[NodeID], start: usize, end: usize) -> Vec<usize> {
    let span = end - start;
    if nodes[start] != nodes[end] || span < 2 {
        return Vec::new();
    }
    if span == 2 {
        return vec![start + 1];
    }
    vec![start + span / 3, start + 2 * span / 3]
}

fn make_segment(
    fragment: &RawElement,
    pts: &[Pt2D],
    start: usize,
    end: usize,
    class: RoadClass,
    kind: NetworkKind,
) -> Segment {
    Segment {
        way: fragment.id,
        nodes: fragment.nodes[start..=end].to_vec(),
        pts: pts[start..=end].to_vec(),
        tags: fragment.tags.clone(),
        class,
        kind,
    }
}

/// Segment ends shared by at least two segments, plus the ends sitting on a tile border.
fn find_junctions(tile: &mut Tile) {
    let mut degree = Counter::new();
    for segment in tile.segments.iter().filter(|s| s.kind != NetworkKind::Path) {
        degree.inc(segment.nodes[0]);
        degree.inc(segment.nodes[segment.nodes.len() - 1]);
    }
    for segment in tile.segments.iter().filter(|s| s.kind != NetworkKind::Path) {
        let ends = [
            (segment.nodes[0], segment.pts[0]),
            (
                segment.nodes[segment.nodes.len() - 1],
                segment.pts[segment.pts.len() - 1],
            ),
        ];
        for (node, pt) in ends {
            if degree.get(node) >= 2 || tile.split_points.contains_key(&node) {
                tile.junctions.insert(node, pt);
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
    use crate::element::{ElementStore, GeometryKind};
    use crate::osm::WayID;
    use crate::pipeline::{Stage, TimeBudget};
    use crate::registry::{Outbox, TileRegistry};
    use crate::types::TileCoord;

    fn line(id: i64, nodes: Vec<(i64, f64, f64)>, tags: Vec<(&str, &str)>) -> RawElement {
        let tags: Tags = tags.into_iter().collect();
        RawElement::with_points(
            WayID(id),
            GeometryKind::Line,
            nodes.iter().map(|(n, _, _)| NodeID(*n)).collect(),
            nodes.iter().map(|(_, x, y)| Pt2D::new(*x, *y)).collect(),
            tags,
        )
    }

    fn run(tile: &mut Tile, registry: &TileRegistry) {
        let cfg = NetworkConfig::default();
        let mut timer = Timer::throwaway();
        let mut budget = TimeBudget::unlimited();
        let mut outbox = Outbox::default();
        let mut ctx = StageContext {
            cfg: &cfg,
            registry,
            budget: &mut budget,
            timer: &mut timer,
            outbox: &mut outbox,
        };
        assert!(step(tile, &mut ctx));
    }

    fn new_tile(coord: TileCoord) -> Tile {
        Tile::new(coord, Distance::meters(100.0), ElementStore::new())
    }

    #[test]
    fn t_junction() {
        let registry = TileRegistry::new(Distance::meters(100.0));
        let mut tile = new_tile(TileCoord::new(0, 0));
        tile.fragments.push(line(
            1,
            vec![(1, 10.0, 50.0), (2, 50.0, 50.0), (3, 90.0, 50.0)],
            vec![("highway", "primary")],
        ));
        tile.fragments.push(line(
            2,
            vec![(2, 50.0, 50.0), (4, 50.0, 90.0)],
            vec![("highway", "residential")],
        ));
        // Footways crossing a road don't make a junction
        tile.fragments.push(line(
            3,
            vec![(5, 20.0, 10.0), (1, 10.0, 50.0)],
            vec![("highway", "footway")],
        ));
        run(&mut tile, &registry);

        assert_eq!(tile.segments.len(), 4);
        assert_eq!(
            tile.junctions.keys().cloned().collect::<Vec<_>>(),
            vec![NodeID(2)]
        );
        assert!(tile
            .split_records
            .get(WayID(1))
            .contains(&(NodeID(2), NodeID(3))));
    }

    #[test]
    fn closed_way_is_cut_into_thirds() {
        let registry = TileRegistry::new(Distance::meters(100.0));
        let mut tile = new_tile(TileCoord::new(0, 0));
        tile.fragments.push(line(
            1,
            vec![
                (1, 20.0, 20.0),
                (2, 80.0, 20.0),
                (3, 80.0, 80.0),
                (4, 20.0, 80.0),
                (1, 20.0, 20.0),
            ],
            vec![("highway", "residential"), ("junction", "roundabout")],
        ));
        run(&mut tile, &registry);

        let segments: Vec<Vec<NodeID>> = tile.segments.iter().map(|s| s.nodes.clone()).collect();
        assert_eq!(
            segments,
            vec![
                vec![NodeID(1), NodeID(2)],
                vec![NodeID(2), NodeID(3)],
                vec![NodeID(3), NodeID(4), NodeID(1)],
            ]
        );
        assert_eq!(
            tile.junctions.keys().cloned().collect::<Vec<_>>(),
            vec![NodeID(1), NodeID(2), NodeID(3)]
        );
    }

    #[test]
    fn neighbor_already_split_part_of_the_way() {
        let mut registry = TileRegistry::new(Distance::meters(100.0));
        let mut east = new_tile(TileCoord::new(1, 0));
        east.split_records.insert(WayID(1), (NodeID(3), NodeID(4)));
        east.stage = Stage::LaneAssembly;
        registry.insert(east).unwrap();

        let mut tile = new_tile(TileCoord::new(0, 0));
        tile.fragments.push(line(
            1,
            vec![(2, 50.0, 50.0), (3, 90.0, 50.0), (4, 120.0, 50.0)],
            vec![("highway", "residential")],
        ));
        run(&mut tile, &registry);

        assert_eq!(tile.segments.len(), 1);
        assert_eq!(tile.segments[0].nodes, vec![NodeID(2), NodeID(3)]);
        assert!(tile.junctions.contains_key(&NodeID(3)));
    }

    #[test]
    fn fully_covered_way_is_dropped() {
        let mut registry = TileRegistry::new(Distance::meters(100.0));
        let mut east = new_tile(TileCoord::new(1, 0));
        east.split_records.insert(WayID(1), (NodeID(3), NodeID(4)));
        registry.insert(east).unwrap();

        let mut tile = new_tile(TileCoord::new(0, 0));
        tile.fragments.push(line(
            1,
            vec![(3, 90.0, 50.0), (4, 120.0, 50.0)],
            vec![("highway", "residential")],
        ));
        run(&mut tile, &registry);
        assert!(tile.segments.is_empty());
    }
}
