use abstutil::Timer;

use super::{assemble_segment, LaneCollection, Segment};
use crate::config::NetworkConfig;
use crate::element::RawElement;
use crate::pipeline::StageContext;
use crate::split::network_of;
use crate::tile::Tile;
use crate::types::CollectionID;

/// Builds collections for every segment in the tile. Returns true when done.
pub fn step(tile: &mut Tile, ctx: &mut StageContext) -> bool {
    ctx.timer.start_iter(
        "assemble lanes",
        tile.segments.len() - tile.progress.cursor,
    );
    while tile.progress.cursor < tile.segments.len() {
        if !ctx.budget.keep_going() {
            ctx.timer.cancel_iter();
            return false;
        }
        ctx.timer.next();
        let segment = tile.segments[tile.progress.cursor].clone();
        tile.progress.cursor += 1;

        match assemble_segment(&segment, ctx.cfg) {
            Ok(collections) => {
                let mut ids: Vec<CollectionID> = Vec::new();
                for c in collections {
                    if let Some(id) = tile.insert_collection(c, ctx.timer) {
                        ids.push(id);
                    }
                }
                if ids.len() == 2 {
                    tile.link_pair(ids[0], ids[1]);
                }
            }
            Err(err) => {
                ctx.timer.warn(format!(
                    "{}: abandoning a segment of {}: {}",
                    tile.coord, segment.way, err
                ));
            }
        }
    }

    // Provisional collections nobody confirmed
    for id in std::mem::take(&mut tile.provisional) {
        if tile.get_collection(id).dummy {
            debug!("{} drops unconfirmed {}", tile.coord, tile.get_collection(id).key);
            tile.remove_collection(id);
        }
    }
    true
}

/// Collections for a fragment handed over to another tile, so that tile knows what's coming.
pub(crate) fn provisional_for(fragment: &RawElement, cfg: &NetworkConfig) -> Vec<LaneCollection> {
    let (class, kind) = match network_of(fragment) {
        Some(pair) => pair,
        None => {
            return Vec::new();
        }
    };
    let pts = match fragment.resolved_points() {
        Some(pts) => pts.clone(),
        None => {
            return Vec::new();
        }
    };
    let segment = Segment {
        way: fragment.id,
        nodes: fragment.nodes.clone(),
        pts,
        tags: fragment.tags.clone(),
        class,
        kind,
    };
    match assemble_segment(&segment, cfg) {
        Ok(mut collections) => {
            for c in &mut collections {
                c.dummy = true;
            }
            collections
        }
        Err(err) => {
            debug!("No provisional collections for {}: {}", fragment.id, err);
            Vec::new()
        }
    }
}

/// Stores provisional collections received from other tiles, unless something with the same
/// identity is already here.
pub(crate) fn accept_dummies(tile: &mut Tile, dummies: Vec<LaneCollection>, timer: &mut Timer) {
    let mut inserted: Vec<CollectionID> = Vec::new();
    for mut dummy in dummies {
        if tile.find_collection(dummy.key).is_some() {
            continue;
        }
        dummy.dummy = true;
        dummy.other = None;
        if let Some(id) = tile.insert_collection(dummy, timer) {
            tile.provisional.insert(id);
            inserted.push(id);
        }
    }

    // Pair up the two directions of the same fragment
    for id in &inserted {
        let c = tile.get_collection(*id);
        if c.other.is_some() {
            continue;
        }
        let way = c.way;
        if let Some(other) = tile.find_collection(c.key.reversed()) {
            if other.way == way && other.dummy && other.other.is_none() {
                let other = other.id;
                tile.link_pair(*id, other);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use abstutil::Tags;
    use geom::Pt2D;

    use super::*;
    use crate::element::{ElementStore, GeometryKind};
    use crate::osm::{NodeID, WayID};
    use crate::pipeline::TimeBudget;
    use crate::registry::{Outbox, TileRegistry};
    use crate::road_class::RoadClass;
    use crate::types::TileCoord;

    fn fragment(nodes: Vec<i64>, pts: Vec<Pt2D>) -> RawElement {
        let tags: Tags = vec![("highway", "residential")].into_iter().collect();
        RawElement::with_points(
            WayID(9),
            GeometryKind::Line,
            nodes.into_iter().map(NodeID).collect(),
            pts,
            tags,
        )
    }

    fn segment_from(f: &RawElement) -> Segment {
        let (class, kind) = RoadClass::from_tags(&f.tags).unwrap();
        Segment {
            way: f.id,
            nodes: f.nodes.clone(),
            pts: f.resolved_points().unwrap().clone(),
            tags: f.tags.clone(),
            class,
            kind,
        }
    }

    fn run(tile: &mut Tile) -> Vec<String> {
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
        assert!(step(tile, &mut ctx));
        timer.take_warnings()
    }

    #[test]
    fn dummies_are_adopted_or_dropped() {
        let cfg = NetworkConfig::default();
        let adopted = fragment(
            vec![1, 2],
            vec![Pt2D::new(10.0, 10.0), Pt2D::new(60.0, 10.0)],
        );
        let stale = fragment(
            vec![2, 3],
            vec![Pt2D::new(60.0, 10.0), Pt2D::new(90.0, 10.0)],
        );
        let mut dummies = provisional_for(&adopted, &cfg);
        dummies.extend(provisional_for(&stale, &cfg));
        assert_eq!(dummies.len(), 4);

        let mut tile = Tile::new(TileCoord::new(0, 0), cfg.tile_size, ElementStore::new());
        accept_dummies(&mut tile, dummies, &mut Timer::throwaway());
        assert_eq!(tile.provisional.len(), 4);
        let fwd = tile.all_collections()[0].id;
        let back = tile.all_collections()[1].id;
        assert_eq!(tile.get_collection(fwd).other, Some(back));

        tile.segments.push(segment_from(&adopted));
        run(&mut tile);

        // The real collections took over the provisional slots
        assert_eq!(tile.all_collections().len(), 4);
        assert!(tile.get_collection(fwd).is_committed());
        assert_eq!(tile.get_collection(fwd).other, Some(back));
        assert_eq!(tile.get_collection(back).other, Some(fwd));
        assert_eq!(tile.committed_collections().count(), 2);
        assert!(tile.provisional.is_empty());
        assert!(tile.all_collections()[2].removed);
    }

    #[test]
    fn duplicates_are_rejected() {
        let cfg = NetworkConfig::default();
        let f = fragment(vec![1, 2], vec![Pt2D::new(10.0, 10.0), Pt2D::new(60.0, 10.0)]);
        let mut tile = Tile::new(TileCoord::new(0, 0), cfg.tile_size, ElementStore::new());
        tile.segments.push(segment_from(&f));
        tile.segments.push(segment_from(&f));
        let warnings = run(&mut tile);
        assert_eq!(tile.all_collections().len(), 2);
        assert_eq!(tile.committed_collections().count(), 2);
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn zero_length_segments_are_abandoned() {
        let cfg = NetworkConfig::default();
        let f = fragment(vec![1, 2], vec![Pt2D::new(10.0, 10.0), Pt2D::new(10.0, 10.0)]);
        let mut tile = Tile::new(TileCoord::new(0, 0), cfg.tile_size, ElementStore::new());
        tile.segments.push(segment_from(&f));
        let warnings = run(&mut tile);
        assert!(tile.all_collections().is_empty());
        assert_eq!(warnings.len(), 1);
    }
}
