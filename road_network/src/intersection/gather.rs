use crate::lanes::{Endpoint, LaneCollection};
use crate::osm::NodeID;
use crate::pipeline::StageContext;
use crate::tile::Tile;
use crate::types::{CollectionID, NetworkKind, TileCoord};

/// Every road and rail collection touching a node, with the end that touches it. Collections
/// owned by neighbors that end here get a local copy, so an intersection on the tile's edge
/// sees every approach.
pub(crate) fn gather(
    tile: &mut Tile,
    node: NodeID,
    ctx: &mut StageContext,
) -> Vec<(CollectionID, Endpoint)> {
    for id in tile.collections_at(node) {
        let c = tile.get_collection(id);
        if c.start_node() == node && c.end_node() == node {
            ctx.timer.warn(format!(
                "{}: {} loops back to {}; removing it",
                tile.coord, c.key, node
            ));
            tile.remove_collection(id);
        }
    }

    mirror_neighbors(tile, node, ctx);

    tile.collections_at(node)
        .into_iter()
        .filter_map(|id| {
            let c = tile.get_collection(id);
            if c.kind() == NetworkKind::Path {
                return None;
            }
            c.endpoint_at(node).map(|endpoint| (id, endpoint))
        })
        .collect()
}

fn mirror_neighbors(tile: &mut Tile, node: NodeID, ctx: &mut StageContext) {
    // (copy, the tile it came from, the original's opposite)
    let mut copies: Vec<(LaneCollection, TileCoord, Option<CollectionID>)> = Vec::new();
    for neighbor in ctx.registry.neighbors(tile.coord) {
        for id in neighbor.collections_at(node) {
            let c = neighbor.get_collection(id);
            if !c.is_committed() || c.kind() == NetworkKind::Path {
                continue;
            }
            let have_local = tile
                .find_collection(c.key)
                .map(|local| !local.removed)
                .unwrap_or(false);
            if have_local || copies.iter().any(|(copy, _, _)| copy.key == c.key) {
                continue;
            }

            let mut copy = c.clone();
            copy.dummy = true;
            copy.mirrored_from = Some((neighbor.coord, id));
            copy.other = None;
            copy.elevation = None;
            for lane in &mut copy.lanes {
                lane.successors.clear();
            }
            copies.push((copy, neighbor.coord, c.other));
        }
    }
    if copies.is_empty() {
        return;
    }

    let mut inserted: Vec<(CollectionID, TileCoord, CollectionID, Option<CollectionID>)> =
        Vec::new();
    for (copy, from, source_other) in copies {
        let source = match copy.mirrored_from {
            Some((_, id)) => id,
            None => continue,
        };
        debug!("{} mirrors {} from {}", tile.coord, copy.key, from);
        if let Some(id) = tile.insert_collection(copy, ctx.timer) {
            inserted.push((id, from, source, source_other));
        }
    }

    // Copies of both directions stay paired
    for (id, from, _, source_other) in &inserted {
        let other = match source_other {
            Some(other) => *other,
            None => continue,
        };
        if let Some((pair, _, _, _)) = inserted
            .iter()
            .find(|(_, f, source, _)| f == from && *source == other)
        {
            if tile.get_collection(*id).other.is_none() {
                tile.link_pair(*id, *pair);
            }
        }
    }
}
