use abstutil::skip_fail;

use crate::lanes::Endpoint;
use crate::pipeline::StageContext;
use crate::tile::Tile;
use crate::types::CollectionID;

/// A junction on another tile's ground was built there, using a copy of our collection. Take
/// the trim and intersection that tile worked out, so both sides end at the same polygon.
pub(crate) fn reconcile_borders(tile: &mut Tile, ctx: &mut StageContext) {
    let ids: Vec<CollectionID> = tile.committed_collections().map(|c| c.id).collect();
    for id in ids {
        for endpoint in [Endpoint::Start, Endpoint::End] {
            let c = tile.get_collection(id);
            let pt = c.node_pt(endpoint);
            if tile.owns(pt) {
                continue;
            }
            let node = c.node_at(endpoint);
            let owner = skip_fail!(ctx.registry.get(ctx.registry.coord_containing(pt)));
            let mirror = owner.all_collections().iter().find(|m| {
                !m.removed
                    && m.endpoint_at(node) == Some(endpoint)
                    && match m.mirrored_from {
                        Some((from, source)) => {
                            from == tile.coord && tile.resolve_collection(source) == id
                        }
                        None => false,
                    }
            });
            let (trim, at) = match mirror {
                Some(m) => (m.trim_at(endpoint), m.intersection_at(endpoint)),
                None => continue,
            };

            let mut updated = c.clone();
            updated.set_trim(endpoint, trim);
            updated.set_intersection(endpoint, at);
            match updated.rebuild_geometry() {
                Ok(()) => {
                    *tile.mut_collection(id) = updated;
                }
                Err(err) => {
                    ctx.timer.warn(format!(
                        "{}: can't match {} to {}: {}",
                        tile.coord, c.key, owner.coord, err
                    ));
                }
            }
        }
    }
}
