use std::collections::BTreeSet;

use anyhow::Result;

use geom::{Bounds, Distance, PolyLine, Polygon, Pt2D};

use super::{ElevationKind, ElevationStructure};
use crate::config::NetworkConfig;
use crate::element::GeometryKind;
use crate::lanes::{Characteristics, Endpoint};
use crate::osm;
use crate::pipeline::StageContext;
use crate::tile::Tile;
use crate::types::{CollectionID, ElevationID};

const SUPPORT_HALF_SIZE: Distance = Distance::const_meters(0.5);
// Slack for node positions sitting exactly on the edge of a structure.
const ON_STRUCTURE: Distance = Distance::const_meters(0.01);

/// The deck height of a bridge: an explicit height, or one offset per layer. An untagged layer
/// leaves the deck on the ground.
pub fn bridge_base(ch: &Characteristics, cfg: &NetworkConfig) -> Distance {
    ch.height
        .unwrap_or_else(|| cfg.bridge_layer_offset * (ch.layer.abs() as f64))
}

/// The clearance inside a tunnel: the tagged maximum height, or a default per layer. Layer 0
/// still gets one layer of clearance.
pub fn tunnel_inner_height(ch: &Characteristics, cfg: &NetworkConfig) -> Distance {
    ch.max_height
        .unwrap_or_else(|| cfg.tunnel_inner_height * (ch.layer.abs().max(1) as f64))
}

/// How far below the ground the road inside a tunnel runs.
pub fn tunnel_base(ch: &Characteristics, cfg: &NetworkConfig) -> Distance {
    -(tunnel_inner_height(ch, cfg) + cfg.tunnel_roof_thickness)
}

/// The height of whatever structure carries a collection, or None on the ground.
pub fn structure_base(ch: &Characteristics, cfg: &NetworkConfig) -> Option<Distance> {
    if ch.bridge {
        Some(bridge_base(ch, cfg))
    } else if ch.tunnel {
        Some(tunnel_base(ch, cfg))
    } else {
        None
    }
}

/// One structure per bridge or tunnel road (both directions together), plus bridge supports.
/// Collections are pointed at the structure carrying them.
pub(crate) fn find_structures(tile: &mut Tile, ctx: &mut StageContext) -> Vec<ElevationStructure> {
    let mut structures: Vec<ElevationStructure> = Vec::new();
    let mut handled: BTreeSet<CollectionID> = BTreeSet::new();
    let candidates: Vec<CollectionID> = tile
        .committed_collections()
        .filter(|c| c.characteristics.bridge || c.characteristics.tunnel)
        .map(|c| c.id)
        .collect();

    for id in candidates {
        if handled.contains(&id) {
            continue;
        }
        let mut group = vec![id];
        if let Some(other) = tile.get_collection(id).other {
            if tile.get_collection(other).is_committed() {
                group.push(other);
            }
        }
        handled.extend(group.iter().cloned());

        let structure_id = ElevationID(structures.len());
        match build_structure(tile, group, structure_id, ctx.cfg) {
            Ok(s) => {
                for c in &s.collections {
                    tile.mut_collection(*c).elevation = Some(structure_id);
                }
                structures.push(s);
            }
            Err(err) => {
                ctx.timer.warn(format!(
                    "{}: no elevation structure for {}: {}",
                    tile.coord,
                    tile.get_collection(id).key,
                    err
                ));
            }
        }
    }

    classify_nodes(tile, &mut structures, ctx);
    find_adjacent(&mut structures);
    add_supports(tile, &mut structures, ctx);
    structures
}

/// The (left, right) outer edges of a road, in the direction of its first collection.
fn group_edges(tile: &Tile, group: &[CollectionID]) -> (PolyLine, PolyLine) {
    let c = tile.get_collection(group[0]);
    match group.get(1).map(|o| tile.get_collection(*o)) {
        None => (c.left.pts.clone(), c.right.pts.clone()),
        // Each direction sits on its own side, so its outer edge is away from the reference
        Some(o) if c.offset >= Distance::ZERO => (o.right.pts.reversed(), c.right.pts.clone()),
        Some(o) => (c.left.pts.clone(), o.left.pts.reversed()),
    }
}

fn build_structure(
    tile: &Tile,
    group: Vec<CollectionID>,
    id: ElevationID,
    cfg: &NetworkConfig,
) -> Result<ElevationStructure> {
    let (left, right) = group_edges(tile, &group);
    let mut pts = right.points().clone();
    pts.extend(left.points().iter().rev().cloned());
    let polygon = Polygon::new(pts)?;

    let ch = &tile.get_collection(group[0]).characteristics;
    let (kind, base_height) = if ch.bridge {
        (ElevationKind::Bridge, bridge_base(ch, cfg))
    } else {
        (
            ElevationKind::Tunnel {
                inner_height: tunnel_inner_height(ch, cfg),
                left_wall: left.shift_left(cfg.tunnel_wall_offset_left)?,
                right_wall: right.shift_right(cfg.tunnel_wall_offset_right)?,
            },
            tunnel_base(ch, cfg),
        )
    };

    Ok(ElevationStructure {
        id,
        kind,
        polygon,
        base_height,
        collections: group,
        inner_nodes: Vec::new(),
        ramp_nodes: Vec::new(),
        adjacent: Vec::new(),
    })
}

// The ground covered by a structure's roads, all the way to their nodes.
fn untrimmed_bounds(tile: &Tile, collections: &[CollectionID]) -> Result<Bounds> {
    let mut bounds = Bounds::new();
    for c in collections {
        let (left, right) = tile.get_collection(*c).full_outlines()?;
        for pt in left.points().iter().chain(right.points().iter()) {
            bounds.update(*pt);
        }
    }
    Ok(bounds.expanded(ON_STRUCTURE))
}

// An end is inner when the junction there lies on the structure and every other road meeting
// there is carried by the same kind of structure. Otherwise the road comes back to the ground
// there.
fn classify_nodes(tile: &Tile, structures: &mut [ElevationStructure], ctx: &mut StageContext) {
    for s in structures.iter_mut() {
        let bounds = match untrimmed_bounds(tile, &s.collections) {
            Ok(bounds) => bounds,
            Err(err) => {
                ctx.timer.warn(format!(
                    "{}: can't find where {:?} lies, so all of its ends ramp: {}",
                    tile.coord, s.id, err
                ));
                let first = tile.get_collection(s.collections[0]);
                s.ramp_nodes.extend([first.start_node(), first.end_node()]);
                continue;
            }
        };

        let first = tile.get_collection(s.collections[0]);
        for endpoint in [Endpoint::Start, Endpoint::End] {
            let node = first.node_at(endpoint);
            // A merged intersection can be centered away from this node
            let pt = tile
                .intersection_at(node)
                .map(|i| i.center)
                .unwrap_or_else(|| first.node_pt(endpoint));

            let others: Vec<CollectionID> = tile
                .collections_at(node)
                .into_iter()
                .filter(|c| !s.collections.contains(c))
                .collect();
            let same_kind = others.iter().all(|c| {
                let ch = &tile.get_collection(*c).characteristics;
                if s.is_bridge() {
                    ch.bridge
                } else {
                    ch.tunnel
                }
            });
            if bounds.contains(pt) && !others.is_empty() && same_kind {
                s.inner_nodes.push(node);
            } else {
                s.ramp_nodes.push(node);
            }
        }
    }
}

fn find_adjacent(structures: &mut [ElevationStructure]) {
    let mut pairs = Vec::new();
    for a in structures.iter() {
        for b in structures.iter() {
            if a.id < b.id
                && a.is_bridge() == b.is_bridge()
                && a.inner_nodes.iter().any(|n| b.inner_nodes.contains(n))
            {
                pairs.push((a.id, b.id));
            }
        }
    }
    for (a, b) in pairs {
        structures[a.0].adjacent.push(b);
        structures[b.0].adjacent.push(a);
    }
}

// Explicitly mapped supports go under whichever bridge covers them. Every bridge also gets
// supports at a regular spacing.
fn add_supports(tile: &Tile, structures: &mut Vec<ElevationStructure>, ctx: &mut StageContext) {
    let mut supports: Vec<(ElevationID, Pt2D)> = Vec::new();
    for element in &tile.fragments {
        if element.kind != GeometryKind::Point || !element.tags.contains_key(osm::BRIDGE_SUPPORT)
        {
            continue;
        }
        let pt = match element.anchor() {
            Some(pt) => pt,
            None => continue,
        };
        match structures
            .iter()
            .find(|s| s.is_bridge() && s.polygon.contains_pt(pt))
        {
            Some(bridge) => supports.push((bridge.id, pt)),
            None => {
                debug!("{}: {} isn't under any bridge", tile.coord, element.id);
            }
        }
    }

    let spacing = ctx.cfg.support_spacing;
    if spacing > Distance::ZERO {
        for s in structures.iter().filter(|s| s.is_bridge()) {
            let c = tile.get_collection(s.collections[0]);
            let mut dist = spacing;
            while dist < c.length() {
                if let Ok((pt, _)) = c.reference.dist_along(c.start_trim + dist) {
                    supports.push((s.id, pt));
                }
                dist += spacing;
            }
        }
    }

    for (bridge, position) in supports {
        let id = ElevationID(structures.len());
        let base_height = structures[bridge.0].base_height;
        let collections = structures[bridge.0].collections.clone();
        structures.push(ElevationStructure {
            id,
            kind: ElevationKind::BridgeSupport { bridge, position },
            polygon: Polygon::rectangle(&Bounds::from(&[position]).expanded(SUPPORT_HALF_SIZE)),
            base_height,
            collections,
            inner_nodes: Vec::new(),
            ramp_nodes: Vec::new(),
            adjacent: Vec::new(),
        });
    }
}
