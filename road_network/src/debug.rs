//! Dumps what a tile has built as GeoJSON, for inspecting results in any map viewer.

use anyhow::Result;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, Value};

use geom::{PolyLine, Polygon, Pt2D};

use crate::elevation::ElevationKind;
use crate::tile::Tile;

fn position(pt: Pt2D) -> Vec<f64> {
    vec![pt.x(), pt.y()]
}

fn line_string(pl: &PolyLine) -> Geometry {
    Geometry::new(Value::LineString(
        pl.points().iter().map(|pt| position(*pt)).collect(),
    ))
}

fn polygon(poly: &Polygon) -> Geometry {
    let mut ring: Vec<Vec<f64>> = poly.points().iter().map(|pt| position(*pt)).collect();
    // GeoJSON rings are explicitly closed
    if let Some(first) = ring.first().cloned() {
        ring.push(first);
    }
    Geometry::new(Value::Polygon(vec![ring]))
}

fn feature(geometry: Geometry, kind: &str) -> Feature {
    let mut feature = Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: None,
        foreign_members: None,
    };
    feature.set_property("type", kind);
    feature
}

/// Committed collections (both outlines), intersection polygons, and elevation structures, in
/// the tile's local coordinates.
pub fn tile_to_geojson(tile: &Tile) -> GeoJson {
    let mut features = Vec::new();

    for c in tile.committed_collections() {
        for (side, outline) in [("left", &c.left), ("right", &c.right)] {
            let mut f = feature(line_string(&outline.pts), "collection outline");
            f.set_property("collection", c.id.0);
            f.set_property("key", c.key.to_string());
            f.set_property("side", side);
            f.set_property(
                "heights",
                outline
                    .heights
                    .iter()
                    .map(|h| h.inner_meters())
                    .collect::<Vec<_>>(),
            );
            features.push(f);
        }
        for (idx, lane) in c.lanes.iter().enumerate() {
            let mut f = feature(line_string(&lane.pts), "lane");
            f.set_property("collection", c.id.0);
            f.set_property("lane", idx);
            f.set_property("successors", lane.successors.len());
            features.push(f);
        }
    }

    for i in tile.live_intersections() {
        let mut f = feature(polygon(&i.polygon), "intersection");
        f.set_property("node", i.node.0);
        f.set_property(
            "nodes",
            i.nodes.iter().map(|n| n.0).collect::<Vec<_>>(),
        );
        f.set_property("height", i.height.inner_meters());
        f.set_property(
            "priorities",
            i.priorities
                .iter()
                .map(|p| format!("{}: {:?}", tile.get_collection(p.collection).key, p.priority))
                .collect::<Vec<_>>(),
        );
        features.push(f);
    }

    for s in tile.elevations() {
        let kind = match s.kind {
            ElevationKind::Bridge => "bridge",
            ElevationKind::Tunnel { .. } => "tunnel",
            ElevationKind::BridgeSupport { .. } => "bridge support",
        };
        let mut f = feature(polygon(&s.polygon), kind);
        f.set_property("elevation", s.id.0);
        f.set_property("base_height", s.base_height.inner_meters());
        features.push(f);

        if let ElevationKind::Tunnel {
            ref left_wall,
            ref right_wall,
            ..
        } = s.kind
        {
            features.push(feature(line_string(left_wall), "tunnel wall"));
            features.push(feature(line_string(right_wall), "tunnel wall"));
        }
    }

    for seam in &tile.seams {
        let mut f = feature(Geometry::new(Value::Point(position(seam.pt))), "seam");
        f.set_property("node", seam.node.0);
        features.push(f);
    }

    GeoJson::FeatureCollection(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

/// Writes `tile_to_geojson` to a file.
pub fn dump_tile(tile: &Tile, path: &str) -> Result<()> {
    let gj = tile_to_geojson(tile);
    fs_err::write(path, serde_json::to_string_pretty(&gj)?)?;
    info!("Wrote {}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use geom::Distance;

    use super::*;
    use crate::element::ElementStore;
    use crate::types::TileCoord;

    #[test]
    fn empty_tile() {
        let tile = Tile::new(
            TileCoord::new(0, 0),
            Distance::meters(100.0),
            ElementStore::new(),
        );
        match tile_to_geojson(&tile) {
            GeoJson::FeatureCollection(fc) => assert!(fc.features.is_empty()),
            x => panic!("unexpected {:?}", x),
        }
    }
}
