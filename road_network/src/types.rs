use std::fmt;

use serde::{Deserialize, Serialize};

use geom::{Bounds, Distance, Pt2D};

use crate::osm::NodeID;

/// A tile's position in the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub fn new(x: i32, y: i32) -> TileCoord {
        TileCoord { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> TileCoord {
        TileCoord::new(self.x + dx, self.y + dy)
    }

    /// The 8 surrounding positions.
    pub fn neighbors(self) -> Vec<TileCoord> {
        let mut result = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                if dx != 0 || dy != 0 {
                    result.push(self.offset(dx, dy));
                }
            }
        }
        result
    }

    pub fn is_neighbor(self, other: TileCoord) -> bool {
        self != other && (self.x - other.x).abs() <= 1 && (self.y - other.y).abs() <= 1
    }

    /// The tile covering a point. Tiles own their minimum edges but not their maximum ones.
    pub fn containing(pt: Pt2D, tile_size: Distance) -> TileCoord {
        let size = tile_size.inner_meters();
        TileCoord::new(
            (pt.x() / size).floor() as i32,
            (pt.y() / size).floor() as i32,
        )
    }

    pub fn bounds(self, tile_size: Distance) -> Bounds {
        let size = tile_size.inner_meters();
        Bounds {
            min_x: f64::from(self.x) * size,
            min_y: f64::from(self.y) * size,
            max_x: f64::from(self.x + 1) * size,
            max_y: f64::from(self.y + 1) * size,
        }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Tile ({}, {})", self.x, self.y)
    }
}

/// Index of a LaneCollection within its tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CollectionID(pub usize);

impl fmt::Display for CollectionID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "LaneCollection #{}", self.0)
    }
}

/// Index of an Intersection within its tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntersectionID(pub usize);

impl fmt::Display for IntersectionID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Intersection #{}", self.0)
    }
}

/// Index of an ElevationStructure within its tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElevationID(pub usize);

impl fmt::Display for ElevationID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Elevation #{}", self.0)
    }
}

/// Points at an intersection that may live in another tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntersectionRef {
    pub tile: TileCoord,
    pub node: NodeID,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NetworkKind {
    Road,
    Rail,
    Path,
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NetworkKind::Road => write!(f, "road"),
            NetworkKind::Rail => write!(f, "rail"),
            NetworkKind::Path => write!(f, "path"),
        }
    }
}

/// The identity of a LaneCollection: a direction of travel between two nodes on one network.
/// Unique per tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LaneCollectionKey {
    pub start: NodeID,
    pub end: NodeID,
    pub kind: NetworkKind,
}

impl LaneCollectionKey {
    pub fn new(start: NodeID, end: NodeID, kind: NetworkKind) -> LaneCollectionKey {
        LaneCollectionKey { start, end, kind }
    }

    /// The same connection, traveled the other way.
    pub fn reversed(self) -> LaneCollectionKey {
        LaneCollectionKey {
            start: self.end,
            end: self.start,
            kind: self.kind,
        }
    }

    pub fn touches(self, node: NodeID) -> bool {
        self.start == node || self.end == node
    }
}

impl fmt::Display for LaneCollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} -> {}", self.kind, self.start.0, self.end.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrivingSide {
    Right,
    Left,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eight_neighbors() {
        let c = TileCoord::new(3, -2);
        let neighbors = c.neighbors();
        assert_eq!(neighbors.len(), 8);
        assert!(neighbors.iter().all(|n| c.is_neighbor(*n)));
        assert!(!c.is_neighbor(c));
        assert!(!c.is_neighbor(TileCoord::new(5, -2)));
    }

    #[test]
    fn tiles_partition_space() {
        let size = Distance::meters(100.0);
        let pt = Pt2D::new(100.0, -0.5);
        let coord = TileCoord::containing(pt, size);
        assert_eq!(coord, TileCoord::new(1, -1));
        assert!(coord.bounds(size).contains_half_open(pt));
        assert!(!TileCoord::new(0, -1).bounds(size).contains_half_open(pt));
    }

    #[test]
    fn reversing_keys() {
        let key = LaneCollectionKey::new(NodeID(1), NodeID(2), NetworkKind::Road);
        assert_eq!(key.reversed().reversed(), key);
        assert_eq!(key.reversed().start, NodeID(2));
        assert!(key.touches(NodeID(2)));
    }
}
