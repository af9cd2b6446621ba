use std::collections::BTreeMap;

use anyhow::Result;

use geom::{Distance, Pt2D};

use crate::element::RawElement;
use crate::lanes::LaneCollection;
use crate::pipeline::Stage;
use crate::tile::Tile;
use crate::types::TileCoord;

/// Work one tile leaves for another: fragments it found outside its bounds, and the provisional
/// collections built from them.
#[derive(Clone, Debug, Default)]
pub struct PendingWork {
    pub elements: Vec<RawElement>,
    pub dummies: Vec<LaneCollection>,
}

impl PendingWork {
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.dummies.is_empty()
    }
}

/// Everything a tile produced for other tiles during one step, delivered once the step ends.
#[derive(Default)]
pub struct Outbox {
    pub(crate) pending: BTreeMap<TileCoord, PendingWork>,
}

impl Outbox {
    pub fn send_element(&mut self, to: TileCoord, element: RawElement) {
        self.pending.entry(to).or_default().elements.push(element);
    }

    pub fn send_dummy(&mut self, to: TileCoord, dummy: LaneCollection) {
        self.pending.entry(to).or_default().dummies.push(dummy);
    }
}

/// Owns every tile, indexed by grid position. A tile being worked on is temporarily taken out,
/// so the rest of the registry can be read while it's mutated.
pub struct TileRegistry {
    tile_size: Distance,
    /// Tiles outside these (inclusive) coordinates will never exist.
    extent: Option<(TileCoord, TileCoord)>,
    slots: Vec<Option<Tile>>,
    index: BTreeMap<TileCoord, usize>,
    pending: BTreeMap<TileCoord, PendingWork>,
}

impl TileRegistry {
    pub fn new(tile_size: Distance) -> TileRegistry {
        TileRegistry {
            tile_size,
            extent: None,
            slots: Vec::new(),
            index: BTreeMap::new(),
            pending: BTreeMap::new(),
        }
    }

    pub fn tile_size(&self) -> Distance {
        self.tile_size
    }

    /// Declares the edges of the world. Positions outside will never have a tile, so nothing
    /// waits for them.
    pub fn set_extent(&mut self, min: TileCoord, max: TileCoord) {
        self.extent = Some((min, max));
    }

    pub fn in_world(&self, coord: TileCoord) -> bool {
        match self.extent {
            Some((min, max)) => {
                coord.x >= min.x && coord.x <= max.x && coord.y >= min.y && coord.y <= max.y
            }
            None => true,
        }
    }

    pub fn insert(&mut self, tile: Tile) -> Result<()> {
        if self.index.contains_key(&tile.coord) {
            bail!("{} already exists", tile.coord);
        }
        if !self.in_world(tile.coord) {
            bail!("{} is outside the world", tile.coord);
        }
        self.index.insert(tile.coord, self.slots.len());
        self.slots.push(Some(tile));
        Ok(())
    }

    /// Every tile position, in a stable order.
    pub fn coords(&self) -> Vec<TileCoord> {
        self.index.keys().cloned().collect()
    }

    /// The tile, unless it doesn't exist or is being worked on.
    pub fn get(&self, coord: TileCoord) -> Option<&Tile> {
        self.slots[*self.index.get(&coord)?].as_ref()
    }

    pub fn neighbor(&self, coord: TileCoord, dx: i32, dy: i32) -> Option<&Tile> {
        self.get(coord.offset(dx, dy))
    }

    /// The existing tiles around a position.
    pub fn neighbors(&self, coord: TileCoord) -> Vec<&Tile> {
        coord
            .neighbors()
            .into_iter()
            .filter_map(|n| self.get(n))
            .collect()
    }

    pub fn coord_containing(&self, pt: Pt2D) -> TileCoord {
        TileCoord::containing(pt, self.tile_size)
    }

    /// Neighbors inside the world that don't exist yet or haven't moved past a stage.
    pub fn neighbors_not_past(&self, coord: TileCoord, stage: Stage) -> Vec<TileCoord> {
        coord
            .neighbors()
            .into_iter()
            .filter(|n| self.in_world(*n))
            .filter(|n| self.get(*n).map(|t| t.stage() <= stage).unwrap_or(true))
            .collect()
    }

    pub(crate) fn take(&mut self, coord: TileCoord) -> Option<Tile> {
        self.slots[*self.index.get(&coord)?].take()
    }

    pub(crate) fn restore(&mut self, tile: Tile) {
        let idx = self.index[&tile.coord];
        self.slots[idx] = Some(tile);
    }

    pub(crate) fn deliver(&mut self, outbox: Outbox) {
        for (coord, work) in outbox.pending {
            if !self.in_world(coord) {
                debug!(
                    "Dropping {} elements bound for {}, outside the world",
                    work.elements.len(),
                    coord
                );
                continue;
            }
            let entry = self.pending.entry(coord).or_default();
            entry.elements.extend(work.elements);
            entry.dummies.extend(work.dummies);
        }
    }

    pub(crate) fn take_pending_elements(&mut self, coord: TileCoord) -> Vec<RawElement> {
        match self.pending.get_mut(&coord) {
            Some(work) => std::mem::take(&mut work.elements),
            None => Vec::new(),
        }
    }

    pub(crate) fn take_pending_dummies(&mut self, coord: TileCoord) -> Vec<LaneCollection> {
        match self.pending.get_mut(&coord) {
            Some(work) => std::mem::take(&mut work.dummies),
            None => Vec::new(),
        }
    }

    /// Work waiting for a tile, possibly one that doesn't exist yet.
    pub fn pending_for(&self, coord: TileCoord) -> Option<&PendingWork> {
        self.pending.get(&coord).filter(|work| !work.is_empty())
    }
}
