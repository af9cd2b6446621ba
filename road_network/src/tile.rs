use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use abstutil::{deserialize_btreemap, serialize_btreemap, MultiMap, Timer};
use geom::{Bounds, Distance, Pt2D};

use crate::elevation::ElevationStructure;
use crate::element::{ElementStore, RawElement};
use crate::intersection::{Intersection, Seam};
use crate::lanes::{LaneCollection, Segment};
use crate::osm::{NodeID, WayID};
use crate::pipeline::{Stage, StageProgress};
use crate::types::{CollectionID, IntersectionID, LaneCollectionKey, TileCoord};

/// One bounded piece of the world and everything the pipeline has built for it so far.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tile {
    pub coord: TileCoord,
    pub bounds: Bounds,
    pub(crate) stage: Stage,
    pub(crate) progress: StageProgress,

    /// The raw feed, plus any fragments handed over by other tiles.
    pub elements: ElementStore,
    // Indices into `elements` received from other tiles, handled before our own
    pub(crate) inbox: VecDeque<usize>,
    /// After boundary splitting, every element this tile is responsible for.
    pub fragments: Vec<RawElement>,
    pub(crate) fragment_keys: BTreeSet<(WayID, NodeID, NodeID)>,
    /// Nodes where a way crosses the edge of this tile.
    #[serde(
        serialize_with = "serialize_btreemap",
        deserialize_with = "deserialize_btreemap"
    )]
    pub split_points: BTreeMap<NodeID, Pt2D>,
    /// Per way, the nodes of every fragment this tile kept.
    pub claimed: MultiMap<WayID, NodeID>,

    // Where junction splitting cuts ways
    pub(crate) cut_nodes: BTreeSet<NodeID>,
    /// Per way, the (node, next node) edges committed as segments here.
    pub split_records: MultiMap<WayID, (NodeID, NodeID)>,
    pub segments: Vec<Segment>,
    /// Nodes that may need an intersection.
    #[serde(
        serialize_with = "serialize_btreemap",
        deserialize_with = "deserialize_btreemap"
    )]
    pub junctions: BTreeMap<NodeID, Pt2D>,

    pub(crate) collections: Vec<LaneCollection>,
    #[serde(
        serialize_with = "serialize_btreemap",
        deserialize_with = "deserialize_btreemap"
    )]
    collection_index: BTreeMap<LaneCollectionKey, CollectionID>,
    // Dummies created by the tile that handed over a fragment, awaiting adoption
    pub(crate) provisional: BTreeSet<CollectionID>,
    /// Collections removed by concatenation, pointing at what replaced them.
    #[serde(
        serialize_with = "serialize_btreemap",
        deserialize_with = "deserialize_btreemap"
    )]
    pub replacements: BTreeMap<CollectionID, CollectionID>,

    pub(crate) synthesis_queue: Vec<(NodeID, Pt2D)>,
    pub(crate) intersections: Vec<Intersection>,
    #[serde(
        serialize_with = "serialize_btreemap",
        deserialize_with = "deserialize_btreemap"
    )]
    intersection_index: BTreeMap<NodeID, IntersectionID>,
    pub seams: Vec<Seam>,

    pub(crate) elevations: Vec<ElevationStructure>,

    warnings: Vec<String>,
}

impl Tile {
    pub fn new(coord: TileCoord, tile_size: Distance, elements: ElementStore) -> Tile {
        Tile {
            coord,
            bounds: coord.bounds(tile_size),
            stage: Stage::BoundarySplit,
            progress: StageProgress::default(),

            elements,
            inbox: VecDeque::new(),
            fragments: Vec::new(),
            fragment_keys: BTreeSet::new(),
            split_points: BTreeMap::new(),
            claimed: MultiMap::new(),

            cut_nodes: BTreeSet::new(),
            split_records: MultiMap::new(),
            segments: Vec::new(),
            junctions: BTreeMap::new(),

            collections: Vec::new(),
            collection_index: BTreeMap::new(),
            provisional: BTreeSet::new(),
            replacements: BTreeMap::new(),

            synthesis_queue: Vec::new(),
            intersections: Vec::new(),
            intersection_index: BTreeMap::new(),
            seams: Vec::new(),

            elevations: Vec::new(),

            warnings: Vec::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Does this tile own the point? Tiles own their minimum edges, but not their maximum.
    pub fn owns(&self, pt: Pt2D) -> bool {
        self.bounds.contains_half_open(pt)
    }

    /// Everything that went wrong so far, without stopping the pipeline.
    pub fn warnings(&self) -> &Vec<String> {
        &self.warnings
    }

    pub(crate) fn absorb_warnings(&mut self, timer: &mut Timer) {
        self.warnings.extend(timer.take_warnings());
    }

    // Collections

    /// Every collection, including removed and provisional ones.
    pub fn all_collections(&self) -> &Vec<LaneCollection> {
        &self.collections
    }

    /// Collections that are neither removed nor provisional.
    pub fn committed_collections(&self) -> impl Iterator<Item = &LaneCollection> {
        self.collections.iter().filter(|c| c.is_committed())
    }

    pub fn get_collection(&self, id: CollectionID) -> &LaneCollection {
        &self.collections[id.0]
    }

    pub(crate) fn mut_collection(&mut self, id: CollectionID) -> &mut LaneCollection {
        &mut self.collections[id.0]
    }

    pub fn find_collection(&self, key: LaneCollectionKey) -> Option<&LaneCollection> {
        self.collection_index
            .get(&key)
            .map(|id| &self.collections[id.0])
    }

    /// Follows replacements made by concatenation to the collection that exists now.
    pub fn resolve_collection(&self, mut id: CollectionID) -> CollectionID {
        // Removed collections never survive a later concatenation, so there are no cycles
        while let Some(next) = self.replacements.get(&id) {
            id = *next;
        }
        id
    }

    /// Stores a collection. A provisional collection with the same identity is adopted: it keeps
    /// its ID but takes on the new contents. Any other duplicate is rejected.
    pub(crate) fn insert_collection(
        &mut self,
        mut c: LaneCollection,
        timer: &mut Timer,
    ) -> Option<CollectionID> {
        if let Some(existing) = self.collection_index.get(&c.key).cloned() {
            let old = &self.collections[existing.0];
            if old.dummy && !old.removed && !c.dummy {
                debug!("{} adopts provisional {}", self.coord, c.key);
                c.id = existing;
                c.other = None;
                self.provisional.remove(&existing);
                self.collections[existing.0] = c;
                return Some(existing);
            }
            if !old.removed {
                timer.warn(format!(
                    "{} already has {}; rejecting the duplicate from {}",
                    self.coord, c.key, c.way
                ));
                return None;
            }
        }

        let id = CollectionID(self.collections.len());
        c.id = id;
        self.collection_index.insert(c.key, id);
        self.collections.push(c);
        Some(id)
    }

    pub(crate) fn link_pair(&mut self, a: CollectionID, b: CollectionID) {
        self.collections[a.0].other = Some(b);
        self.collections[b.0].other = Some(a);
    }

    /// Changes a collection's identity, keeping the index current.
    pub(crate) fn rekey_collection(&mut self, id: CollectionID, key: LaneCollectionKey) {
        let old = self.collections[id.0].key;
        if self.collection_index.get(&old) == Some(&id) {
            self.collection_index.remove(&old);
        }
        self.collections[id.0].key = key;
        self.collection_index.insert(key, id);
    }

    pub(crate) fn remove_collection(&mut self, id: CollectionID) {
        let c = &mut self.collections[id.0];
        c.removed = true;
        if let Some(other) = c.other.take() {
            if self.collections[other.0].other == Some(id) {
                self.collections[other.0].other = None;
            }
        }
    }

    /// Local collections, not removed, with an end at the node.
    pub fn collections_at(&self, node: NodeID) -> Vec<CollectionID> {
        self.collections
            .iter()
            .filter(|c| !c.removed && c.key.touches(node))
            .map(|c| c.id)
            .collect()
    }

    // Intersections

    pub fn all_intersections(&self) -> &Vec<Intersection> {
        &self.intersections
    }

    /// Intersections that haven't been merged into another.
    pub fn live_intersections(&self) -> impl Iterator<Item = &Intersection> {
        self.intersections.iter().filter(|i| i.merged_into.is_none())
    }

    pub fn get_intersection(&self, id: IntersectionID) -> &Intersection {
        &self.intersections[id.0]
    }

    pub(crate) fn mut_intersection(&mut self, id: IntersectionID) -> &mut Intersection {
        &mut self.intersections[id.0]
    }

    /// The intersection covering a node, following merges.
    pub fn intersection_at(&self, node: NodeID) -> Option<&Intersection> {
        let mut id = *self.intersection_index.get(&node)?;
        while let Some(next) = self.intersections[id.0].merged_into {
            id = next;
        }
        Some(&self.intersections[id.0])
    }

    pub(crate) fn insert_intersection(&mut self, mut i: Intersection) -> IntersectionID {
        let id = IntersectionID(self.intersections.len());
        i.id = id;
        for node in &i.nodes {
            self.intersection_index.insert(*node, id);
        }
        self.intersections.push(i);
        id
    }

    pub(crate) fn index_intersection_node(&mut self, node: NodeID, id: IntersectionID) {
        self.intersection_index.insert(node, id);
    }

    // Elevation

    pub fn elevations(&self) -> &Vec<ElevationStructure> {
        &self.elevations
    }

    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }
}
