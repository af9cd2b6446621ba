//! Assembles a road and rail network from raw ways, one square tile at a time. Each tile is cut
//! at its border and at junctions, turned into lane collections, joined up by intersection
//! polygons, and finally lifted onto bridges or sunk into tunnels. Tiles advance independently,
//! waiting only on their neighbors where a stage needs to see across the border.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod config;
mod debug;
mod element;
pub mod elevation;
pub mod intersection;
pub mod lanes;
pub mod osm;
mod pipeline;
mod registry;
mod road_class;
pub mod split;
mod tile;
mod types;

pub use crate::config::NetworkConfig;
pub use crate::debug::{dump_tile, tile_to_geojson};
pub use crate::element::{ElementStore, GeometryKind, RawElement};
pub use crate::elevation::{ElevationKind, ElevationStructure, RampProfile};
pub use crate::intersection::{ApproachPriority, Intersection, Priority, Seam};
pub use crate::lanes::{Characteristics, Endpoint, Lane, LaneCollection, LaneRef, TurnDirection};
pub use crate::osm::{NodeID, WayID};
pub use crate::pipeline::{
    Pipeline, Precondition, RunSummary, Stage, StageContext, StepResult, TimeBudget,
};
pub use crate::registry::{Outbox, TileRegistry};
pub use crate::road_class::RoadClass;
pub use crate::tile::Tile;
pub use crate::types::{
    CollectionID, DrivingSide, ElevationID, IntersectionID, IntersectionRef, LaneCollectionKey,
    NetworkKind, TileCoord,
};
