//! Strongly-typed 2D geometry for assembling road networks. Everything here works in a tile's
//! local, projected coordinate space, measured in meters.

#[macro_use]
extern crate anyhow;

mod angle;
mod bounds;
mod distance;
mod line;
mod polygon;
mod polyline;
mod pt;

pub use crate::angle::Angle;
pub use crate::bounds::Bounds;
pub use crate::distance::Distance;
pub use crate::line::{InfiniteLine, Line};
pub use crate::polygon::Polygon;
pub use crate::polyline::PolyLine;
pub use crate::pt::Pt2D;

/// About one millimeter. Points closer than this are considered the same.
pub const EPSILON_DIST: Distance = Distance::const_meters(0.001);
