//! Identifiers and tag keys from the raw map data.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const HIGHWAY: &str = "highway";
pub const RAILWAY: &str = "railway";
pub const ONEWAY: &str = "oneway";
pub const JUNCTION: &str = "junction";
pub const LANES: &str = "lanes";
pub const LANES_FWD: &str = "lanes:forward";
pub const LANES_BACK: &str = "lanes:backward";
pub const TURN_LANES: &str = "turn:lanes";
pub const TURN_LANES_FWD: &str = "turn:lanes:forward";
pub const TURN_LANES_BACK: &str = "turn:lanes:backward";
pub const WIDTH: &str = "width";
pub const MAXSPEED: &str = "maxspeed";
pub const SURFACE: &str = "surface";
pub const SIDEWALK: &str = "sidewalk";
pub const CYCLEWAY: &str = "cycleway";
pub const GAUGE: &str = "gauge";

pub const BRIDGE: &str = "bridge";
pub const BRIDGE_SUPPORT: &str = "bridge:support";
pub const TUNNEL: &str = "tunnel";
pub const LAYER: &str = "layer";
pub const HEIGHT: &str = "height";
pub const MAXHEIGHT: &str = "maxheight";
pub const MAN_MADE: &str = "man_made";
pub const AREA: &str = "area";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeID(pub i64);

impl fmt::Display for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Node #{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WayID(pub i64);

impl fmt::Display for WayID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Way #{}", self.0)
    }
}

/// Parses things like "7", "7.5 m", or "12'6\"" into meters. Imperial values are converted.
pub fn parse_meters(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if let Some(value) = raw.strip_suffix('m') {
        return value.trim().parse::<f64>().ok();
    }
    if let Some((feet, inches)) = raw.split_once('\'') {
        let feet = feet.trim().parse::<f64>().ok()?;
        let inches = inches.trim().trim_end_matches('"');
        let inches = if inches.is_empty() {
            0.0
        } else {
            inches.parse::<f64>().ok()?
        };
        return Some(feet * 0.3048 + inches * 0.0254);
    }
    raw.parse::<f64>().ok()
}

/// Parses a speed limit into km/h. Handles "50", "30 mph", and a few named limits.
pub fn parse_speed_kmh(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if let Some(value) = raw.strip_suffix("mph") {
        return value.trim().parse::<f64>().ok().map(|mph| mph * 1.609_344);
    }
    if let Some(value) = raw.strip_suffix("km/h") {
        return value.trim().parse::<f64>().ok();
    }
    match raw {
        "walk" => Some(7.0),
        "none" | "signals" => None,
        _ => raw.parse::<f64>().ok(),
    }
}
