use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use abstutil::{deserialize_btreemap, serialize_btreemap};
use geom::Distance;

use crate::road_class::RoadClass;
use crate::types::DrivingSide;

/// Every tunable used while assembling a network. Missing fields in a config file fall back to
/// the defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Lanes are placed on this side of the centerline, and turn lanes are ordered to match.
    pub driving_side: DrivingSide,
    /// The width and height of every tile.
    pub tile_size: Distance,

    /// The frame rate the external scheduler aims for.
    pub target_fps: f64,
    /// How much of each frame one tile's stage may use, in [0, 1].
    pub budget_fraction: f64,

    /// Per-lane width when the speed limit is below 50km/h.
    pub lane_width_below_50: Distance,
    /// Per-lane width in [50, 70) km/h.
    pub lane_width_below_70: Distance,
    /// Per-lane width in [70, 100) km/h.
    pub lane_width_below_100: Distance,
    /// Per-lane width at 100km/h and above.
    pub lane_width_fast: Distance,
    /// Every computed road width is multiplied by this.
    pub width_scaler: f64,
    pub path_width: Distance,
    /// Used when a railway has no gauge tag.
    pub default_gauge: Distance,
    /// Added to each side of a track's gauge.
    pub rail_shoulder: Distance,

    /// Two collections meeting at a node turning less than this become one.
    pub pass_through_max_degrees: f64,
    /// Gaps between adjacent roads wider than this use the corner fallback.
    pub reflex_degrees: f64,
    /// Outline direction changes above this get an extra boundary point.
    pub disambiguation_degrees: f64,
    /// Every road is trimmed back at least this far from a junction.
    pub min_trim: Distance,
    /// Corners found further than this from the node are discarded.
    pub max_corner_distance: Distance,

    pub merge_intersections: bool,
    /// Only intersections joined by a collection shorter than this are merged.
    pub merge_max_connector_length: Distance,
    /// Inflates an intersection's radius before checking for overlap, by the highest class
    /// meeting there. Classes not listed use 1.0.
    #[serde(
        serialize_with = "serialize_btreemap",
        deserialize_with = "deserialize_btreemap"
    )]
    pub merge_radius_multipliers: BTreeMap<RoadClass, f64>,

    /// A bridge's deck is this far above the ground per layer.
    pub bridge_layer_offset: Distance,
    /// Supports are placed along every bridge this far apart.
    pub support_spacing: Distance,
    pub tunnel_inner_height: Distance,
    pub tunnel_roof_thickness: Distance,
    pub tunnel_wall_offset_left: Distance,
    pub tunnel_wall_offset_right: Distance,
    /// The longest slope used to blend between two heights.
    pub max_ramp_length: Distance,
    /// Height differences below this are ignored.
    pub height_epsilon: Distance,
}

impl Default for NetworkConfig {
    fn default() -> NetworkConfig {
        let mut merge_radius_multipliers = BTreeMap::new();
        merge_radius_multipliers.insert(RoadClass::Motorway, 0.8);
        merge_radius_multipliers.insert(RoadClass::Trunk, 0.8);
        merge_radius_multipliers.insert(RoadClass::Residential, 1.2);
        merge_radius_multipliers.insert(RoadClass::Service, 1.2);
        merge_radius_multipliers.insert(RoadClass::LivingStreet, 1.2);

        NetworkConfig {
            driving_side: DrivingSide::Right,
            tile_size: Distance::meters(1000.0),

            target_fps: 60.0,
            budget_fraction: 0.25,

            lane_width_below_50: Distance::meters(2.75),
            lane_width_below_70: Distance::meters(3.0),
            lane_width_below_100: Distance::meters(3.25),
            lane_width_fast: Distance::meters(3.5),
            width_scaler: 1.0,
            path_width: Distance::meters(2.0),
            default_gauge: Distance::millimeters(1435.0),
            rail_shoulder: Distance::meters(0.5),

            pass_through_max_degrees: 45.0,
            reflex_degrees: 135.0,
            disambiguation_degrees: 25.0,
            min_trim: Distance::meters(1.0),
            max_corner_distance: Distance::meters(50.0),

            merge_intersections: true,
            merge_max_connector_length: Distance::meters(10.0),
            merge_radius_multipliers,

            bridge_layer_offset: Distance::meters(5.0),
            support_spacing: Distance::meters(30.0),
            tunnel_inner_height: Distance::meters(5.0),
            tunnel_roof_thickness: Distance::meters(1.0),
            tunnel_wall_offset_left: Distance::meters(0.5),
            tunnel_wall_offset_right: Distance::meters(0.5),
            max_ramp_length: Distance::meters(50.0),
            height_epsilon: Distance::meters(0.01),
        }
    }
}

impl NetworkConfig {
    /// Reads a JSON config file. Anything not specified keeps its default.
    pub fn load(path: &str) -> Result<NetworkConfig> {
        let raw = fs_err::read_to_string(path)?;
        let config: NetworkConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parsing network config {}", path))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tile_size <= Distance::ZERO {
            bail!("tile_size must be positive, not {}", self.tile_size);
        }
        if self.target_fps <= 0.0 {
            bail!("target_fps must be positive, not {}", self.target_fps);
        }
        if !(0.0..=1.0).contains(&self.budget_fraction) {
            bail!("budget_fraction {} isn't in [0, 1]", self.budget_fraction);
        }
        if self.width_scaler <= 0.0 {
            bail!("width_scaler must be positive, not {}", self.width_scaler);
        }
        Ok(())
    }

    /// How long one tile's stage may run per tick.
    pub fn frame_budget(&self) -> Duration {
        Duration::from_secs_f64(self.budget_fraction / self.target_fps)
    }

    /// The per-lane width for a speed limit.
    pub fn lane_width_for_speed(&self, speed_kmh: f64) -> Distance {
        if speed_kmh < 50.0 {
            self.lane_width_below_50
        } else if speed_kmh < 70.0 {
            self.lane_width_below_70
        } else if speed_kmh < 100.0 {
            self.lane_width_below_100
        } else {
            self.lane_width_fast
        }
    }

    pub fn merge_radius_multiplier(&self, class: RoadClass) -> f64 {
        self.merge_radius_multipliers
            .get(&class)
            .cloned()
            .unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_brackets() {
        let cfg = NetworkConfig::default();
        assert_eq!(cfg.lane_width_for_speed(30.0), cfg.lane_width_below_50);
        assert_eq!(cfg.lane_width_for_speed(50.0), cfg.lane_width_below_70);
        assert_eq!(cfg.lane_width_for_speed(99.9), cfg.lane_width_below_100);
        assert_eq!(cfg.lane_width_for_speed(130.0), cfg.lane_width_fast);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: NetworkConfig =
            serde_json::from_str(r#"{"width_scaler": 1.5, "merge_intersections": false}"#)
                .unwrap();
        assert_eq!(cfg.width_scaler, 1.5);
        assert!(!cfg.merge_intersections);
        assert_eq!(cfg.tile_size, NetworkConfig::default().tile_size);
        assert_eq!(cfg.merge_radius_multiplier(RoadClass::Residential), 1.2);
        assert_eq!(cfg.merge_radius_multiplier(RoadClass::Primary), 1.0);
    }

    #[test]
    fn round_trip_through_file() {
        let path = std::env::temp_dir().join("road_network_config_test.json");
        let path = path.to_string_lossy().to_string();
        let mut cfg = NetworkConfig::default();
        cfg.driving_side = DrivingSide::Left;
        fs_err::write(&path, serde_json::to_string_pretty(&cfg).unwrap()).unwrap();
        assert_eq!(NetworkConfig::load(&path).unwrap(), cfg);
        let _ = fs_err::remove_file(&path);
    }

    #[test]
    fn budget_from_fps() {
        let cfg = NetworkConfig::default();
        let budget = cfg.frame_budget();
        assert!(budget.as_secs_f64() > 0.004 && budget.as_secs_f64() < 0.0042);

        let mut bad = cfg;
        bad.budget_fraction = 2.0;
        assert!(bad.validate().is_err());
    }
}
