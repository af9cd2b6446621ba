use serde::{Deserialize, Serialize};

use abstutil::Tags;
use geom::Distance;

use crate::config::NetworkConfig;
use crate::osm;
use crate::road_class::RoadClass;
use crate::types::NetworkKind;

/// Which way traffic flows along a way, relative to the order of its nodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Oneway {
    No,
    Forwards,
    Backwards,
}

/// Everything about a collection that comes from tags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Characteristics {
    pub class: RoadClass,
    pub kind: NetworkKind,
    pub lane_width: Distance,
    pub speed_kmh: f64,
    pub surface: Option<String>,
    pub sidewalk: bool,
    pub cycleway: bool,
    pub bridge: bool,
    pub tunnel: bool,
    pub layer: i32,
    /// Clearance under a tunnel roof, from `maxheight`.
    pub max_height: Option<Distance>,
    /// An explicit deck height for bridges.
    pub height: Option<Distance>,
    pub oneway: bool,
}

impl Characteristics {
    /// Could two collections be one?
    pub fn matches(&self, other: &Characteristics) -> bool {
        self.class == other.class
            && self.kind == other.kind
            && self
                .lane_width
                .approx_eq(other.lane_width, Distance::meters(0.01))
            && (self.speed_kmh - other.speed_kmh).abs() < 0.1
            && self.surface == other.surface
            && self.sidewalk == other.sidewalk
            && self.cycleway == other.cycleway
            && self.bridge == other.bridge
            && self.tunnel == other.tunnel
            && self.layer == other.layer
            && self.oneway == other.oneway
    }
}

pub fn get_oneway(tags: &Tags, class: RoadClass) -> Oneway {
    if tags.is_any(osm::ONEWAY, vec!["yes", "1", "true"]) {
        return Oneway::Forwards;
    }
    if tags.is_any(osm::ONEWAY, vec!["-1", "reverse"]) {
        return Oneway::Backwards;
    }
    if tags.is_any(osm::ONEWAY, vec!["no", "0", "false"]) {
        return Oneway::No;
    }
    if tags.is_any(osm::JUNCTION, vec!["roundabout", "circular"]) || class.implies_oneway() {
        return Oneway::Forwards;
    }
    Oneway::No
}

/// How many lanes go (with, against) the direction of travel. Oneway roads count everything as
/// going with the direction of travel.
pub fn get_lane_counts(tags: &Tags, class: RoadClass, oneway: Oneway) -> (usize, usize) {
    if matches!(class, RoadClass::Rail | RoadClass::Path) {
        return (1, 0);
    }
    if oneway != Oneway::No {
        let n = tags
            .parse::<usize>(osm::LANES)
            .filter(|n| *n > 0)
            .unwrap_or_else(|| class.default_lanes(true).0);
        return (n, 0);
    }

    let total = tags.parse::<usize>(osm::LANES).filter(|n| *n > 0);
    let (default_fwd, default_back) = class.default_lanes(false);
    let num_fwd = if let Some(n) = tags.parse::<usize>(osm::LANES_FWD).filter(|n| *n > 0) {
        n
    } else if let Some(n) = total {
        // An odd total is ambiguous; give the extra lane to the forward direction.
        (n - n / 2).max(1)
    } else {
        default_fwd
    };
    let num_back = if let Some(n) = tags.parse::<usize>(osm::LANES_BACK).filter(|n| *n > 0) {
        n
    } else if let Some(n) = total {
        (n / 2).max(1)
    } else {
        default_back
    };
    (num_fwd, num_back)
}

pub fn get_characteristics(
    tags: &Tags,
    class: RoadClass,
    kind: NetworkKind,
    num_lanes: usize,
    cfg: &NetworkConfig,
) -> Characteristics {
    let oneway = get_oneway(tags, class) != Oneway::No;
    let speed_kmh = tags
        .get(osm::MAXSPEED)
        .and_then(|raw| osm::parse_speed_kmh(raw))
        .unwrap_or_else(|| class.default_speed_kmh());

    let explicit_width = tags
        .get(osm::WIDTH)
        .and_then(|raw| osm::parse_meters(raw))
        .filter(|w| *w > 0.0)
        .map(Distance::meters);
    let lane_width = match kind {
        NetworkKind::Rail => {
            let gauge = tags
                .get(osm::GAUGE)
                .and_then(|raw| raw.split(';').next())
                .and_then(|raw| raw.trim().parse::<f64>().ok())
                .map(Distance::millimeters)
                .unwrap_or(cfg.default_gauge);
            gauge + cfg.rail_shoulder * 2.0
        }
        NetworkKind::Path => explicit_width.unwrap_or(cfg.path_width),
        NetworkKind::Road => match explicit_width {
            Some(width) => width / (num_lanes.max(1) as f64),
            None => cfg.lane_width_for_speed(speed_kmh),
        },
    } * cfg.width_scaler;

    let layer = tags.parse::<i32>(osm::LAYER).unwrap_or(0);

    Characteristics {
        class,
        kind,
        lane_width,
        speed_kmh,
        surface: tags.get(osm::SURFACE).cloned(),
        sidewalk: tags.is_any(osm::SIDEWALK, vec!["both", "left", "right", "yes"]),
        cycleway: tags
            .get(osm::CYCLEWAY)
            .map(|v| v != "no")
            .unwrap_or(false),
        bridge: tags.get(osm::BRIDGE).map(|v| v != "no").unwrap_or(false),
        tunnel: tags
            .get(osm::TUNNEL)
            .map(|v| v != "no" && v != "culvert")
            .unwrap_or(false),
        layer,
        max_height: tags
            .get(osm::MAXHEIGHT)
            .and_then(|raw| osm::parse_meters(raw))
            .map(Distance::meters),
        height: tags
            .get(osm::HEIGHT)
            .and_then(|raw| osm::parse_meters(raw))
            .map(Distance::meters),
        oneway,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: Vec<(&str, &str)>) -> Tags {
        pairs.into_iter().collect()
    }

    #[test]
    fn lane_counts() {
        let t = tags(vec![("highway", "primary"), ("lanes", "3")]);
        assert_eq!(get_lane_counts(&t, RoadClass::Primary, Oneway::No), (2, 1));

        let t = tags(vec![
            ("highway", "primary"),
            ("lanes:forward", "1"),
            ("lanes:backward", "3"),
        ]);
        assert_eq!(get_lane_counts(&t, RoadClass::Primary, Oneway::No), (1, 3));

        let t = tags(vec![("highway", "motorway")]);
        let oneway = get_oneway(&t, RoadClass::Motorway);
        assert_eq!(oneway, Oneway::Forwards);
        assert_eq!(get_lane_counts(&t, RoadClass::Motorway, oneway), (2, 0));

        let t = tags(vec![("highway", "motorway"), ("oneway", "no")]);
        assert_eq!(get_oneway(&t, RoadClass::Motorway), Oneway::No);
        assert_eq!(get_lane_counts(&t, RoadClass::Motorway, Oneway::No), (2, 2));

        let t = tags(vec![("highway", "residential"), ("oneway", "-1")]);
        assert_eq!(get_oneway(&t, RoadClass::Residential), Oneway::Backwards);
    }

    #[test]
    fn widths() {
        let cfg = NetworkConfig::default();

        let t = tags(vec![("highway", "primary"), ("maxspeed", "80")]);
        let c = get_characteristics(&t, RoadClass::Primary, NetworkKind::Road, 2, &cfg);
        assert_eq!(c.lane_width, cfg.lane_width_below_100);

        let t = tags(vec![("highway", "primary"), ("width", "12")]);
        let c = get_characteristics(&t, RoadClass::Primary, NetworkKind::Road, 4, &cfg);
        assert!(c.lane_width.approx_eq(Distance::meters(3.0), Distance::meters(0.001)));

        let t = tags(vec![("railway", "rail"), ("gauge", "1000;1435")]);
        let c = get_characteristics(&t, RoadClass::Rail, NetworkKind::Rail, 1, &cfg);
        assert!(c.lane_width.approx_eq(Distance::meters(2.0), Distance::meters(0.001)));
    }

    #[test]
    fn structures() {
        let cfg = NetworkConfig::default();
        let t = tags(vec![
            ("highway", "secondary"),
            ("tunnel", "yes"),
            ("layer", "-2"),
            ("maxheight", "4.2"),
        ]);
        let c = get_characteristics(&t, RoadClass::Secondary, NetworkKind::Road, 2, &cfg);
        assert!(c.tunnel && !c.bridge);
        assert_eq!(c.layer, -2);
        assert_eq!(c.max_height, Some(Distance::meters(4.2)));

        let culvert = tags(vec![("highway", "secondary"), ("tunnel", "culvert")]);
        let c = get_characteristics(&culvert, RoadClass::Secondary, NetworkKind::Road, 2, &cfg);
        assert!(!c.tunnel);
    }
}
