use std::fmt;

use serde::{Deserialize, Serialize};

use abstutil::Tags;

use crate::osm;
use crate::types::NetworkKind;

/// What kind of road, rail, or path a way is. Link roads are folded into their parent class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoadClass {
    Motorway,
    Trunk,
    Primary,
    Secondary,
    Tertiary,
    Unclassified,
    Residential,
    Service,
    LivingStreet,
    Track,
    Rail,
    Path,
}

impl RoadClass {
    /// Classifies a way by its tags. None means the way isn't part of any network we build.
    pub fn from_tags(tags: &Tags) -> Option<(RoadClass, NetworkKind)> {
        if let Some(railway) = tags.get(osm::RAILWAY) {
            return match railway.as_str() {
                "rail" | "light_rail" | "tram" | "subway" | "narrow_gauge" | "monorail"
                | "funicular" => Some((RoadClass::Rail, NetworkKind::Rail)),
                _ => None,
            };
        }

        let highway = tags.get(osm::HIGHWAY)?;
        let class = match highway.trim_end_matches("_link") {
            "motorway" => RoadClass::Motorway,
            "trunk" => RoadClass::Trunk,
            "primary" => RoadClass::Primary,
            "secondary" => RoadClass::Secondary,
            "tertiary" => RoadClass::Tertiary,
            "unclassified" | "road" => RoadClass::Unclassified,
            "residential" => RoadClass::Residential,
            "service" => RoadClass::Service,
            "living_street" => RoadClass::LivingStreet,
            "track" => RoadClass::Track,
            "footway" | "path" | "cycleway" | "pedestrian" | "steps" | "bridleway" => {
                return Some((RoadClass::Path, NetworkKind::Path));
            }
            _ => {
                return None;
            }
        };
        Some((class, NetworkKind::Road))
    }

    /// Higher ranks get right-of-way over lower ranks at an intersection.
    pub fn priority_rank(self) -> i32 {
        match self {
            RoadClass::Rail => 10,
            RoadClass::Motorway => 5,
            RoadClass::Trunk => 4,
            RoadClass::Primary => 3,
            RoadClass::Secondary => 2,
            RoadClass::Tertiary => 1,
            RoadClass::Unclassified | RoadClass::Residential | RoadClass::Service => 0,
            RoadClass::LivingStreet | RoadClass::Track => -1,
            RoadClass::Path => -2,
        }
    }

    pub fn default_speed_kmh(self) -> f64 {
        match self {
            RoadClass::Motorway => 120.0,
            RoadClass::Trunk => 100.0,
            RoadClass::Primary => 80.0,
            RoadClass::Secondary => 60.0,
            RoadClass::Tertiary | RoadClass::Unclassified => 50.0,
            RoadClass::Residential => 30.0,
            RoadClass::Service | RoadClass::Track => 20.0,
            RoadClass::LivingStreet | RoadClass::Path => 10.0,
            RoadClass::Rail => 80.0,
        }
    }

    /// (forwards, backwards) lane counts when nothing is tagged.
    pub fn default_lanes(self, oneway: bool) -> (usize, usize) {
        match (self, oneway) {
            (RoadClass::Motorway | RoadClass::Trunk, true) => (2, 0),
            (RoadClass::Motorway | RoadClass::Trunk, false) => (2, 2),
            (RoadClass::Primary, true) => (2, 0),
            (RoadClass::Rail | RoadClass::Path, _) => (1, 0),
            (_, true) => (1, 0),
            (_, false) => (1, 1),
        }
    }

    /// Some classes are oneway unless tagged otherwise.
    pub fn implies_oneway(self) -> bool {
        matches!(self, RoadClass::Motorway | RoadClass::Rail | RoadClass::Path)
    }
}

impl fmt::Display for RoadClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: Vec<(&str, &str)>) -> Tags {
        pairs.into_iter().collect()
    }

    #[test]
    fn classification() {
        assert_eq!(
            RoadClass::from_tags(&tags(vec![("highway", "motorway_link")])),
            Some((RoadClass::Motorway, NetworkKind::Road))
        );
        assert_eq!(
            RoadClass::from_tags(&tags(vec![("highway", "cycleway")])),
            Some((RoadClass::Path, NetworkKind::Path))
        );
        assert_eq!(
            RoadClass::from_tags(&tags(vec![("railway", "tram")])),
            Some((RoadClass::Rail, NetworkKind::Rail))
        );
        assert_eq!(RoadClass::from_tags(&tags(vec![("railway", "abandoned")])), None);
        assert_eq!(RoadClass::from_tags(&tags(vec![("highway", "proposed")])), None);
        assert_eq!(RoadClass::from_tags(&tags(vec![("building", "yes")])), None);
    }

    #[test]
    fn ranks() {
        assert_eq!(RoadClass::Motorway.priority_rank(), 5);
        assert_eq!(RoadClass::LivingStreet.priority_rank(), -1);
        assert_eq!(RoadClass::Rail.priority_rank(), 10);
        assert!(RoadClass::Primary.priority_rank() > RoadClass::Residential.priority_rank());
    }
}
