use enumset::{EnumSet, EnumSetType};
use serde::{Deserialize, Serialize};

use geom::Angle;

#[derive(Debug, Serialize, Deserialize, PartialOrd, Ord, EnumSetType)]
pub enum TurnDirection {
    Left,
    SlightLeft,
    Through,
    SlightRight,
    Right,
    Reverse,
}

impl TurnDirection {
    fn parse(raw: &str) -> Option<TurnDirection> {
        match raw.trim() {
            "left" | "sharp_left" => Some(TurnDirection::Left),
            "slight_left" | "merge_to_left" => Some(TurnDirection::SlightLeft),
            "through" => Some(TurnDirection::Through),
            "slight_right" | "merge_to_right" => Some(TurnDirection::SlightRight),
            "right" | "sharp_right" => Some(TurnDirection::Right),
            "reverse" => Some(TurnDirection::Reverse),
            _ => None,
        }
    }

    /// Classifies the turn from arriving in one direction to leaving in another. Counter-clockwise
    /// is a left turn.
    pub fn between(arrive: Angle, depart: Angle) -> TurnDirection {
        let rotation = arrive.shortest_rotation_towards(depart);
        let magnitude = rotation.abs();
        if magnitude <= 20.0 {
            TurnDirection::Through
        } else if magnitude > 150.0 {
            TurnDirection::Reverse
        } else if magnitude <= 60.0 {
            if rotation > 0.0 {
                TurnDirection::SlightLeft
            } else {
                TurnDirection::SlightRight
            }
        } else if rotation > 0.0 {
            TurnDirection::Left
        } else {
            TurnDirection::Right
        }
    }

    /// Slight turns can also use lanes marked for the full turn or for going straight.
    pub fn allowed_by(self, lane: EnumSet<TurnDirection>) -> bool {
        if lane.contains(self) {
            return true;
        }
        match self {
            TurnDirection::SlightLeft => {
                lane.contains(TurnDirection::Left) || lane.contains(TurnDirection::Through)
            }
            TurnDirection::SlightRight => {
                lane.contains(TurnDirection::Right) || lane.contains(TurnDirection::Through)
            }
            _ => false,
        }
    }
}

/// Parses a `turn:lanes` value like "left|through;right|" into one set per lane, leftmost first.
/// Empty and "none" entries mean through. Returns None when the number of entries doesn't match
/// the number of lanes.
pub fn parse_turn_lanes(raw: &str, num_lanes: usize) -> Option<Vec<EnumSet<TurnDirection>>> {
    let result: Vec<EnumSet<TurnDirection>> = raw
        .split('|')
        .map(|lane| {
            let mut set: EnumSet<TurnDirection> = lane
                .split(';')
                .filter_map(TurnDirection::parse)
                .collect();
            if set.is_empty() {
                set.insert(TurnDirection::Through);
            }
            set
        })
        .collect();
    if result.len() == num_lanes {
        Some(result)
    } else {
        None
    }
}

/// When nothing is tagged, the leftmost lane may turn left, the rightmost may turn right, and
/// everything may go straight.
pub fn default_turn_lanes(num_lanes: usize) -> Vec<EnumSet<TurnDirection>> {
    (0..num_lanes)
        .map(|idx| {
            let mut set = EnumSet::only(TurnDirection::Through);
            if idx == 0 {
                set |= TurnDirection::Left | TurnDirection::SlightLeft | TurnDirection::Reverse;
            }
            if idx == num_lanes - 1 {
                set |= TurnDirection::Right | TurnDirection::SlightRight;
            }
            set
        })
        .collect()
}
