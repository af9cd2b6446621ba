use std::collections::BTreeSet;

use geom::{Distance, PolyLine};

use super::classify::{bridge_base, tunnel_base};
use crate::config::NetworkConfig;
use crate::intersection::Intersection;
use crate::lanes::{Endpoint, LaneCollection};
use crate::pipeline::StageContext;
use crate::registry::TileRegistry;
use crate::tile::Tile;
use crate::types::{CollectionID, ElevationID, IntersectionID};

/// Where only bridges meet, the intersection sits at the average of their decks. Likewise for
/// tunnels. Anywhere else it's on the ground.
pub(crate) fn resolved_height(tile: &Tile, i: &Intersection, cfg: &NetworkConfig) -> Distance {
    let mut bridges = Vec::new();
    let mut tunnels = Vec::new();
    let mut roads: BTreeSet<CollectionID> = BTreeSet::new();
    for (id, _) in &i.ring {
        let c = tile.get_collection(*id);
        // Both directions of one road count once
        let road = c.other.map(|o| o.min(c.id)).unwrap_or(c.id);
        if !roads.insert(road) {
            continue;
        }
        let ch = &c.characteristics;
        if ch.bridge {
            bridges.push(bridge_base(ch, cfg));
        } else if ch.tunnel {
            tunnels.push(tunnel_base(ch, cfg));
        } else {
            return Distance::ZERO;
        }
    }

    let average = |heights: Vec<Distance>| {
        let n = heights.len() as f64;
        heights.into_iter().sum::<Distance>() / n
    };
    match (bridges.is_empty(), tunnels.is_empty()) {
        (false, true) => average(bridges),
        (true, false) => average(tunnels),
        _ => Distance::ZERO,
    }
}

pub(crate) fn intersection_height(
    tile: &Tile,
    id: IntersectionID,
    cfg: &NetworkConfig,
) -> (Distance, Option<ElevationID>) {
    let i = tile.get_intersection(id);
    let height = resolved_height(tile, i, cfg);
    if height == Distance::ZERO {
        return (height, None);
    }
    let elevation = i
        .ring
        .iter()
        .find_map(|(c, _)| tile.get_collection(*c).elevation);
    (height, elevation)
}

// The height at one end of a collection: whatever its intersection settled on, wherever that
// was built. Ends without one stay on the ground.
fn end_height(
    tile: &Tile,
    registry: &TileRegistry,
    c: &LaneCollection,
    endpoint: Endpoint,
    cfg: &NetworkConfig,
) -> Distance {
    c.intersection_at(endpoint)
        .and_then(|r| {
            let owner = if r.tile == tile.coord {
                tile
            } else {
                registry.get(r.tile)?
            };
            owner
                .intersection_at(r.node)
                .map(|i| resolved_height(owner, i, cfg))
        })
        .unwrap_or(Distance::ZERO)
}

/// Heights along a collection: level with its start, then a straight ramp over the last stretch
/// when the end sits at a different height.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RampProfile {
    length: Distance,
    start: Distance,
    end: Distance,
    ramp: Distance,
}

impl RampProfile {
    /// The ramp is at most `max_ramp` long, and never longer than the collection. Ends closer
    /// than `epsilon` don't ramp at all.
    pub fn new(
        length: Distance,
        start: Distance,
        end: Distance,
        max_ramp: Distance,
        epsilon: Distance,
    ) -> RampProfile {
        let ramp = if (end - start).abs() > epsilon {
            max_ramp.min(length).max(Distance::ZERO)
        } else {
            Distance::ZERO
        };
        RampProfile {
            length,
            start,
            end,
            ramp,
        }
    }

    pub fn height_at(&self, dist: Distance) -> Distance {
        if self.ramp == Distance::ZERO {
            return self.start;
        }
        let dist = dist.max(Distance::ZERO).min(self.length);
        // Measured inward from the far end
        let from_end = self.length - dist;
        if from_end >= self.ramp {
            self.start
        } else {
            self.end + (self.start - self.end) * (from_end / self.ramp)
        }
    }
}

/// The profile for one collection, given the heights at both its ends.
pub fn ramp_profile(
    c: &LaneCollection,
    start: Distance,
    end: Distance,
    cfg: &NetworkConfig,
) -> RampProfile {
    RampProfile::new(
        c.length(),
        start,
        end,
        cfg.max_ramp_length,
        cfg.height_epsilon,
    )
}

// Outlines are offset from the reference, so their lengths differ a little. Measure each one
// proportionally.
fn heights_along(pl: &PolyLine, length: Distance, profile: &RampProfile) -> Vec<Distance> {
    let total = pl.length();
    pl.cumulative_dists()
        .into_iter()
        .map(|dist| {
            let scaled = if total > Distance::ZERO {
                length * (dist / total)
            } else {
                Distance::ZERO
            };
            profile.height_at(scaled)
        })
        .collect()
}

pub(crate) fn apply_heights(tile: &mut Tile, id: CollectionID, ctx: &mut StageContext) {
    let c = tile.get_collection(id);
    let start = end_height(tile, ctx.registry, c, Endpoint::Start, ctx.cfg);
    let end = end_height(tile, ctx.registry, c, Endpoint::End, ctx.cfg);
    let profile = ramp_profile(c, start, end, ctx.cfg);
    let length = c.length();
    let left = heights_along(&c.left.pts, length, &profile);
    let right = heights_along(&c.right.pts, length, &profile);

    let c = tile.mut_collection(id);
    c.left.heights = left;
    c.right.heights = right;
}
