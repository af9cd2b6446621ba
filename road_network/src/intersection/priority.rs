use serde::{Deserialize, Serialize};

use crate::types::CollectionID;

/// Who has to yield when arriving at an intersection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    RightOfWay,
    GiveWay,
    Stop,
    /// Every approach has the same rank, so traffic from the right goes first.
    RightBeforeLeft,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApproachPriority {
    pub collection: CollectionID,
    pub rank: i32,
    pub priority: Priority,
}

// Approaches ranked at most this far below the best give way; anything lower has to stop.
const GIVE_WAY_MAX_GAP: i32 = 2;

/// Classifies every incoming collection by its rank relative to the best one.
pub fn assign_priorities(ranks: Vec<(CollectionID, i32)>) -> Vec<ApproachPriority> {
    let (min, max) = match (
        ranks.iter().map(|(_, rank)| *rank).min(),
        ranks.iter().map(|(_, rank)| *rank).max(),
    ) {
        (Some(min), Some(max)) => (min, max),
        _ => {
            return Vec::new();
        }
    };

    ranks
        .into_iter()
        .map(|(collection, rank)| {
            let priority = if min == max {
                Priority::RightBeforeLeft
            } else if rank == max {
                Priority::RightOfWay
            } else if max - rank <= GIVE_WAY_MAX_GAP {
                Priority::GiveWay
            } else {
                Priority::Stop
            };
            ApproachPriority {
                collection,
                rank,
                priority,
            }
        })
        .collect()
}
