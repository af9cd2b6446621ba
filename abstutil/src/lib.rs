//! Utilities shared by the geometry and road network crates: a hierarchical `Timer`, OSM-style
//! `Tags`, a few collections, and serde helpers.

#[macro_use]
extern crate log;

mod collections;
pub mod logger;
mod serialization;
mod tags;
mod time;

pub use crate::collections::{wraparound_get, Counter, MultiMap};
pub use crate::serialization::{deserialize_btreemap, serialize_btreemap};
pub use crate::tags::Tags;
pub use crate::time::{elapsed_seconds, prettyprint_time, Timer};

// Thanks https://stackoverflow.com/a/49806368
#[macro_export]
macro_rules! skip_fail {
    ($res:expr) => {
        match $res {
            Some(val) => val,
            None => {
                continue;
            }
        }
    };
}
