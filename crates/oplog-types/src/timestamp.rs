//! The oplog logical clock.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::sequence::SequenceKey;

/// Position of an entry in the oplog: wall-clock seconds plus an ordinal
/// increment that restarts every second.
///
/// Ordering is by `secs` first, then `inc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    pub secs: u32,
    pub inc: u32,
}

impl Timestamp {
    pub fn new(secs: u32, inc: u32) -> Self {
        Self { secs, inc }
    }
}

impl SequenceKey for Timestamp {
    // Increments are only contiguous within one second; a new second carries
    // no information about how many entries the previous one held.
    fn skips_after(&self, prev: &Self) -> bool {
        self.secs == prev.secs && self.inc > prev.inc.saturating_add(1)
    }
}

impl From<bson::Timestamp> for Timestamp {
    fn from(ts: bson::Timestamp) -> Self {
        Self {
            secs: ts.time,
            inc: ts.increment,
        }
    }
}

impl From<Timestamp> for bson::Timestamp {
    fn from(ts: Timestamp) -> Self {
        bson::Timestamp {
            time: ts.secs,
            increment: ts.inc,
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.secs, self.inc)
    }
}
