//! Session tallies. Only the dispatch transitions update these.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStats {
    pub trains_managed: u32,
    /// Successful departures.
    pub collisions_avoided: u32,
    pub near_misses: u32,
}

impl SessionStats {
    pub(crate) fn record_assignment(&mut self, near_miss: bool) {
        self.trains_managed += 1;
        if near_miss {
            self.near_misses += 1;
        }
    }

    pub(crate) fn record_departure(&mut self) {
        self.collisions_avoided += 1;
    }
}
