use rand::{rngs::StdRng, Rng};

use crate::config::ReplacementPolicy;

use super::CacheSet;

impl ReplacementPolicy {
    /// only LRU refreshes a block on a hit
    pub fn reorders_on_hit(&self) -> bool {
        matches!(self, ReplacementPolicy::Lru)
    }

    /// pick the slot to overwrite on a miss.
    /// validity is ignored, so random may evict while empty slots remain
    pub(super) fn select_victim(&self, set: &CacheSet, rng: &mut StdRng) -> usize {
        match self {
            ReplacementPolicy::Lru | ReplacementPolicy::Fifo => set.tail(),
            ReplacementPolicy::Random => {
                let position = rng.random_range(0..set.associativity());
                set.slot_at(position)
            }
        }
    }
}
