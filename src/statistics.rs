use std::fmt;

use serde::{Deserialize, Serialize};

/// running counters of one cache
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct CacheStatistics {
    pub num_access: u64,
    pub num_miss: u64,
    /// misses that start a new miss window, overlapping misses are folded in
    pub num_miss_clustered: u64,
    /// the cycle of the last miss that opened a window
    pub cycle_of_last_miss: Option<u64>,
}

impl CacheStatistics {
    pub fn update_access(&mut self) {
        self.num_access += 1;
    }

    /// record a miss at `current_cycle`.
    /// a miss only opens a new window when it lands more than `miss_latency`
    /// cycles after the last window was opened; a clock behind that window also opens one
    pub fn update_miss(&mut self, current_cycle: u64, miss_latency: u64) {
        self.num_miss += 1;
        let new_window = match self.cycle_of_last_miss {
            None => true,
            Some(last) => current_cycle
                .checked_sub(last)
                .map_or(true, |gap| gap > miss_latency),
        };
        if new_window {
            self.num_miss_clustered += 1;
            self.cycle_of_last_miss = Some(current_cycle);
        }
    }

    pub fn num_hit(&self) -> u64 {
        self.num_access.saturating_sub(self.num_miss)
    }

    pub fn hit_rate(&self) -> f64 {
        if self.num_access == 0 {
            0.0
        } else {
            self.num_hit() as f64 / self.num_access as f64
        }
    }
}

/// what `Cache::report` hands back
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CacheReport {
    pub name: String,
    pub num_access: u64,
    pub num_miss: u64,
    pub num_miss_clustered: u64,
}

impl CacheReport {
    pub fn new(name: &str, statistics: &CacheStatistics) -> Self {
        CacheReport {
            name: name.to_string(),
            num_access: statistics.num_access,
            num_miss: statistics.num_miss,
            num_miss_clustered: statistics.num_miss_clustered,
        }
    }

    pub fn hit_rate(&self) -> f64 {
        if self.num_access == 0 {
            0.0
        } else {
            self.num_access.saturating_sub(self.num_miss) as f64 / self.num_access as f64
        }
    }
}

impl fmt::Display for CacheReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--------------")?;
        writeln!(f, "Cache {}", self.name)?;
        writeln!(f, "--------------")?;
        writeln!(f, "num_access: {}", self.num_access)?;
        writeln!(f, "num_miss: {}", self.num_miss)?;
        writeln!(f, "num_miss_star: {}", self.num_miss_clustered)
    }
}
