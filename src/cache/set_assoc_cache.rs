use rand::{rngs::StdRng, SeedableRng};

use crate::{
    config::CacheConfig,
    error::{CacheError, CacheResult},
    statistics::{CacheReport, CacheStatistics},
};

use super::{AccessKind, AccessResult, CacheSet, FillResult, Geometry};

/// # Cache
/// a set-associative cache with fixed hit and miss latencies.
/// - all `num_sets * associativity` blocks are allocated in `new` and never resized
/// - the random generator is seeded once here and only drawn from afterwards
/// - driven by a single access stream, every call runs to completion
#[derive(Debug)]
pub struct Cache {
    config: CacheConfig,
    geometry: Geometry,
    sets: Vec<CacheSet>,
    statistics: CacheStatistics,
    rng: StdRng,
}

/// the block metadata and recency order of every set, without payloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSnapshot {
    geometry: Geometry,
    associativity: usize,
    sets: Vec<SetSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SetSnapshot {
    order: Vec<usize>,
    /// (valid, dirty, tag) per slot
    blocks: Vec<(bool, bool, u64)>,
}

impl Cache {
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(config, rng)
    }

    /// build the cache with a caller supplied generator for the random policy
    pub fn with_rng(config: CacheConfig, rng: StdRng) -> CacheResult<Self> {
        config.validate()?;
        let geometry = Geometry::new(&config);
        let mut sets = Vec::new();
        sets.try_reserve_exact(config.num_sets).map_err(|e| {
            CacheError::Allocation(format!("cannot reserve {} sets: {e}", config.num_sets))
        })?;
        for _ in 0..config.num_sets {
            sets.push(CacheSet::new(config.associativity, config.block_size)?);
        }
        tracing::debug!(
            name = %config.name,
            num_sets = config.num_sets,
            associativity = config.associativity,
            block_size = config.block_size,
            policy = ?config.policy,
            tag_bits = geometry.tag_bits,
            "cache initialized"
        );
        Ok(Cache {
            config,
            geometry,
            sets,
            statistics: CacheStatistics::default(),
            rng,
        })
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }
    pub fn statistics(&self) -> &CacheStatistics {
        &self.statistics
    }
    pub fn sets(&self) -> &[CacheSet] {
        &self.sets
    }

    /// look the tag up in its set, installing it on a miss.
    /// returns the result and the slot now holding the line
    fn lookup(&mut self, current_cycle: u64, tag: u64, index: usize) -> (AccessResult, usize) {
        self.statistics.update_access();
        let policy = self.config.policy;
        let set = &mut self.sets[index];

        if let Some(slot) = set.find(tag) {
            if policy.reorders_on_hit() {
                set.move_to_head(slot);
            }
            tracing::trace!(cache = %self.config.name, tag, index, slot, "hit");
            return (AccessResult::Hit(tag), slot);
        }

        let slot = policy.select_victim(set, &mut self.rng);
        tracing::trace!(
            cache = %self.config.name,
            tag,
            index,
            slot,
            evicted = set.block(slot).is_valid(),
            "miss"
        );
        set.block_mut(slot).mark_resident(tag);
        set.move_to_head(slot);
        self.statistics
            .update_miss(current_cycle, self.config.miss_latency);
        (AccessResult::Miss(tag), slot)
    }

    /// metadata-only access, returns the latency it costs
    pub fn access(&mut self, current_cycle: u64, kind: AccessKind, addr: u64) -> u64 {
        let (tag, index, _) = self.geometry.decode(addr);
        tracing::trace!(cycle = current_cycle, ?kind, addr, "access");
        match self.lookup(current_cycle, tag, index).0 {
            AccessResult::Hit(_) => self.config.hit_latency,
            AccessResult::Miss(_) => self.config.miss_latency,
        }
    }

    /// access that also moves `buffer.len()` bytes at the block offset of `addr`.
    /// - bytes only move on a hit, a miss installs the tag and waits for `force_update`
    /// - a write marks the block dirty
    /// - a span past the end of the block is rejected before anything changes
    pub fn access_with_data(
        &mut self,
        current_cycle: u64,
        kind: AccessKind,
        addr: u64,
        buffer: &mut [u8],
    ) -> CacheResult<AccessResult> {
        let (tag, index, offset) = self.geometry.decode(addr);
        if offset + buffer.len() > self.config.block_size {
            tracing::warn!(cache = %self.config.name, addr, size = buffer.len(), "transfer crosses the block");
            return Err(CacheError::SpanOutOfBlock {
                offset,
                size: buffer.len(),
                block_size: self.config.block_size,
            });
        }
        let (result, slot) = self.lookup(current_cycle, tag, index);
        if result.as_hit().is_some() {
            let block = self.sets[index].block_mut(slot);
            match kind {
                AccessKind::Write => {
                    block.write_bytes(offset, buffer);
                    block.mark_dirty();
                }
                AccessKind::Read => block.read_bytes(offset, buffer),
            }
        }
        Ok(result)
    }

    /// overwrite the whole payload of a resident line, leaving recency and validity alone.
    /// the line is clean afterwards. counts as an access but never as a miss
    pub fn force_update(
        &mut self,
        current_cycle: u64,
        addr: u64,
        buffer: &[u8],
    ) -> CacheResult<FillResult> {
        if buffer.len() != self.config.block_size {
            return Err(CacheError::BufferSize {
                expected: self.config.block_size,
                actual: buffer.len(),
            });
        }
        let (tag, index, _) = self.geometry.decode(addr);
        self.statistics.update_access();
        let set = &mut self.sets[index];
        match set.find(tag) {
            Some(slot) => {
                let block = set.block_mut(slot);
                block.write_bytes(0, buffer);
                block.clear_dirty();
                Ok(FillResult::Found)
            }
            None => {
                tracing::warn!(
                    cache = %self.config.name,
                    cycle = current_cycle,
                    addr,
                    "force update on a line that is not resident"
                );
                Ok(FillResult::NotFound)
            }
        }
    }

    /// clear every block, tags and statistics are kept
    pub fn invalidate_all(&mut self) {
        self.sets.iter_mut().for_each(CacheSet::invalidate);
        tracing::debug!(cache = %self.config.name, "all blocks invalidated");
    }

    pub fn report(&self) -> CacheReport {
        let report = CacheReport::new(&self.config.name, &self.statistics);
        tracing::info!(
            cache = %report.name,
            num_access = report.num_access,
            num_miss = report.num_miss,
            num_miss_clustered = report.num_miss_clustered,
            "cache report"
        );
        report
    }

    /// tear the cache down, handing back the final counters
    pub fn close(self) -> CacheReport {
        CacheReport::new(&self.config.name, &self.statistics)
    }

    /// the tags of one set from the most to the least recent
    pub fn set_tags(&self, index: usize) -> Option<Vec<u64>> {
        self.sets
            .get(index)
            .map(|set| set.blocks_in_order().map(|block| block.tag()).collect())
    }

    #[must_use]
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            geometry: self.geometry,
            associativity: self.config.associativity,
            sets: self
                .sets
                .iter()
                .map(|set| SetSnapshot {
                    order: set.order.clone(),
                    blocks: set
                        .blocks
                        .iter()
                        .map(|block| (block.valid, block.dirty, block.tag))
                        .collect(),
                })
                .collect(),
        }
    }

    /// copy the block metadata and recency order of `snapshot` into this cache.
    /// payloads and statistics are left as they are
    pub fn restore(&mut self, snapshot: &CacheSnapshot) -> CacheResult<()> {
        if snapshot.geometry != self.geometry
            || snapshot.associativity != self.config.associativity
            || snapshot.sets.len() != self.sets.len()
        {
            return Err(CacheError::GeometryMismatch);
        }
        for (set, saved) in self.sets.iter_mut().zip(&snapshot.sets) {
            set.order.clone_from(&saved.order);
            for (block, &(valid, dirty, tag)) in set.blocks.iter_mut().zip(&saved.blocks) {
                block.valid = valid;
                block.dirty = dirty;
                block.tag = tag;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use crate::{config::ReplacementPolicy, test_utils};

    use super::*;

    /// one set, two ways, 4 byte blocks: every multiple of 4 is its own tag
    fn single_set(policy: ReplacementPolicy) -> Cache {
        Cache::new(CacheConfig::new("test", 1, 4, 2, policy, 1, 10).with_seed(5)).unwrap()
    }

    fn is_resident(cache: &Cache, addr: u64) -> bool {
        let (tag, index, _) = cache.geometry().decode(addr);
        cache.sets()[index].find(tag).is_some()
    }

    #[test]
    fn test_rejects_bad_config() {
        test_utils::init();
        let config = CacheConfig::new("bad", 3, 4, 2, ReplacementPolicy::Lru, 1, 10);
        assert!(matches!(
            Cache::new(config),
            Err(CacheError::InvalidConfig(_))
        ));
        let config = CacheConfig::new("bad", 4, 4, 0, ReplacementPolicy::Lru, 1, 10);
        assert!(Cache::new(config).is_err());
    }

    #[test]
    fn test_hit_and_miss_latency() {
        test_utils::init();
        let mut cache = single_set(ReplacementPolicy::Lru);
        assert_eq!(cache.access(0, AccessKind::Read, 0), 10);
        assert_eq!(cache.access(1, AccessKind::Read, 1), 1);
        assert_eq!(cache.access(2, AccessKind::Write, 3), 1);
        assert_eq!(cache.statistics().num_access, 3);
        assert_eq!(cache.statistics().num_miss, 1);
    }

    #[test]
    fn test_lru_evicts_least_recent() {
        test_utils::init();
        let mut cache = single_set(ReplacementPolicy::Lru);
        let (a, b, c) = (0, 4, 8);
        cache.access(0, AccessKind::Read, a);
        cache.access(1, AccessKind::Read, b);
        assert_eq!(cache.access(2, AccessKind::Read, a), 1);
        assert_eq!(cache.access(3, AccessKind::Read, c), 10);
        assert!(is_resident(&cache, a));
        assert!(!is_resident(&cache, b));
        assert!(is_resident(&cache, c));
        assert_eq!(cache.set_tags(0), Some(vec![2, 0]));
    }

    #[test]
    fn test_fifo_ignores_hits() {
        test_utils::init();
        let mut cache = single_set(ReplacementPolicy::Fifo);
        let (a, b, c) = (0, 4, 8);
        cache.access(0, AccessKind::Read, a);
        cache.access(1, AccessKind::Read, b);
        assert_eq!(cache.access(2, AccessKind::Read, a), 1);
        assert_eq!(cache.access(3, AccessKind::Read, c), 10);
        assert!(!is_resident(&cache, a));
        assert!(is_resident(&cache, b));
        assert!(is_resident(&cache, c));
    }

    #[test]
    fn test_first_misses_fill_empty_slots() {
        let mut cache = single_set(ReplacementPolicy::Lru);
        cache.access(0, AccessKind::Read, 0);
        cache.access(0, AccessKind::Read, 4);
        assert_eq!(cache.sets()[0].valid_count(), 2);
    }

    fn check_invariants(policy: ReplacementPolicy) {
        let config = CacheConfig::new("stress", 4, 16, 4, policy, 2, 20).with_seed(17);
        let mut cache = Cache::new(config).unwrap();
        for i in 0..2000u64 {
            let addr = (i * 7919) % 4096;
            cache.access(i, AccessKind::Read, addr);
            // the line just touched is always resident
            assert!(is_resident(&cache, addr));
        }
        for set in cache.sets() {
            assert_eq!(set.associativity(), 4);
            assert_eq!(set.order.len(), 4);
            let mut order = set.order.clone();
            order.sort_unstable();
            assert_eq!(order, vec![0, 1, 2, 3]);
            assert!(set.valid_count() <= 4);
            let mut tags: Vec<u64> = set
                .blocks
                .iter()
                .filter(|block| block.is_valid())
                .map(|block| block.tag())
                .collect();
            let len = tags.len();
            tags.sort_unstable();
            tags.dedup();
            assert_eq!(tags.len(), len);
        }
    }

    #[test]
    fn test_invariants_hold_for_every_policy() {
        test_utils::init();
        for policy in [
            ReplacementPolicy::Lru,
            ReplacementPolicy::Fifo,
            ReplacementPolicy::Random,
        ] {
            check_invariants(policy);
        }
    }

    #[test]
    fn test_evicted_dirty_line_does_not_leak() {
        test_utils::init();
        // one set, one way: every new tag evicts the previous line
        let config = CacheConfig::new("dirty", 1, 4, 1, ReplacementPolicy::Lru, 1, 10);
        let mut cache = Cache::new(config).unwrap();
        let mut buffer = [1u8; 2];
        cache
            .access_with_data(0, AccessKind::Write, 0, &mut buffer)
            .unwrap();
        cache
            .access_with_data(1, AccessKind::Write, 0, &mut buffer)
            .unwrap();
        assert!(cache.sets()[0].block(0).is_dirty());

        assert_eq!(cache.access(2, AccessKind::Read, 4), 10);
        let block = cache.sets()[0].block(0);
        assert_eq!(block.tag(), 1);
        assert!(!block.is_dirty());
    }

    #[test]
    fn test_force_update_cleans_line() {
        let config = CacheConfig::new("dirty", 1, 4, 1, ReplacementPolicy::Lru, 1, 10);
        let mut cache = Cache::new(config).unwrap();
        let mut buffer = [1u8; 4];
        cache
            .access_with_data(0, AccessKind::Write, 0, &mut buffer)
            .unwrap();
        cache
            .access_with_data(1, AccessKind::Write, 0, &mut buffer)
            .unwrap();
        assert!(cache.sets()[0].block(0).is_dirty());
        assert!(cache
            .force_update(2, 0, &[5, 6, 7, 8])
            .unwrap()
            .is_found());
        assert!(!cache.sets()[0].block(0).is_dirty());
        assert_eq!(cache.sets()[0].block(0).data(), &[5, 6, 7, 8]);
    }

    #[test]
    fn test_random_is_reproducible_with_seed() {
        let run = || {
            let config =
                CacheConfig::new("rand", 2, 4, 4, ReplacementPolicy::Random, 1, 10).with_seed(3);
            let mut cache = Cache::new(config).unwrap();
            for i in 0..500u64 {
                cache.access(i, AccessKind::Read, (i * 13) % 256);
            }
            cache.close()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_clustered_miss_counting() {
        let mut cache = single_set(ReplacementPolicy::Lru);
        cache.access(0, AccessKind::Read, 0);
        cache.access(5, AccessKind::Read, 4);
        assert_eq!(cache.statistics().num_miss, 2);
        assert_eq!(cache.statistics().num_miss_clustered, 1);
        cache.access(25, AccessKind::Read, 8);
        assert_eq!(cache.statistics().num_miss, 3);
        assert_eq!(cache.statistics().num_miss_clustered, 2);
        // hits never touch the window
        cache.access(26, AccessKind::Read, 8);
        assert_eq!(cache.statistics().cycle_of_last_miss, Some(25));
    }

    #[test]
    fn test_data_round_trip() {
        test_utils::init();
        let config = CacheConfig::new("data", 4, 16, 2, ReplacementPolicy::Lru, 1, 10);
        let mut cache = Cache::new(config).unwrap();
        let addr = 0x1234;
        let mut buffer = [0u8; 4];
        // the first touch only installs the line
        let result = cache
            .access_with_data(0, AccessKind::Write, addr, &mut buffer)
            .unwrap();
        assert!(result.as_miss().is_some());

        let mut written = [0xde, 0xad, 0xbe, 0xef];
        let result = cache
            .access_with_data(1, AccessKind::Write, addr, &mut written)
            .unwrap();
        assert!(result.as_hit().is_some());

        let mut read = [0u8; 4];
        let result = cache
            .access_with_data(2, AccessKind::Read, addr, &mut read)
            .unwrap();
        assert!(result.as_hit().is_some());
        assert_eq!(read, [0xde, 0xad, 0xbe, 0xef]);

        let (tag, index, _) = cache.geometry().decode(addr);
        let slot = cache.sets()[index].find(tag).unwrap();
        assert!(cache.sets()[index].block(slot).is_dirty());
        assert_eq!(cache.statistics().num_access, 3);
        assert_eq!(cache.statistics().num_miss, 1);
    }

    #[test]
    fn test_access_with_data_rejects_crossing_span() {
        let config = CacheConfig::new("data", 4, 16, 2, ReplacementPolicy::Lru, 1, 10);
        let mut cache = Cache::new(config).unwrap();
        let mut buffer = [0u8; 8];
        let err = cache
            .access_with_data(0, AccessKind::Read, 0x0c, &mut buffer)
            .unwrap_err();
        assert_eq!(
            err,
            CacheError::SpanOutOfBlock {
                offset: 12,
                size: 8,
                block_size: 16
            }
        );
        assert_eq!(cache.statistics().num_access, 0);
        assert!(!is_resident(&cache, 0x0c));
    }

    #[test]
    fn test_force_update_then_read() {
        test_utils::init();
        let config = CacheConfig::new("fill", 4, 8, 2, ReplacementPolicy::Lru, 1, 10);
        let mut cache = Cache::new(config).unwrap();
        let addr = 0x40;
        cache.access(0, AccessKind::Read, addr);
        let tags_before = cache.set_tags(0);

        let line = [1, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(
            cache.force_update(1, addr, &line).unwrap(),
            FillResult::Found
        );
        assert_eq!(cache.set_tags(0), tags_before);

        let mut read = [0u8; 8];
        let result = cache
            .access_with_data(2, AccessKind::Read, addr, &mut read)
            .unwrap();
        assert!(result.as_hit().is_some());
        assert_eq!(read, line);
        assert_eq!(cache.statistics().num_miss, 1);
        assert_eq!(cache.statistics().num_access, 3);
    }

    #[test]
    fn test_force_update_not_resident() {
        let config = CacheConfig::new("fill", 4, 8, 2, ReplacementPolicy::Lru, 1, 10);
        let mut cache = Cache::new(config).unwrap();
        let line = [0u8; 8];
        assert!(cache.force_update(0, 0x80, &line).unwrap().is_not_found());
        assert!(!is_resident(&cache, 0x80));
        assert_eq!(cache.statistics().num_miss, 0);
        assert_eq!(
            cache.force_update(0, 0x80, &line[..4]),
            Err(CacheError::BufferSize {
                expected: 8,
                actual: 4
            })
        );
    }

    #[test]
    fn test_invalidate_all() {
        test_utils::init();
        let config = CacheConfig::new("inv", 8, 16, 2, ReplacementPolicy::Fifo, 1, 10);
        let mut cache = Cache::new(config).unwrap();
        let addrs: Vec<u64> = (0..16).map(|i| i * 16).collect();
        for (cycle, &addr) in addrs.iter().enumerate() {
            cache.access(cycle as u64, AccessKind::Read, addr);
        }
        let mut buffer = [9u8; 1];
        cache
            .access_with_data(100, AccessKind::Write, addrs[0], &mut buffer)
            .unwrap();
        let before = cache.statistics().clone();
        let tags_before = cache.set_tags(0);

        cache.invalidate_all();
        assert_eq!(cache.statistics(), &before);
        assert_eq!(cache.set_tags(0), tags_before);
        assert!(cache
            .sets()
            .iter()
            .all(|set| set.blocks_in_order().all(|b| !b.is_valid() && !b.is_dirty())));

        for &addr in &addrs {
            assert_eq!(cache.access(1000, AccessKind::Read, addr), 10);
        }
    }

    #[test]
    fn test_report_and_close() {
        test_utils::init();
        let mut cache = single_set(ReplacementPolicy::Lru);
        cache.access(0, AccessKind::Read, 0);
        cache.access(1, AccessKind::Read, 0);
        let report = cache.report();
        assert_eq!(report.name, "test");
        assert_eq!(report.num_access, 2);
        assert_eq!(report.num_miss, 1);
        assert_eq!(report.num_miss_clustered, 1);
        assert_eq!(cache.close(), report);
    }

    #[test]
    fn test_snapshot_restore() {
        let mut source = single_set(ReplacementPolicy::Lru);
        source.access(0, AccessKind::Read, 0);
        source.access(1, AccessKind::Read, 4);
        let snapshot = source.snapshot();

        let mut target = single_set(ReplacementPolicy::Lru);
        target.restore(&snapshot).unwrap();
        assert_eq!(target.set_tags(0), source.set_tags(0));
        assert_eq!(target.access(2, AccessKind::Read, 0), 1);
        assert_eq!(target.access(3, AccessKind::Read, 4), 1);
        // statistics are not copied
        assert_eq!(target.statistics().num_miss, 0);

        let mut other = Cache::new(CacheConfig::new(
            "other",
            2,
            4,
            2,
            ReplacementPolicy::Lru,
            1,
            10,
        ))
        .unwrap();
        assert_eq!(other.restore(&snapshot), Err(CacheError::GeometryMismatch));
    }

    #[test]
    fn test_restore_rejects_other_block_size() {
        let mut wide = Cache::new(CacheConfig::new(
            "wide",
            1,
            64,
            2,
            ReplacementPolicy::Lru,
            1,
            10,
        ))
        .unwrap();
        wide.access(0, AccessKind::Read, 0x40);
        let snapshot = wide.snapshot();

        let mut narrow = single_set(ReplacementPolicy::Lru);
        let tags_before = narrow.set_tags(0);
        assert_eq!(narrow.restore(&snapshot), Err(CacheError::GeometryMismatch));
        assert_eq!(narrow.set_tags(0), tags_before);
    }

    #[test]
    fn test_set_tags_out_of_range() {
        let cache = single_set(ReplacementPolicy::Fifo);
        assert_eq!(cache.set_tags(0).map(|tags| tags.len()), Some(2));
        assert_eq!(cache.set_tags(1), None);
    }
}
