use std::fmt;

use crate::error::{CacheError, CacheResult};

use super::CacheBlock;

/// # CacheSet
/// a fixed group of `associativity` blocks plus their recency order.
/// - `order` holds slot indices, the head (position 0) is the most recently touched
///   or inserted block and the tail is the eviction candidate
/// - blocks never move between slots, only `order` is permuted
#[derive(Debug, Clone)]
pub struct CacheSet {
    pub(super) blocks: Vec<CacheBlock>,
    pub(super) order: Vec<usize>,
}

impl CacheSet {
    pub(super) fn new(associativity: usize, block_size: usize) -> CacheResult<Self> {
        let mut blocks = Vec::new();
        blocks.try_reserve_exact(associativity).map_err(|e| {
            CacheError::Allocation(format!("cannot reserve {associativity} blocks: {e}"))
        })?;
        for _ in 0..associativity {
            blocks.push(CacheBlock::new(block_size)?);
        }
        Ok(CacheSet {
            blocks,
            order: (0..associativity).collect(),
        })
    }

    pub fn associativity(&self) -> usize {
        self.blocks.len()
    }

    /// find the slot holding a valid block with this tag
    pub(super) fn find(&self, tag: u64) -> Option<usize> {
        self.blocks.iter().position(|block| block.matches(tag))
    }

    /// the slot at a position of the recency list
    pub(super) fn slot_at(&self, position: usize) -> usize {
        self.order[position]
    }

    pub(super) fn tail(&self) -> usize {
        self.order[self.order.len() - 1]
    }

    /// move a slot to the head of the recency list
    pub(super) fn move_to_head(&mut self, slot: usize) {
        if self.order[0] == slot {
            return;
        }
        if let Some(position) = self.order.iter().position(|&s| s == slot) {
            self.order.remove(position);
            self.order.insert(0, slot);
        }
    }

    pub fn block(&self, slot: usize) -> &CacheBlock {
        &self.blocks[slot]
    }

    pub(super) fn block_mut(&mut self, slot: usize) -> &mut CacheBlock {
        &mut self.blocks[slot]
    }

    /// blocks from head to tail
    pub fn blocks_in_order(&self) -> impl Iterator<Item = &CacheBlock> {
        self.order.iter().map(move |&slot| &self.blocks[slot])
    }

    pub fn valid_count(&self) -> usize {
        self.blocks.iter().filter(|block| block.is_valid()).count()
    }

    pub(super) fn invalidate(&mut self) {
        self.blocks.iter_mut().for_each(CacheBlock::clear);
    }
}

impl fmt::Display for CacheSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<String> = self
            .blocks_in_order()
            .map(|block| format!("{:X}", block.tag()))
            .collect();
        write!(f, "{}", tags.join(" "))
    }
}
