use enum_as_inner::EnumAsInner;
use serde::{Deserialize, Serialize};

use crate::config::CacheConfig;

/// Get the len in bits of a power of two.
pub(self) fn get_bit_lens(size: u64) -> u32 {
    let mut len: u32 = 0;
    let mut temp = size;
    while temp > 1 {
        temp /= 2;
        len += 1;
    }
    len
}

/// The bit split of an address, derived once from the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub offset_bits: u32,
    pub index_bits: u32,
    pub tag_bits: u32,
    pub offset_mask: u64,
    pub index_mask: u64,
}

impl Geometry {
    /// the config must already be validated
    pub(crate) fn new(config: &CacheConfig) -> Self {
        let offset_bits = get_bit_lens(config.block_size as u64);
        let index_bits = get_bit_lens(config.num_sets as u64);
        Geometry {
            offset_bits,
            index_bits,
            tag_bits: config
                .address_width
                .saturating_sub(offset_bits + index_bits),
            offset_mask: (1 << offset_bits) - 1,
            index_mask: (1 << index_bits) - 1,
        }
    }

    /// return the tag, the index of the set and the offset in the block
    pub fn decode(&self, addr: u64) -> (u64, usize, usize) {
        let offset = addr & self.offset_mask;
        let index = (addr >> self.offset_bits) & self.index_mask;
        let tag = addr >> (self.offset_bits + self.index_bits);
        (tag, index as usize, offset as usize)
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum AccessKind {
    Read,
    Write,
}

/// the outcome of a lookup, carrying the tag of the line
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumAsInner)]
pub enum AccessResult {
    Hit(u64),
    Miss(u64),
}

/// the outcome of a forced fill of a resident line
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumAsInner)]
pub enum FillResult {
    Found,
    NotFound,
}

mod block;
mod policy;
mod set;
mod set_assoc_cache;
pub use block::CacheBlock;
pub use set::CacheSet;
pub use set_assoc_cache::{Cache, CacheSnapshot};
