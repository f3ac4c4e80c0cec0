use crate::error::{CacheError, CacheResult};

/// # CacheBlock
/// one storage slot of a set.
/// - allocated once when the cache is built and reused in place
/// - `valid` gates every lookup, so clearing leaves the stale tag behind
#[derive(Debug, Clone)]
pub struct CacheBlock {
    pub(super) valid: bool,
    pub(super) dirty: bool,
    pub(super) tag: u64,
    pub(super) data: Vec<u8>,
}

impl CacheBlock {
    pub(super) fn new(block_size: usize) -> CacheResult<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(block_size).map_err(|e| {
            CacheError::Allocation(format!("cannot reserve a {block_size} byte block: {e}"))
        })?;
        data.resize(block_size, 0);
        Ok(CacheBlock {
            valid: false,
            dirty: false,
            tag: 0,
            data,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
    pub fn tag(&self) -> u64 {
        self.tag
    }
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(super) fn matches(&self, tag: u64) -> bool {
        self.valid && self.tag == tag
    }

    /// a freshly filled line starts clean
    pub(super) fn mark_resident(&mut self, tag: u64) {
        self.valid = true;
        self.dirty = false;
        self.tag = tag;
    }

    pub(super) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(super) fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub(super) fn read_bytes(&self, offset: usize, buffer: &mut [u8]) {
        buffer.copy_from_slice(&self.data[offset..offset + buffer.len()]);
    }

    pub(super) fn write_bytes(&mut self, offset: usize, buffer: &[u8]) {
        self.data[offset..offset + buffer.len()].copy_from_slice(buffer);
    }

    pub(super) fn clear(&mut self) {
        self.valid = false;
        self.dirty = false;
    }
}
