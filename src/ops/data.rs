use log::debug;

use crate::driver::Backing;
use crate::ops::FlatFs;
use crate::util::clock::unix_now;
use crate::util::error::{Error, Result};
use crate::util::mode::ModeBitsHelper;

impl<B: Backing> FlatFs<B> {
    /// Bounds-checked read against the resolved root's block. A short read
    /// is the normal end-of-file signal; only an offset past the stored
    /// size is an error.
    pub fn read(&mut self, path: &str, size: usize, offset: i64) -> Result<Vec<u8>> {
        debug!("read path={:?} size={} offset={}", path, size, offset);
        let index = self.store.table.lookup(path).ok_or(Error::NotFound)?;
        let root = self.store.table.resolve_root(path).ok_or(Error::NotFound)?;
        let node = self.store.table.slot(root);

        if offset < 0 || offset > node.size {
            return Err(Error::OutOfRange);
        }

        let count = (node.size - offset).min(size as i64) as usize;
        let bytes = if node.has_block() && count > 0 {
            let locator = self.store.pool.locator(node.block);
            let start = locator.offset + offset as u64;
            // the additive size accounting can push a logical size past the
            // block, so the copy is clamped to the data region
            let region_end = self.store.geometry.data_offset() + self.store.geometry.data_len();
            let count = count.min(region_end.saturating_sub(start) as usize);
            if count > 0 {
                self.store.read_data(start, count).to_vec()
            } else {
                Vec::new()
            }
        } else {
            Vec::new()
        };

        self.store.table.slot_mut(index).accessed_at = unix_now();
        self.store.flush_slot(index)?;
        Ok(bytes)
    }

    /// Copies into the root's block at `offset`. The stored size
    /// accumulates by the written length on every call rather than
    /// tracking the furthest byte written.
    pub fn write(&mut self, path: &str, data: &[u8], offset: i64) -> Result<usize> {
        debug!("write path={:?} len={} offset={}", path, data.len(), offset);
        let root = self.store.table.resolve_root(path).ok_or(Error::NotFound)?;
        let block_size = self.block_size();
        let node = self.store.table.slot(root);

        if node.mode.owner_bits() & libc::W_OK as u32 == 0 {
            return Err(Error::AccessDenied);
        }
        if offset < 0 || offset as usize > block_size || offset as usize + data.len() > block_size {
            return Err(Error::OutOfRange);
        }
        if !node.has_block() {
            return Err(Error::Invalid);
        }

        let locator = self.store.pool.locator(node.block);
        self.store.write_data(locator.offset + offset as u64, data)?;

        let now = unix_now();
        let node = self.store.table.slot_mut(root);
        node.accessed_at = now;
        node.modified_at = now;
        node.changed_at = now;
        node.size += data.len() as i64;
        self.store.flush_slot(root)?;
        Ok(data.len())
    }
}
