use log::debug;

use crate::consts::PATH_CAPACITY;
use crate::driver::Backing;
use crate::ops::FlatFs;
use crate::store::inode::{Inode, ALIAS_SIZE, NO_BLOCK};
use crate::util::clock::unix_now;
use crate::util::error::{Error, Result};
use crate::util::mode::ModeBitsHelper;

impl<B: Backing> FlatFs<B> {
    /// Claims an inode slot and a data block for a fresh entry. The slot
    /// check runs first, so slot exhaustion reports even when blocks
    /// remain.
    pub fn create(&mut self, path: &str, mode: u32) -> Result<()> {
        debug!("create path={:?} mode={:#o}", path, mode);
        if path.len() > PATH_CAPACITY {
            return Err(Error::NameTooLong);
        }
        let index = self.store.table.free_slot().ok_or(Error::Exhausted)?;
        let locator = self.store.pool.allocate().ok_or(Error::Exhausted)?;

        let now = unix_now();
        *self.store.table.slot_mut(index) = Inode {
            path: path.to_string(),
            mode,
            references: 1,
            is_link: false,
            link_target: 0,
            block: locator.index,
            size: 0,
            accessed_at: now,
            modified_at: now,
            changed_at: now,
        };
        self.store.flush_bitmap()?;
        self.store.flush_slot(index)
    }

    /// Binds `dst` as a hard-link alias of `src`. The alias slot carries
    /// no block and a sentinel size; every data and size query goes
    /// through the resolved root. Directories cannot be linked.
    pub fn link(&mut self, src: &str, dst: &str) -> Result<()> {
        debug!("link src={:?} dst={:?}", src, dst);
        if dst.len() > PATH_CAPACITY {
            return Err(Error::NameTooLong);
        }
        let src_index = self.store.table.lookup(src).ok_or(Error::NotFound)?;
        if self.store.table.slot(src_index).references <= 0 {
            return Err(Error::NotFound);
        }
        if self.store.table.slot(src_index).mode.is_directory() {
            return Err(Error::NotPermitted);
        }
        let dst_index = self.store.table.free_slot().ok_or(Error::Exhausted)?;

        self.store.table.slot_mut(src_index).references += 1;
        self.store.flush_slot(src_index)?;

        let now = unix_now();
        let mode = self.store.table.slot(src_index).mode;
        *self.store.table.slot_mut(dst_index) = Inode {
            path: dst.to_string(),
            mode,
            references: 1,
            is_link: true,
            link_target: src_index as u32,
            block: NO_BLOCK,
            size: ALIAS_SIZE,
            accessed_at: now,
            modified_at: now,
            changed_at: now,
        };
        self.store.flush_slot(dst_index)
    }

    /// Drops one reference from the entry at `path`. Unlinking an alias
    /// charges the root's count instead. The data block is released only
    /// on an unlink that finds the count already at 0, and the slot is
    /// reclaimed later by slot allocation once its mode is cleared.
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        debug!("unlink path={:?}", path);
        let index = self.store.table.lookup(path).ok_or(Error::NotFound)?;

        if self.store.table.slot(index).is_link {
            let root = self.store.table.resolve_root(path).ok_or(Error::NotFound)?;
            self.store.table.slot_mut(root).references -= 1;
            self.store.flush_slot(root)?;
        } else if self.store.table.slot(index).references == 0 {
            let block = self.store.table.slot(index).block;
            if block != NO_BLOCK {
                self.store.pool.free(block);
                self.store.flush_bitmap()?;
            }
            let node = self.store.table.slot_mut(index);
            node.block = NO_BLOCK;
            node.size = 0;
        }

        let node = self.store.table.slot_mut(index);
        node.mode = 0;
        node.accessed_at = 0;
        node.modified_at = 0;
        node.changed_at = 0;
        node.references -= 1;
        self.store.flush_slot(index)
    }

    /// Sets the logical size directly, unlike write's additive accounting.
    pub fn truncate(&mut self, path: &str, size: i64) -> Result<()> {
        debug!("truncate path={:?} size={}", path, size);
        let root = self.store.table.resolve_root(path).ok_or(Error::NotFound)?;
        if !self.store.table.slot(root).has_block() {
            return Err(Error::Invalid);
        }
        if size < 0 || size as usize > self.block_size() {
            return Err(Error::OutOfRange);
        }
        self.store.table.slot_mut(root).size = size;
        self.store.flush_slot(root)
    }
}

#[cfg(test)]
mod tests {
    use crate::ops::testing::{small_geometry, test_fs, test_fs_with};
    use crate::util::error::Error;

    #[test]
    fn create_then_stat_reports_fresh_entry() {
        let mut fs = test_fs();
        fs.create("/f", 0o100644).unwrap();

        let attrs = fs.get_attributes("/f").unwrap();
        assert_eq!(attrs.mode, 0o100644);
        assert_eq!(attrs.size, 0);
        assert!(fs.access("/f", libc::F_OK).is_ok());
    }

    #[test]
    fn slot_exhaustion_reports_before_block_exhaustion() {
        let mut fs = test_fs_with(crate::store::Geometry {
            inode_capacity: 4,
            block_count: 8,
            block_size: 64,
        });

        // two slots are taken by the seeded entries
        fs.create("/a", 0o100644).unwrap();
        fs.create("/b", 0o100644).unwrap();
        assert!(matches!(fs.create("/c", 0o100644), Err(Error::Exhausted)));
    }

    #[test]
    fn block_exhaustion_fails_create() {
        let mut fs = test_fs_with(crate::store::Geometry {
            inode_capacity: 8,
            block_count: 3,
            block_size: 64,
        });

        // the seed file holds one of the three blocks
        fs.create("/a", 0o100644).unwrap();
        fs.create("/b", 0o100644).unwrap();
        assert!(matches!(fs.create("/c", 0o100644), Err(Error::Exhausted)));
    }

    #[test]
    fn link_counts_references_on_the_root() {
        let mut fs = test_fs();
        fs.create("/f", 0o100644).unwrap();
        fs.link("/f", "/alias").unwrap();

        assert_eq!(fs.get_attributes("/f").unwrap().links, 2);
        assert_eq!(fs.get_attributes("/alias").unwrap().links, 1);
    }

    #[test]
    fn link_rejects_directories() {
        let mut fs = test_fs();
        assert!(matches!(fs.link("/", "/root-alias"), Err(Error::NotPermitted)));
        assert!(matches!(fs.link("/missing", "/alias"), Err(Error::NotFound)));
    }

    #[test]
    fn unlink_alias_charges_the_root() {
        let mut fs = test_fs();
        fs.create("/f", 0o100644).unwrap();
        fs.write("/f", b"abcd", 0).unwrap();
        fs.link("/f", "/alias").unwrap();

        fs.unlink("/alias").unwrap();
        assert_eq!(fs.get_attributes("/f").unwrap().links, 1);
        assert_eq!(fs.read("/f", 4, 0).unwrap(), b"abcd");
    }

    #[test]
    fn block_release_requires_a_second_unlink() {
        let mut fs = test_fs();
        fs.create("/f", 0o100644).unwrap();

        let block = {
            let slot = fs.store.table.lookup("/f").unwrap();
            fs.store.table.slot(slot).block
        };
        assert!(fs.store.pool.is_used(block));

        // first unlink only drops the count to the floor
        fs.unlink("/f").unwrap();
        assert!(fs.store.pool.is_used(block));

        // the path is still bound, and the next unlink finds the count
        // already at 0 and releases the block
        fs.unlink("/f").unwrap();
        assert!(fs.store.pool.is_free(block));
    }

    #[test]
    fn unlinked_slot_is_reclaimed_by_create() {
        let mut fs = test_fs_with(crate::store::Geometry {
            inode_capacity: 3,
            block_count: 8,
            block_size: 64,
        });

        fs.create("/a", 0o100644).unwrap();
        assert!(matches!(fs.create("/b", 0o100644), Err(Error::Exhausted)));

        fs.unlink("/a").unwrap();
        fs.create("/b", 0o100644).unwrap();
        assert!(fs.access("/b", libc::F_OK).is_ok());
    }

    #[test]
    fn released_block_is_reclaimed_by_create() {
        let mut fs = test_fs_with(crate::store::Geometry {
            inode_capacity: 16,
            block_count: 3,
            block_size: 64,
        });

        fs.create("/a", 0o100644).unwrap();
        fs.create("/b", 0o100644).unwrap();
        assert!(matches!(fs.create("/c", 0o100644), Err(Error::Exhausted)));

        fs.unlink("/a").unwrap();
        fs.unlink("/a").unwrap();
        fs.create("/c", 0o100644).unwrap();
        assert!(fs.access("/c", libc::F_OK).is_ok());
    }

    #[test]
    fn truncate_overwrites_the_size() {
        let mut fs = test_fs();
        fs.create("/f", 0o100644).unwrap();
        assert_eq!(fs.write("/f", b"abcd", 0).unwrap(), 4);
        assert_eq!(fs.read("/f", 10, 0).unwrap(), b"abcd");

        fs.truncate("/f", 2).unwrap();
        assert_eq!(fs.get_attributes("/f").unwrap().size, 2);
        assert_eq!(fs.read("/f", 10, 0).unwrap(), b"ab");
    }

    #[test]
    fn truncate_bounds_and_blockless_cases() {
        let mut fs = test_fs();
        let block_size = small_geometry().block_size;
        fs.create("/f", 0o100644).unwrap();

        assert!(matches!(fs.truncate("/f", block_size as i64 + 1), Err(Error::OutOfRange)));
        assert!(matches!(fs.truncate("/", 0), Err(Error::Invalid)));
        assert!(matches!(fs.truncate("/missing", 0), Err(Error::NotFound)));
    }

    #[test]
    fn truncate_through_an_alias_resizes_the_root() {
        let mut fs = test_fs();
        fs.create("/f", 0o100644).unwrap();
        fs.write("/f", b"abcd", 0).unwrap();
        fs.link("/f", "/alias").unwrap();

        fs.truncate("/alias", 1).unwrap();
        assert_eq!(fs.get_attributes("/f").unwrap().size, 1);
    }
}
