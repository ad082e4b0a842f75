use log::debug;

use crate::consts::{PATH_CAPACITY, SlotIndex};
use crate::driver::Backing;
use crate::ops::FlatFs;
use crate::store::inode::Inode;
use crate::store::ROOT_PATH;
use crate::util::clock::unix_now;
use crate::util::error::{Error, Result};
use crate::util::mode::ModeBitsHelper;

/// Fixed metadata record for one path. uid/gid are those of the invoking
/// process; nothing per-entry is stored for them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attributes {
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
    pub links: u32,
    pub size: i64,
    pub accessed_at: i64,
    pub modified_at: i64,
    pub changed_at: i64,
    pub slot: SlotIndex,
}

impl<B: Backing> FlatFs<B> {
    pub fn access(&self, path: &str, mask: i32) -> Result<()> {
        debug!("access path={:?} mask={:#o}", path, mask);
        let index = self.store.table.lookup(path).ok_or(Error::NotFound)?;
        if mask == libc::F_OK {
            return Ok(());
        }
        let owner = self.store.table.slot(index).mode.owner_bits();
        if owner & mask as u32 != mask as u32 {
            return Err(Error::AccessDenied);
        }
        Ok(())
    }

    pub fn get_attributes(&self, path: &str) -> Result<Attributes> {
        debug!("get_attributes path={:?}", path);
        let index = self.store.table.lookup(path).ok_or(Error::NotFound)?;
        let node = self.store.table.slot(index);

        // size queries resolve through the root; blockless entries report 0
        let size = match self.store.table.resolve_root(path) {
            Some(root) => {
                let root_node = self.store.table.slot(root);
                if root_node.has_block() { root_node.size } else { 0 }
            }
            None => 0,
        };

        Ok(Attributes {
            uid: unsafe { libc::getuid() },
            gid: unsafe { libc::getgid() },
            mode: node.mode,
            links: node.references.max(0) as u32,
            size,
            accessed_at: node.accessed_at,
            modified_at: node.modified_at,
            changed_at: node.changed_at,
            slot: index,
        })
    }

    pub fn set_mode(&mut self, path: &str, mode: u32) -> Result<()> {
        debug!("set_mode path={:?} mode={:#o}", path, mode);
        let index = self.store.table.lookup(path).ok_or(Error::NotFound)?;
        let node = self.store.table.slot_mut(index);
        node.mode = mode;
        node.changed_at = unix_now();
        self.store.flush_slot(index)
    }

    /// Mirrors `utimens`: both timestamps are set explicitly, and the
    /// change time tracks the modification time.
    pub fn set_times(&mut self, path: &str, accessed: i64, modified: i64) -> Result<()> {
        debug!("set_times path={:?}", path);
        let index = self.store.table.lookup(path).ok_or(Error::NotFound)?;
        let node = self.store.table.slot_mut(index);
        node.accessed_at = accessed;
        node.modified_at = modified;
        node.changed_at = modified;
        self.store.flush_slot(index)
    }

    /// Overwrites the path field in place. A colliding destination path is
    /// not checked for.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        debug!("rename from={:?} to={:?}", from, to);
        if to.len() > PATH_CAPACITY {
            return Err(Error::NameTooLong);
        }
        let index = self.store.table.lookup(from).ok_or(Error::NotFound)?;
        let node = self.store.table.slot_mut(index);
        node.path = to.to_string();
        node.changed_at = unix_now();
        self.store.flush_slot(index)
    }

    /// Enumerates the flat namespace. Only the root path is a directory
    /// anyone can list; every deeper path component is exposed as a single
    /// opaque name under it.
    pub fn read_dir(&self, path: &str) -> Result<DirEntries<'_>> {
        debug!("read_dir path={:?}", path);
        if path != ROOT_PATH {
            return Err(Error::NotFound);
        }
        self.store.table.lookup(path).ok_or(Error::NotFound)?;
        Ok(DirEntries::new(self.store.table.slots(), path.to_string()))
    }
}

/// Lazy, restartable walk over the names under a directory path: the
/// synthetic `.` and `..`, then the suffix of every bound path that
/// strictly extends the prefix.
pub struct DirEntries<'a> {
    slots: &'a [Inode],
    prefix: String,
    synthetic: usize,
    cursor: usize,
}

impl<'a> DirEntries<'a> {
    fn new(slots: &'a [Inode], prefix: String) -> DirEntries<'a> {
        DirEntries { slots, prefix, synthetic: 0, cursor: 0 }
    }
}

impl Iterator for DirEntries<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.synthetic < 2 {
            self.synthetic += 1;
            return Some([".", ".."][self.synthetic - 1].to_string());
        }
        while self.cursor < self.slots.len() {
            let node = &self.slots[self.cursor];
            self.cursor += 1;
            if node.path.len() > self.prefix.len() && node.path.starts_with(&self.prefix) {
                return Some(node.path[self.prefix.len()..].to_string());
            }
        }
        None
    }
}
