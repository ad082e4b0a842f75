use crate::consts::SlotIndex;
use crate::driver::Backing;
use crate::store::Store;

mod data;
mod lifecycle;
pub mod meta;

pub use meta::{Attributes, DirEntries};

/// The operation surface the dispatch layer calls into, one method per
/// filesystem request. All operations resolve paths against the single
/// owned store; callers serialize invocations.
pub struct FlatFs<B: Backing> {
    pub(crate) store: Store<B>,
}

impl<B: Backing> FlatFs<B> {
    pub fn new(store: Store<B>) -> FlatFs<B> {
        FlatFs { store }
    }

    pub fn block_size(&self) -> usize {
        self.store.geometry.block_size
    }

    /// Path stored in a slot, if the slot is in range and was ever bound.
    pub fn slot_path(&self, index: SlotIndex) -> Option<&str> {
        if index >= self.store.table.capacity() {
            return None;
        }
        let path = self.store.table.slot(index).path.as_str();
        (!path.is_empty()).then_some(path)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::FlatFs;
    use crate::driver::MemBacking;
    use crate::store::{Geometry, Store};

    pub fn small_geometry() -> Geometry {
        Geometry { inode_capacity: 8, block_count: 8, block_size: 64 }
    }

    pub fn test_fs() -> FlatFs<MemBacking> {
        test_fs_with(small_geometry())
    }

    pub fn test_fs_with(geometry: Geometry) -> FlatFs<MemBacking> {
        let backing = MemBacking::new(geometry.region_size());
        FlatFs::new(Store::format(backing, geometry).unwrap())
    }
}
