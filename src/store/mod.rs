use log::info;

use crate::consts::{BLOCK_COUNT, BLOCK_SIZE, INODE_CAPACITY, SlotIndex};
use crate::driver::Backing;
use crate::store::block_pool::BlockPool;
use crate::store::inode::{Inode, NO_BLOCK, RECORD_SIZE};
use crate::store::inode_table::InodeTable;
use crate::util::clock::unix_now;
use crate::util::error::{Error, Result};

pub mod block_pool;
pub mod inode;
pub mod inode_table;

pub(crate) const ROOT_PATH: &str = "/";

const ROOT_MODE: u32 = 0o40755;
const SEED_FILE_PATH: &str = "/hello.txt";
const SEED_FILE_MODE: u32 = 0o100777;
const SEED_FILE_CONTENT: &[u8] = b"hello\n";

/// Capacities and block size of a store region. The serialized layout is
/// `[ inode table | block bitmap | data region ]`, addressed by offset
/// from the region base.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub inode_capacity: usize,
    pub block_count: usize,
    pub block_size: usize,
}

impl Default for Geometry {
    fn default() -> Geometry {
        Geometry {
            inode_capacity: INODE_CAPACITY,
            block_count: BLOCK_COUNT,
            block_size: BLOCK_SIZE,
        }
    }
}

impl Geometry {
    pub fn table_len(&self) -> u64 {
        (self.inode_capacity * RECORD_SIZE) as u64
    }

    pub fn bitmap_len(&self) -> u64 {
        self.block_count.div_ceil(8) as u64
    }

    pub fn bitmap_offset(&self) -> u64 {
        self.table_len()
    }

    pub fn data_offset(&self) -> u64 {
        self.table_len() + self.bitmap_len()
    }

    pub fn data_len(&self) -> u64 {
        (self.block_count * self.block_size) as u64
    }

    pub fn region_size(&self) -> u64 {
        self.data_offset() + self.data_len()
    }

    fn slot_offset(&self, index: SlotIndex) -> u64 {
        (index * RECORD_SIZE) as u64
    }
}

/// The mounted region: inode table, block bitmap and data region, held in
/// memory and written through to the backing at the layout offsets.
pub struct Store<B: Backing> {
    backing: B,
    pub(crate) geometry: Geometry,
    pub(crate) table: InodeTable,
    pub(crate) pool: BlockPool,
    data: Vec<u8>,
}

impl<B: Backing> Store<B> {
    /// Initializes a fresh region and seeds the root directory and the
    /// default `/hello.txt` entry.
    pub fn format(backing: B, geometry: Geometry) -> Result<Store<B>> {
        if backing.len() != geometry.region_size() {
            return Err(Error::Corrupted(format!(
                "backing holds {} bytes, geometry needs {}",
                backing.len(),
                geometry.region_size()
            )));
        }

        let mut store = Store {
            backing,
            geometry,
            table: InodeTable::new(geometry.inode_capacity),
            pool: BlockPool::new(geometry.block_count, geometry.block_size, geometry.data_offset()),
            data: vec![0; geometry.data_len() as usize],
        };
        for index in 0..geometry.inode_capacity {
            store.flush_slot(index)?;
        }
        store.flush_bitmap()?;
        store.seed()?;
        info!(
            "formatted store: {} slots, {} blocks of {} bytes",
            geometry.inode_capacity, geometry.block_count, geometry.block_size
        );
        Ok(store)
    }

    /// Loads an existing region verbatim.
    pub fn mount(backing: B, geometry: Geometry) -> Result<Store<B>> {
        if backing.len() != geometry.region_size() {
            return Err(Error::Corrupted(format!(
                "backing holds {} bytes, geometry needs {}",
                backing.len(),
                geometry.region_size()
            )));
        }

        let mut slots = Vec::with_capacity(geometry.inode_capacity);
        let mut record = vec![0u8; RECORD_SIZE];
        for index in 0..geometry.inode_capacity {
            backing.read_at(geometry.slot_offset(index), &mut record)?;
            slots.push(Inode::from_bytes(&record));
        }

        let mut bits = vec![0u8; geometry.bitmap_len() as usize];
        backing.read_at(geometry.bitmap_offset(), &mut bits)?;

        let mut data = vec![0u8; geometry.data_len() as usize];
        backing.read_at(geometry.data_offset(), &mut data)?;

        info!("mounted store with {} slots", geometry.inode_capacity);
        Ok(Store {
            backing,
            geometry,
            table: InodeTable::from_slots(slots),
            pool: BlockPool::from_bits(bits, geometry.block_count, geometry.block_size, geometry.data_offset()),
            data,
        })
    }

    fn seed(&mut self) -> Result<()> {
        let now = unix_now();

        let root = self.table.free_slot().ok_or(Error::Exhausted)?;
        *self.table.slot_mut(root) = Inode {
            path: ROOT_PATH.to_string(),
            mode: ROOT_MODE,
            references: 1,
            is_link: false,
            link_target: 0,
            block: NO_BLOCK,
            size: 0,
            accessed_at: now,
            modified_at: now,
            changed_at: now,
        };
        self.flush_slot(root)?;

        let file = self.table.free_slot().ok_or(Error::Exhausted)?;
        let locator = self.pool.allocate().ok_or(Error::Exhausted)?;
        *self.table.slot_mut(file) = Inode {
            path: SEED_FILE_PATH.to_string(),
            mode: SEED_FILE_MODE,
            references: 1,
            is_link: false,
            link_target: 0,
            block: locator.index,
            size: SEED_FILE_CONTENT.len() as i64,
            accessed_at: now,
            modified_at: now,
            changed_at: now,
        };
        self.write_data(locator.offset, SEED_FILE_CONTENT)?;
        self.flush_bitmap()?;
        self.flush_slot(file)?;
        info!("seeded {:?} and {:?}", ROOT_PATH, SEED_FILE_PATH);
        Ok(())
    }

    pub(crate) fn flush_slot(&mut self, index: SlotIndex) -> Result<()> {
        let record = self.table.slot(index).to_bytes();
        self.backing.write_at(self.geometry.slot_offset(index), &record)?;
        Ok(())
    }

    pub(crate) fn flush_bitmap(&mut self) -> Result<()> {
        self.backing.write_at(self.geometry.bitmap_offset(), self.pool.bits())?;
        Ok(())
    }

    pub(crate) fn write_data(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        let start = (offset - self.geometry.data_offset()) as usize;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        self.backing.write_at(offset, bytes)?;
        Ok(())
    }

    pub(crate) fn read_data(&self, offset: u64, len: usize) -> &[u8] {
        let start = (offset - self.geometry.data_offset()) as usize;
        &self.data[start..start + len]
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{Geometry, Store, SEED_FILE_CONTENT};
    use crate::driver::file_backing::FileBacking;
    use crate::driver::MemBacking;
    use crate::util::error::Error;

    fn small_geometry() -> Geometry {
        Geometry { inode_capacity: 8, block_count: 8, block_size: 64 }
    }

    fn image_path(name: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("flatfs_{}_{}.img", name, std::process::id()));
        let _ = fs::remove_file(&path);
        path
    }

    #[test]
    fn format_seeds_root_and_hello() {
        let geometry = small_geometry();
        let store = Store::format(MemBacking::new(geometry.region_size()), geometry).unwrap();

        let root = store.table.lookup("/").unwrap();
        assert!(!store.table.slot(root).has_block());
        assert_eq!(store.table.slot(root).references, 1);

        let hello = store.table.lookup("/hello.txt").unwrap();
        let node = store.table.slot(hello);
        assert_eq!(node.size, SEED_FILE_CONTENT.len() as i64);
        let locator = store.pool.locator(node.block);
        assert_eq!(store.read_data(locator.offset, SEED_FILE_CONTENT.len()), SEED_FILE_CONTENT);
    }

    #[test]
    fn format_rejects_misized_backing() {
        let geometry = small_geometry();
        let result = Store::format(MemBacking::new(1234), geometry);
        assert!(matches!(result, Err(Error::Corrupted(_))));
    }

    #[test]
    fn mount_reads_region_back_verbatim() {
        let geometry = small_geometry();
        let path = image_path("store_remount");
        {
            let backing = FileBacking::create(&path, geometry.region_size()).unwrap();
            Store::format(backing, geometry).unwrap();
        }

        let store = Store::mount(FileBacking::open(&path).unwrap(), geometry).unwrap();
        let hello = store.table.lookup("/hello.txt").unwrap();
        let node = store.table.slot(hello);
        assert_eq!(node.size, SEED_FILE_CONTENT.len() as i64);
        assert!(store.pool.is_used(node.block));
        let locator = store.pool.locator(node.block);
        assert_eq!(store.read_data(locator.offset, SEED_FILE_CONTENT.len()), SEED_FILE_CONTENT);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn slot_mutations_write_through_to_backing() {
        let geometry = small_geometry();
        let path = image_path("store_write_through");
        {
            let backing = FileBacking::create(&path, geometry.region_size()).unwrap();
            let mut store = Store::format(backing, geometry).unwrap();
            let hello = store.table.lookup("/hello.txt").unwrap();
            store.table.slot_mut(hello).size = 2;
            store.flush_slot(hello).unwrap();
        }

        let store = Store::mount(FileBacking::open(&path).unwrap(), geometry).unwrap();
        let hello = store.table.lookup("/hello.txt").unwrap();
        assert_eq!(store.table.slot(hello).size, 2);
        let _ = fs::remove_file(&path);
    }
}
