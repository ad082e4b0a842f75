pub(crate) const INODE_CAPACITY: usize = 255;
pub(crate) const BLOCK_COUNT: usize = 256;
pub(crate) const DATA_REGION_SIZE: u64 = 1024 * 1024;
pub(crate) const BLOCK_SIZE: usize = (DATA_REGION_SIZE / BLOCK_COUNT as u64) as usize;
pub(crate) const PATH_CAPACITY: usize = 255;

pub type SlotIndex = usize;
pub type BlockIndex = u32;
