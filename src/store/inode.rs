use crate::consts::{BlockIndex, PATH_CAPACITY, SlotIndex};

const PATH_FIELD: usize = PATH_CAPACITY + 1;

pub(crate) const RECORD_SIZE: usize = PATH_FIELD + 4 + 4 + 1 + 4 + 4 + 8 + 8 + 8 + 8;

/// Unset block locator. Directories and aliases carry no data block.
pub const NO_BLOCK: BlockIndex = BlockIndex::MAX;

/// Logical size stored on alias slots. Never read directly; size queries
/// for an alias go through the resolved root.
pub const ALIAS_SIZE: i64 = -1;

#[derive(Debug, Clone, PartialEq)]
pub struct Inode {
    pub path: String,
    pub mode: u32,
    pub references: i32,
    pub is_link: bool,
    pub link_target: u32,
    pub block: BlockIndex,
    pub size: i64,
    pub accessed_at: i64,
    pub modified_at: i64,
    pub changed_at: i64,
}

impl Inode {
    pub fn empty() -> Inode {
        Inode {
            path: String::new(),
            mode: 0,
            references: 0,
            is_link: false,
            link_target: 0,
            block: NO_BLOCK,
            size: 0,
            accessed_at: 0,
            modified_at: 0,
            changed_at: 0,
        }
    }

    // A slot is reusable once its path was never set or its mode was cleared.
    pub fn is_free(&self) -> bool {
        self.path.is_empty() || self.mode == 0
    }

    pub fn has_block(&self) -> bool {
        self.block != NO_BLOCK
    }

    pub fn alias_target(&self) -> Option<SlotIndex> {
        self.is_link.then_some(self.link_target as SlotIndex)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = vec![0u8; PATH_FIELD];
        buffer[..self.path.len()].copy_from_slice(self.path.as_bytes());
        buffer.extend_from_slice(&self.mode.to_le_bytes());
        buffer.extend_from_slice(&self.references.to_le_bytes());
        buffer.push(self.is_link as u8);
        buffer.extend_from_slice(&self.link_target.to_le_bytes());
        buffer.extend_from_slice(&self.block.to_le_bytes());
        buffer.extend_from_slice(&self.size.to_le_bytes());
        buffer.extend_from_slice(&self.accessed_at.to_le_bytes());
        buffer.extend_from_slice(&self.modified_at.to_le_bytes());
        buffer.extend_from_slice(&self.changed_at.to_le_bytes());
        buffer
    }

    pub fn from_bytes(bytes: &[u8]) -> Inode {
        let path_len = bytes[..PATH_FIELD]
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(PATH_CAPACITY);
        let path = String::from_utf8_lossy(&bytes[..path_len]).into_owned();

        let mut cursor = Cursor { bytes, at: PATH_FIELD };
        let mode = u32::from_le_bytes(cursor.take());
        let references = i32::from_le_bytes(cursor.take());
        let is_link = cursor.take::<1>()[0] != 0;
        let link_target = u32::from_le_bytes(cursor.take());
        let block = u32::from_le_bytes(cursor.take());
        let size = i64::from_le_bytes(cursor.take());
        let accessed_at = i64::from_le_bytes(cursor.take());
        let modified_at = i64::from_le_bytes(cursor.take());
        let changed_at = i64::from_le_bytes(cursor.take());

        Inode {
            path,
            mode,
            references,
            is_link,
            link_target,
            block,
            size,
            accessed_at,
            modified_at,
            changed_at,
        }
    }
}

struct Cursor<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl Cursor<'_> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut field = [0u8; N];
        field.copy_from_slice(&self.bytes[self.at..self.at + N]);
        self.at += N;
        field
    }
}
