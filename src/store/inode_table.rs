use log::warn;

use crate::consts::SlotIndex;
use crate::store::inode::Inode;

pub struct InodeTable {
    slots: Vec<Inode>,
}

impl InodeTable {
    pub fn new(capacity: usize) -> InodeTable {
        InodeTable { slots: vec![Inode::empty(); capacity] }
    }

    pub fn from_slots(slots: Vec<Inode>) -> InodeTable {
        InodeTable { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, index: SlotIndex) -> &Inode {
        &self.slots[index]
    }

    pub fn slot_mut(&mut self, index: SlotIndex) -> &mut Inode {
        &mut self.slots[index]
    }

    pub fn slots(&self) -> &[Inode] {
        &self.slots
    }

    /// Linear scan for an exact path match. Free slots are excluded by
    /// their empty path.
    pub fn lookup(&self, path: &str) -> Option<SlotIndex> {
        self.slots
            .iter()
            .position(|node| !node.path.is_empty() && node.path == path)
    }

    /// Follows alias slots to the non-alias slot holding the data. Each hop
    /// re-resolves the target by its current path, so an alias whose target
    /// was renamed follows the rename. Bounded by the table capacity to
    /// terminate on a malformed reference chain.
    pub fn resolve_root(&self, path: &str) -> Option<SlotIndex> {
        let mut index = self.lookup(path)?;
        let mut hops = 0;
        while let Some(target) = self.slots[index].alias_target() {
            hops += 1;
            if hops > self.slots.len() {
                warn!("alias chain starting at {:?} does not terminate", path);
                return None;
            }
            let target_path = &self.slots.get(target)?.path;
            index = self.lookup(target_path)?;
        }
        Some(index)
    }

    pub fn free_slot(&self) -> Option<SlotIndex> {
        self.slots.iter().position(Inode::is_free)
    }
}
