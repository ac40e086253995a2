use std::collections::HashMap;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::addr::AllocUnit;
use crate::types::{Addr, BtPageError, Result};

/// Shared borrow of a resident page buffer.
pub type FrameReadGuard<'a> = RwLockReadGuard<'a, Box<[u8]>>;
/// Exclusive borrow of a resident page buffer.
pub type FrameWriteGuard<'a> = RwLockWriteGuard<'a, Box<[u8]>>;

/// Arena index of a resident page. Handles to evicted frames go stale and are
/// rejected even after the slot is reused.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PageHandle {
    index: u32,
    generation: u32,
}

/// Cache-owned description of a resident page.
///
/// Holds only the bookkeeping the cache layer needs; item semantics live in
/// the btree layer's [`crate::storage::btree::PageView`].
pub struct Frame {
    /// Byte offset of the page in its file.
    pub offset: u64,
    /// Allocation address of the page.
    pub addr: Addr,
    /// Page size in bytes.
    pub bytes: u32,
    /// Identifier of the owning file.
    pub file_id: u32,
    /// Number of outstanding pins; a pinned frame cannot be evicted.
    pub pin_count: u32,
    buf: RwLock<Box<[u8]>>,
}

struct Slot {
    generation: u32,
    frame: Option<Frame>,
}

/// Arena of resident page frames addressed by [`PageHandle`].
pub struct FrameArena {
    unit: AllocUnit,
    slots: Vec<Slot>,
    free: Vec<u32>,
    resident: HashMap<(u32, Addr), PageHandle>,
}

impl FrameArena {
    /// Creates an empty arena translating addresses with `unit`.
    pub fn new(unit: AllocUnit) -> Self {
        Self {
            unit,
            slots: Vec::new(),
            free: Vec::new(),
            resident: HashMap::new(),
        }
    }

    /// Number of resident frames.
    pub fn len(&self) -> usize {
        self.resident.len()
    }

    /// Returns `true` when no frame is resident.
    pub fn is_empty(&self) -> bool {
        self.resident.is_empty()
    }

    /// Makes `buf` resident as page `addr` of `file_id`.
    pub fn install(&mut self, file_id: u32, addr: Addr, buf: Box<[u8]>) -> Result<PageHandle> {
        if self.resident.contains_key(&(file_id, addr)) {
            return Err(BtPageError::Invalid("page already resident"));
        }
        let offset = self.unit.to_offset(addr)?;
        let bytes = u32::try_from(buf.len())
            .map_err(|_| BtPageError::OutOfRange("page buffer exceeds 4GB"))?;
        let frame = Frame {
            offset,
            addr,
            bytes,
            file_id,
            pin_count: 0,
            buf: RwLock::new(buf),
        };
        let handle = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.frame = Some(frame);
                PageHandle {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = u32::try_from(self.slots.len())
                    .map_err(|_| BtPageError::OutOfRange("frame arena full"))?;
                self.slots.push(Slot {
                    generation: 0,
                    frame: Some(frame),
                });
                PageHandle {
                    index,
                    generation: 0,
                }
            }
        };
        self.resident.insert((file_id, addr), handle);
        Ok(handle)
    }

    /// Finds the resident frame for `addr` of `file_id`.
    pub fn lookup(&self, file_id: u32, addr: Addr) -> Option<PageHandle> {
        self.resident.get(&(file_id, addr)).copied()
    }

    /// Cache bookkeeping for `handle`.
    pub fn frame(&self, handle: PageHandle) -> Result<&Frame> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.frame.as_ref())
            .ok_or(BtPageError::Invalid("stale page handle"))
    }

    fn frame_mut(&mut self, handle: PageHandle) -> Result<&mut Frame> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.frame.as_mut())
            .ok_or(BtPageError::Invalid("stale page handle"))
    }

    /// Takes a pin on `handle`.
    pub fn pin(&mut self, handle: PageHandle) -> Result<u32> {
        let frame = self.frame_mut(handle)?;
        frame.pin_count = frame
            .pin_count
            .checked_add(1)
            .ok_or(BtPageError::OutOfRange("pin count overflow"))?;
        Ok(frame.pin_count)
    }

    /// Releases a pin on `handle`.
    pub fn unpin(&mut self, handle: PageHandle) -> Result<u32> {
        let frame = self.frame_mut(handle)?;
        frame.pin_count = frame
            .pin_count
            .checked_sub(1)
            .ok_or(BtPageError::Invalid("page is not pinned"))?;
        Ok(frame.pin_count)
    }

    /// Shared access to the page bytes. Any view built from the guard borrows
    /// the arena, so the frame cannot be evicted while it lives.
    pub fn read(&self, handle: PageHandle) -> Result<FrameReadGuard<'_>> {
        Ok(self.frame(handle)?.buf.read())
    }

    /// Exclusive access to the page bytes for header rewrites and insertion.
    pub fn write(&self, handle: PageHandle) -> Result<FrameWriteGuard<'_>> {
        Ok(self.frame(handle)?.buf.write())
    }

    /// Removes an unpinned frame and hands its buffer back to the caller.
    pub fn evict(&mut self, handle: PageHandle) -> Result<Box<[u8]>> {
        if self.frame(handle)?.pin_count > 0 {
            return Err(BtPageError::Invalid("page is pinned"));
        }
        let slot = &mut self.slots[handle.index as usize];
        let frame = slot
            .frame
            .take()
            .ok_or(BtPageError::Invalid("stale page handle"))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.resident.remove(&(frame.file_id, frame.addr));
        Ok(frame.buf.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> FrameArena {
        FrameArena::new(AllocUnit::new(512).expect("valid unit"))
    }

    #[test]
    fn install_records_cache_fields() -> Result<()> {
        let mut arena = arena();
        let handle = arena.install(3, Addr(4), vec![0u8; 1024].into_boxed_slice())?;
        let frame = arena.frame(handle)?;
        assert_eq!(frame.offset, 2048);
        assert_eq!(frame.bytes, 1024);
        assert_eq!(frame.file_id, 3);
        assert_eq!(arena.lookup(3, Addr(4)), Some(handle));
        assert!(arena.install(3, Addr(4), vec![0u8; 8].into_boxed_slice()).is_err());
        Ok(())
    }

    #[test]
    fn pinned_frames_cannot_be_evicted() -> Result<()> {
        let mut arena = arena();
        let handle = arena.install(0, Addr(1), vec![7u8; 512].into_boxed_slice())?;
        assert_eq!(arena.pin(handle)?, 1);
        assert!(matches!(
            arena.evict(handle),
            Err(BtPageError::Invalid("page is pinned"))
        ));
        assert_eq!(arena.unpin(handle)?, 0);
        assert!(arena.unpin(handle).is_err());
        let buf = arena.evict(handle)?;
        assert_eq!(buf[0], 7);
        assert!(arena.is_empty());
        Ok(())
    }

    #[test]
    fn handles_go_stale_after_eviction() -> Result<()> {
        let mut arena = arena();
        let first = arena.install(0, Addr(1), vec![0u8; 512].into_boxed_slice())?;
        arena.evict(first)?;
        let second = arena.install(0, Addr(2), vec![1u8; 512].into_boxed_slice())?;
        assert!(arena.frame(first).is_err());
        assert_eq!(arena.frame(second)?.addr, Addr(2));
        assert_eq!(arena.len(), 1);
        Ok(())
    }

    #[test]
    fn write_guard_mutates_buffer() -> Result<()> {
        let mut arena = arena();
        let handle = arena.install(0, Addr(0), vec![0u8; 512].into_boxed_slice())?;
        arena.write(handle)?[10] = 0xAB;
        assert_eq!(arena.read(handle)?[10], 0xAB);
        Ok(())
    }
}
