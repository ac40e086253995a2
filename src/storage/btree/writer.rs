use crate::primitives::pager::{write_descriptor, Descriptor};
use crate::storage::btree::item::{footprint, write_item, ItemType};
use crate::storage::btree::page::{
    self, first_item_offset, PageHeader, PageType, LEAF_LEVEL, PAGE_HDR_LEN,
};
use crate::storage::btree::refs::{OffPageRef, OverflowRef};
use crate::types::{Addr, BtPageError, Result};

/// Appends items to a fresh page buffer and seals it.
///
/// The writer tracks the first free byte and the remaining space; item
/// placement order is the caller's responsibility and must already be the
/// sort order the btree layer relies on.
pub struct PageWriter<'a> {
    buf: &'a mut [u8],
    addr: Addr,
    header: PageHeader,
    entries: u32,
    first_free: usize,
}

impl<'a> PageWriter<'a> {
    /// Zeroes `buf` and prepares it as the page at `addr` described by
    /// `header`. Any entry count in `header` is reset to zero.
    pub fn new(buf: &'a mut [u8], addr: Addr, mut header: PageHeader) -> Result<Self> {
        if !header.kind.holds_entries() {
            return Err(BtPageError::Invalid(
                "overflow pages are written with write_overflow_page",
            ));
        }
        let first_free = first_item_offset(addr);
        if buf.len() < first_free {
            return Err(BtPageError::Invalid("page buffer smaller than its fixed prefix"));
        }
        header.set_entries(0)?;
        buf.fill(0);
        Ok(Self {
            buf,
            addr,
            header,
            entries: 0,
            first_free,
        })
    }

    /// Stores the database descriptor; only valid for the first leaf page,
    /// which always lives at address 0.
    pub fn with_descriptor(self, desc: &Descriptor) -> Result<Self> {
        if self.addr != Addr::FIRST_PAGE {
            return Err(BtPageError::Invalid("descriptor belongs on the first page"));
        }
        if self.header.kind != PageType::Leaf || self.header.level != LEAF_LEVEL {
            return Err(BtPageError::Invalid("the first page must be a leaf"));
        }
        write_descriptor(self.buf, desc)?;
        Ok(self)
    }

    /// Page offset of the first unused byte.
    pub fn first_free(&self) -> usize {
        self.first_free
    }

    /// Bytes left for items.
    pub fn space_avail(&self) -> usize {
        self.buf.len() - self.first_free
    }

    /// Items written so far.
    pub fn entries(&self) -> u32 {
        self.entries
    }

    /// Appends an item and returns its page offset.
    ///
    /// Oversized payloads fail with `ItemTooLarge` and items that do not fit
    /// with `Invalid`; neither writes any byte.
    pub fn push(&mut self, kind: ItemType, payload: &[u8]) -> Result<usize> {
        let entries = self
            .entries
            .checked_add(1)
            .ok_or(BtPageError::OutOfRange("entry count overflow"))?;
        let offset = self.first_free;
        let used = write_item(&mut self.buf[offset..], kind, payload)?;
        debug_assert_eq!(used, footprint(payload.len() as u32));
        self.first_free += used;
        self.entries = entries;
        Ok(offset)
    }

    /// Appends an on-page key.
    pub fn push_key(&mut self, key: &[u8]) -> Result<usize> {
        self.push(ItemType::Key, key)
    }

    /// Appends on-page data.
    pub fn push_data(&mut self, data: &[u8]) -> Result<usize> {
        self.push(ItemType::Data, data)
    }

    /// Appends an on-page duplicate.
    pub fn push_dup(&mut self, data: &[u8]) -> Result<usize> {
        self.push(ItemType::Dup, data)
    }

    /// Appends an off-page subtree reference.
    pub fn push_offpage(&mut self, child: &OffPageRef) -> Result<usize> {
        self.push(ItemType::OffPage, &child.encode())
    }

    /// Appends an overflow reference as a key, data, or duplicate item.
    pub fn push_overflow(&mut self, kind: ItemType, ovfl: &OverflowRef) -> Result<usize> {
        if !kind.is_overflow() {
            return Err(BtPageError::Invalid("not an overflow item type"));
        }
        self.push(kind, &ovfl.encode())
    }

    /// Writes the header, computes the checksum, and returns the final header.
    pub fn finish(mut self) -> Result<PageHeader> {
        self.header.set_entries(self.entries)?;
        self.header.checksum = 0;
        self.header.encode(self.buf)?;
        self.header.checksum = page::seal_page(self.buf)?;
        Ok(self.header)
    }
}

/// Builds a sealed overflow page holding `data`.
pub fn write_overflow_page(buf: &mut [u8], data: &[u8]) -> Result<PageHeader> {
    let len = u32::try_from(data.len())
        .map_err(|_| BtPageError::OutOfRange("overflow data exceeds 4GB"))?;
    let end = PAGE_HDR_LEN + data.len();
    if buf.len() < end {
        return Err(BtPageError::Invalid("overflow data does not fit the page"));
    }
    buf.fill(0);
    let mut header = PageHeader::overflow(len);
    header.encode(buf)?;
    buf[PAGE_HDR_LEN..end].copy_from_slice(data);
    header.checksum = page::seal_page(buf)?;
    Ok(header)
}
