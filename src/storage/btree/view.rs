use crate::storage::btree::index::PageIndex;
use crate::storage::btree::item::ItemIter;
use crate::storage::btree::page::{self, PageHeader, PageType, PAGE_HDR_LEN};
use crate::types::{Addr, Result};

/// Btree-owned view of a resident page.
///
/// Built from bytes borrowed out of a frame (see
/// [`crate::primitives::pager::FrameArena::read`]); the borrow pins the
/// buffer for as long as the view and its index are alive.
#[derive(Clone, Debug)]
pub struct PageView<'g> {
    addr: Addr,
    bytes: &'g [u8],
    header: PageHeader,
    index: PageIndex<'g>,
    first_free: usize,
    space_avail: usize,
    records: u64,
}

impl<'g> PageView<'g> {
    /// Verifies the checksum of `bytes` and indexes its items.
    pub fn load(bytes: &'g [u8], addr: Addr) -> Result<Self> {
        let header = page::verify_page(bytes)?;
        Self::build(bytes, addr, header)
    }

    /// Indexes `bytes` without checking the checksum, for pages the caller
    /// has just written or verified itself.
    pub fn load_unverified(bytes: &'g [u8], addr: Addr) -> Result<Self> {
        let header = PageHeader::decode(bytes)?;
        Self::build(bytes, addr, header)
    }

    fn build(bytes: &'g [u8], addr: Addr, header: PageHeader) -> Result<Self> {
        let index = PageIndex::build(bytes, &header, addr)?;
        let first_free = if header.kind == PageType::Overflow {
            PAGE_HDR_LEN + page::overflow_data(bytes)?.len()
        } else {
            index.end()
        };
        let records = index.records();
        Ok(Self {
            addr,
            bytes,
            header,
            index,
            first_free,
            space_avail: bytes.len().saturating_sub(first_free),
            records,
        })
    }

    /// Address of the page.
    pub fn addr(&self) -> Addr {
        self.addr
    }

    /// Decoded header.
    pub fn header(&self) -> &PageHeader {
        &self.header
    }

    /// Sorted in-memory index.
    pub fn index(&self) -> &PageIndex<'g> {
        &self.index
    }

    /// Page offset of the first unused byte.
    pub fn first_free(&self) -> usize {
        self.first_free
    }

    /// Bytes still available for items.
    pub fn space_avail(&self) -> usize {
        self.space_avail
    }

    /// Records in this page and below.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Raw walk over the page's items.
    pub fn items(&self) -> Result<ItemIter<'g>> {
        ItemIter::for_page(self.bytes, self.addr)
    }

    /// Data bytes of an overflow page.
    pub fn overflow_data(&self) -> Result<&'g [u8]> {
        page::overflow_data(self.bytes)
    }
}
