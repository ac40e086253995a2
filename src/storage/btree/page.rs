use std::convert::TryFrom;
use std::fmt;

use tracing::warn;

use crate::primitives::bytes::be;
use crate::primitives::pager::DESC_LEN;
use crate::types::{page_checksum, Addr, BtPageError, Lsn, Result};

/// Encoded size of the page header present at the start of every page.
pub const PAGE_HDR_LEN: usize = 32;

/// Tree level of leaf pages.
pub const LEAF_LEVEL: u8 = 0;
/// Tree level of the bottom internal pages.
pub const FIRST_INTERNAL_LEVEL: u8 = 1;

pub mod header {
    //! Byte offsets for fixed header fields.
    use core::ops::Range;

    /// Log file number of the LSN.
    pub const LSN_FILE: Range<usize> = 0..4;
    /// Log file offset of the LSN.
    pub const LSN_OFFSET: Range<usize> = 4..8;
    /// Page type code.
    pub const PAGE_TYPE: usize = 8;
    /// Tree level.
    pub const LEVEL: usize = 9;
    /// Unused padding.
    pub const RESERVED: Range<usize> = 10..12;
    /// Page checksum; treated as zero while the checksum is computed.
    pub const CHECKSUM: Range<usize> = 12..16;
    /// Entry count, or data length on overflow pages.
    pub const COUNT: Range<usize> = 16..20;
    /// Parent page address.
    pub const PARENT: Range<usize> = 20..24;
    /// Previous page at the same level.
    pub const PREV: Range<usize> = 24..28;
    /// Next page at the same level.
    pub const NEXT: Range<usize> = 28..32;
}

const _: () = assert!(header::NEXT.end == PAGE_HDR_LEN);

/// Purpose of a page and the rules for walking its items.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PageType {
    /// Never written by a healthy engine.
    Invalid = 0,
    /// Primary btree internal page: key / off-page reference pairs.
    Internal = 1,
    /// Primary btree leaf page: keys with data, overflow data, an off-page
    /// duplicate tree, or a run of duplicates.
    Leaf = 2,
    /// Off-page duplicate tree internal page.
    DupInternal = 3,
    /// Off-page duplicate tree leaf page: sorted duplicate data items.
    DupLeaf = 4,
    /// Flat overflow data.
    Overflow = 5,
}

impl PageType {
    /// On-disk code.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether the header count field holds an entry count (as opposed to the
    /// data length of an overflow page).
    pub const fn holds_entries(self) -> bool {
        !matches!(self, PageType::Overflow)
    }

    /// Short lowercase name used in reports.
    pub const fn name(self) -> &'static str {
        match self {
            PageType::Invalid => "invalid",
            PageType::Internal => "internal",
            PageType::Leaf => "leaf",
            PageType::DupInternal => "dup-internal",
            PageType::DupLeaf => "dup-leaf",
            PageType::Overflow => "overflow",
        }
    }
}

impl TryFrom<u8> for PageType {
    type Error = BtPageError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(PageType::Invalid),
            1 => Ok(PageType::Internal),
            2 => Ok(PageType::Leaf),
            3 => Ok(PageType::DupInternal),
            4 => Ok(PageType::DupLeaf),
            5 => Ok(PageType::Overflow),
            _ => Err(BtPageError::CorruptHeader("unknown page type")),
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded page header.
///
/// The count field is shared by two meanings keyed on the page type; use
/// [`PageHeader::entries`] or [`PageHeader::data_len`], which refuse to read
/// it in the wrong context.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PageHeader {
    /// Log sequence number of the last change.
    pub lsn: Lsn,
    /// Page type.
    pub kind: PageType,
    /// Tree level, 0 for leaves.
    pub level: u8,
    /// Stored checksum.
    pub checksum: u32,
    count: u32,
    /// Parent page.
    pub parent: Addr,
    /// Previous page at this level and subtree kind.
    pub prev: Addr,
    /// Next page at this level and subtree kind.
    pub next: Addr,
}

impl PageHeader {
    /// Header for an empty page of `kind` at `level`, unlinked.
    pub fn new(kind: PageType, level: u8) -> Self {
        Self {
            lsn: Lsn::default(),
            kind,
            level,
            checksum: 0,
            count: 0,
            parent: Addr::INVALID,
            prev: Addr::INVALID,
            next: Addr::INVALID,
        }
    }

    /// Header for an overflow page carrying `data_len` bytes.
    pub fn overflow(data_len: u32) -> Self {
        Self {
            count: data_len,
            ..Self::new(PageType::Overflow, LEAF_LEVEL)
        }
    }

    /// Sets the parent and sibling links.
    pub fn with_links(mut self, parent: Addr, prev: Addr, next: Addr) -> Self {
        self.parent = parent;
        self.prev = prev;
        self.next = next;
        self
    }

    /// Number of items on a non-overflow page.
    pub fn entries(&self) -> Result<u32> {
        if !self.kind.holds_entries() {
            return Err(BtPageError::Invalid("overflow pages have no entry count"));
        }
        Ok(self.count)
    }

    /// Data length of an overflow page.
    pub fn data_len(&self) -> Result<u32> {
        if self.kind.holds_entries() {
            return Err(BtPageError::Invalid("only overflow pages carry a data length"));
        }
        Ok(self.count)
    }

    /// Updates the entry count of a non-overflow page.
    pub fn set_entries(&mut self, entries: u32) -> Result<()> {
        self.entries()?;
        self.count = entries;
        Ok(())
    }

    /// Updates the data length of an overflow page.
    pub fn set_data_len(&mut self, len: u32) -> Result<()> {
        self.data_len()?;
        self.count = len;
        Ok(())
    }

    /// Encodes the header into the first [`PAGE_HDR_LEN`] bytes of `dst`.
    pub fn encode(&self, dst: &mut [u8]) -> Result<()> {
        let hdr = dst
            .get_mut(..PAGE_HDR_LEN)
            .and_then(|hdr| <&mut [u8; PAGE_HDR_LEN]>::try_from(hdr).ok())
            .ok_or(BtPageError::Invalid("page header buffer too small"))?;
        self.encode_into(hdr);
        Ok(())
    }

    /// Encodes the header into a fresh array.
    pub fn to_bytes(&self) -> [u8; PAGE_HDR_LEN] {
        let mut out = [0u8; PAGE_HDR_LEN];
        self.encode_into(&mut out);
        out
    }

    fn encode_into(&self, hdr: &mut [u8; PAGE_HDR_LEN]) {
        be::put_u32(hdr, header::LSN_FILE, self.lsn.file);
        be::put_u32(hdr, header::LSN_OFFSET, self.lsn.offset);
        hdr[header::PAGE_TYPE] = self.kind.as_u8();
        hdr[header::LEVEL] = self.level;
        hdr[header::RESERVED].fill(0);
        be::put_u32(hdr, header::CHECKSUM, self.checksum);
        be::put_u32(hdr, header::COUNT, self.count);
        be::put_u32(hdr, header::PARENT, self.parent.0);
        be::put_u32(hdr, header::PREV, self.prev.0);
        be::put_u32(hdr, header::NEXT, self.next.0);
    }

    /// Decodes a header, rejecting unknown page types.
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() < PAGE_HDR_LEN {
            return Err(BtPageError::CorruptHeader("page header truncated"));
        }
        let hdr = &src[..PAGE_HDR_LEN];
        let kind = PageType::try_from(hdr[header::PAGE_TYPE])?;
        Ok(Self {
            lsn: Lsn {
                file: be::get_u32(hdr, header::LSN_FILE),
                offset: be::get_u32(hdr, header::LSN_OFFSET),
            },
            kind,
            level: hdr[header::LEVEL],
            checksum: be::get_u32(hdr, header::CHECKSUM),
            count: be::get_u32(hdr, header::COUNT),
            parent: Addr(be::get_u32(hdr, header::PARENT)),
            prev: Addr(be::get_u32(hdr, header::PREV)),
            next: Addr(be::get_u32(hdr, header::NEXT)),
        })
    }
}

/// First item byte of the page at `addr`; the page at address 0 also
/// carries the database descriptor.
pub const fn first_item_offset(addr: Addr) -> usize {
    if addr.0 == Addr::FIRST_PAGE.0 {
        PAGE_HDR_LEN + DESC_LEN
    } else {
        PAGE_HDR_LEN
    }
}

/// Whether `header` may sit at address 0, which always holds the first leaf.
pub fn is_first_leaf(header: &PageHeader) -> bool {
    header.kind == PageType::Leaf && header.level == LEAF_LEVEL
}

/// Bytes of `page` from the first item onward.
pub fn item_region(page: &[u8], addr: Addr) -> Result<&[u8]> {
    page.get(first_item_offset(addr)..)
        .ok_or(BtPageError::CorruptHeader("page shorter than its fixed prefix"))
}

/// Checksum of a full page with its checksum field treated as zero.
pub fn compute_checksum(page: &[u8]) -> u32 {
    page_checksum(page, header::CHECKSUM)
}

/// Recomputes the checksum of `page` and compares it with `stored`.
pub fn verify_checksum(page: &[u8], stored: u32) -> bool {
    compute_checksum(page) == stored
}

/// Computes the checksum of `page` and stores it in the header.
pub fn seal_page(page: &mut [u8]) -> Result<u32> {
    if page.len() < PAGE_HDR_LEN {
        return Err(BtPageError::Invalid("page shorter than header"));
    }
    let checksum = compute_checksum(page);
    be::put_u32(page, header::CHECKSUM, checksum);
    Ok(checksum)
}

/// Decodes the header of `page` and verifies its checksum.
pub fn verify_page(page: &[u8]) -> Result<PageHeader> {
    let header = PageHeader::decode(page)?;
    let computed = compute_checksum(page);
    if computed != header.checksum {
        warn!(
            stored = header.checksum,
            computed,
            kind = %header.kind,
            "page checksum mismatch"
        );
        return Err(BtPageError::ChecksumMismatch {
            stored: header.checksum,
            computed,
        });
    }
    Ok(header)
}

/// The data bytes of an overflow page.
pub fn overflow_data(page: &[u8]) -> Result<&[u8]> {
    let header = PageHeader::decode(page)?;
    if header.kind != PageType::Overflow {
        return Err(BtPageError::Invalid("not an overflow page"));
    }
    let end = PAGE_HDR_LEN + header.data_len()? as usize;
    page.get(PAGE_HDR_LEN..end)
        .ok_or(BtPageError::MalformedPage("overflow length exceeds page"))
}
