use std::fmt;
use std::ops::Range;

use tracing::debug;

use crate::primitives::bytes::be;
use crate::storage::btree::page::PAGE_HDR_LEN;
use crate::types::{Addr, BtPageError, Result};

/// Magic number identifying a btree file.
pub const BTREE_MAGIC: u32 = 120_897;
/// Major format version; files with any other major version are rejected.
pub const MAJOR_VERSION: u16 = 1;
/// Minor format version; differences are forward compatible.
pub const MINOR_VERSION: u16 = 1;
/// Encoded size of the descriptor.
pub const DESC_LEN: usize = 64;

const DESC_MAGIC: Range<usize> = 0..4;
const DESC_MAJOR: Range<usize> = 4..6;
const DESC_MINOR: Range<usize> = 6..8;
const DESC_LEAF_SIZE: Range<usize> = 8..12;
const DESC_INTERNAL_SIZE: Range<usize> = 12..16;
const DESC_BASE_RECNO: Range<usize> = 16..24;
const DESC_ROOT_ADDR: Range<usize> = 24..28;
const DESC_FREE_ADDR: Range<usize> = 28..32;
const DESC_SPARE: Range<usize> = 32..64;

const _: () = assert!(DESC_SPARE.end == DESC_LEN);

/// Database descriptor stored on the page at address 0, right after its header.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Descriptor {
    /// Major format version.
    pub major: u16,
    /// Minor format version.
    pub minor: u16,
    /// Leaf page size in bytes.
    pub leaf_size: u32,
    /// Internal page size in bytes.
    pub internal_size: u32,
    /// Record number of the first record.
    pub base_recno: u64,
    /// Address of the root page.
    pub root_addr: Addr,
    /// Address of the head of the free list.
    pub free_addr: Addr,
}

impl Descriptor {
    /// Descriptor for a new file whose root is the first leaf page.
    pub fn new(leaf_size: u32, internal_size: u32) -> Self {
        Self {
            major: MAJOR_VERSION,
            minor: MINOR_VERSION,
            leaf_size,
            internal_size,
            base_recno: 0,
            root_addr: Addr::FIRST_PAGE,
            free_addr: Addr::INVALID,
        }
    }

    /// Encodes the descriptor into its 64-byte form. Spare bytes are zeroed.
    pub fn encode(&self) -> [u8; DESC_LEN] {
        let mut out = [0u8; DESC_LEN];
        be::put_u32(&mut out, DESC_MAGIC, BTREE_MAGIC);
        be::put_u16(&mut out, DESC_MAJOR, self.major);
        be::put_u16(&mut out, DESC_MINOR, self.minor);
        be::put_u32(&mut out, DESC_LEAF_SIZE, self.leaf_size);
        be::put_u32(&mut out, DESC_INTERNAL_SIZE, self.internal_size);
        be::put_u64(&mut out, DESC_BASE_RECNO, self.base_recno);
        be::put_u32(&mut out, DESC_ROOT_ADDR, self.root_addr.0);
        be::put_u32(&mut out, DESC_FREE_ADDR, self.free_addr.0);
        out
    }

    /// Decodes a descriptor, rejecting a bad magic or an unknown major version.
    ///
    /// Spare bytes are ignored so that newer minor versions may use them.
    pub fn decode(src: &[u8]) -> Result<Self> {
        if src.len() < DESC_LEN {
            return Err(BtPageError::CorruptDescriptor("descriptor truncated"));
        }
        let src = &src[..DESC_LEN];
        if be::get_u32(src, DESC_MAGIC) != BTREE_MAGIC {
            return Err(BtPageError::CorruptDescriptor("invalid magic number"));
        }
        let major = be::get_u16(src, DESC_MAJOR);
        if major != MAJOR_VERSION {
            return Err(BtPageError::CorruptDescriptor("unsupported major version"));
        }
        let minor = be::get_u16(src, DESC_MINOR);
        if minor != MINOR_VERSION {
            debug!(minor, "descriptor minor version differs; continuing");
        }
        Ok(Self {
            major,
            minor,
            leaf_size: be::get_u32(src, DESC_LEAF_SIZE),
            internal_size: be::get_u32(src, DESC_INTERNAL_SIZE),
            base_recno: be::get_u64(src, DESC_BASE_RECNO),
            root_addr: Addr(be::get_u32(src, DESC_ROOT_ADDR)),
            free_addr: Addr(be::get_u32(src, DESC_FREE_ADDR)),
        })
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Descriptor(version={}.{}, leaf_size={}, internal_size={}, base_recno={}, root={}, free={})",
            self.major,
            self.minor,
            self.leaf_size,
            self.internal_size,
            self.base_recno,
            self.root_addr,
            self.free_addr,
        )
    }
}

/// Reads the descriptor from the bytes of the page at address 0.
pub fn read_descriptor(page: &[u8]) -> Result<Descriptor> {
    let region = page
        .get(PAGE_HDR_LEN..PAGE_HDR_LEN + DESC_LEN)
        .ok_or(BtPageError::CorruptDescriptor("first page shorter than descriptor"))?;
    let desc = Descriptor::decode(region)?;
    debug!(%desc, "decoded descriptor");
    Ok(desc)
}

/// Writes `desc` into the page at address 0. The caller reseals the checksum.
pub fn write_descriptor(page: &mut [u8], desc: &Descriptor) -> Result<()> {
    let region = page
        .get_mut(PAGE_HDR_LEN..PAGE_HDR_LEN + DESC_LEN)
        .ok_or(BtPageError::Invalid("page too small for descriptor"))?;
    region.copy_from_slice(&desc.encode());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Descriptor {
        Descriptor {
            base_recno: 42,
            root_addr: Addr(17),
            free_addr: Addr(99),
            ..Descriptor::new(8192, 4096)
        }
    }

    #[test]
    fn descriptor_roundtrip() -> Result<()> {
        let desc = sample();
        let bytes = desc.encode();
        assert_eq!(bytes.len(), DESC_LEN);
        assert_eq!(Descriptor::decode(&bytes)?, desc);
        Ok(())
    }

    #[test]
    fn magic_sits_in_first_four_bytes() {
        let bytes = sample().encode();
        assert_eq!(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]), 120_897);
        assert!(bytes[DESC_SPARE].iter().all(|b| *b == 0));
    }

    #[test]
    fn wrong_magic_is_corrupt() {
        let mut bytes = sample().encode();
        bytes[0] ^= 0xFF;
        assert!(matches!(
            Descriptor::decode(&bytes),
            Err(BtPageError::CorruptDescriptor(_))
        ));
    }

    #[test]
    fn major_version_mismatch_is_corrupt_but_minor_is_accepted() -> Result<()> {
        let mut desc = sample();
        desc.minor = 7;
        let decoded = Descriptor::decode(&desc.encode())?;
        assert_eq!(decoded.minor, 7);

        desc.major = 2;
        assert!(matches!(
            Descriptor::decode(&desc.encode()),
            Err(BtPageError::CorruptDescriptor("unsupported major version"))
        ));
        Ok(())
    }

    #[test]
    fn truncated_descriptor_is_corrupt() {
        let bytes = sample().encode();
        assert!(matches!(
            Descriptor::decode(&bytes[..63]),
            Err(BtPageError::CorruptDescriptor(_))
        ));
    }

    #[test]
    fn descriptor_lives_after_first_page_header() -> Result<()> {
        let mut page = vec![0u8; 512];
        write_descriptor(&mut page, &sample())?;
        assert!(page[..PAGE_HDR_LEN].iter().all(|b| *b == 0));
        assert_eq!(read_descriptor(&page)?, sample());
        Ok(())
    }
}
