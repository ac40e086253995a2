use std::convert::TryFrom;
use std::fmt;

use crate::primitives::bytes::take_array;
use crate::storage::btree::page::{first_item_offset, PageHeader};
use crate::storage::btree::refs::{OffPageRef, OverflowRef};
use crate::types::{Addr, BtPageError, Result};

/// Size of the packed item header.
pub const ITEM_HDR_LEN: usize = 4;
/// Largest payload an on-page item can carry (24-bit length).
pub const ITEM_MAX_LEN: u32 = 16 * 1024 * 1024 - 1;
/// Alignment of every item header on a page.
pub const ITEM_ALIGN: usize = 4;

const LEN_MASK: u32 = 0x00FF_FFFF;
const TYPE_MASK: u32 = 0x0F00_0000;
const TYPE_SHIFT: u32 = 24;

/// Kind of an on-page item.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ItemType {
    /// Leaf or internal page key.
    Key = 1,
    /// Key stored on overflow pages.
    KeyOverflow = 2,
    /// Leaf page data.
    Data = 3,
    /// Leaf page data stored on overflow pages.
    DataOverflow = 4,
    /// Duplicate data.
    Dup = 5,
    /// Duplicate data stored on overflow pages.
    DupOverflow = 6,
    /// Reference to an off-page subtree.
    OffPage = 7,
}

impl ItemType {
    /// Whether the payload is an [`OverflowRef`].
    pub const fn is_overflow(self) -> bool {
        matches!(
            self,
            ItemType::KeyOverflow | ItemType::DataOverflow | ItemType::DupOverflow
        )
    }

    /// Whether this is a key item.
    pub const fn is_key(self) -> bool {
        matches!(self, ItemType::Key | ItemType::KeyOverflow)
    }

    /// Whether this is a duplicate data item.
    pub const fn is_dup(self) -> bool {
        matches!(self, ItemType::Dup | ItemType::DupOverflow)
    }

    /// Short lowercase name used in reports.
    pub const fn name(self) -> &'static str {
        match self {
            ItemType::Key => "key",
            ItemType::KeyOverflow => "key-overflow",
            ItemType::Data => "data",
            ItemType::DataOverflow => "data-overflow",
            ItemType::Dup => "dup",
            ItemType::DupOverflow => "dup-overflow",
            ItemType::OffPage => "offpage",
        }
    }
}

impl TryFrom<u8> for ItemType {
    type Error = BtPageError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(ItemType::Key),
            2 => Ok(ItemType::KeyOverflow),
            3 => Ok(ItemType::Data),
            4 => Ok(ItemType::DataOverflow),
            5 => Ok(ItemType::Dup),
            6 => Ok(ItemType::DupOverflow),
            7 => Ok(ItemType::OffPage),
            _ => Err(BtPageError::MalformedPage("unknown item type")),
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Packed item header: payload length in the low 24 bits, type in bits 24..28.
///
/// The packed word stays private; callers go through [`ItemHeader::pack`],
/// the accessors, and the byte conversions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ItemHeader(u32);

impl ItemHeader {
    /// Packs `kind` and `len`, rejecting lengths beyond [`ITEM_MAX_LEN`].
    pub fn pack(kind: ItemType, len: u32) -> Result<Self> {
        check_len(u64::from(len))?;
        Ok(Self(type_bits(kind) | len))
    }

    /// Type and length. Fails on an unknown type code.
    pub fn unpack(self) -> Result<(ItemType, u32)> {
        Ok((self.kind()?, self.len()))
    }

    /// Item type.
    pub fn kind(self) -> Result<ItemType> {
        ItemType::try_from(((self.0 & TYPE_MASK) >> TYPE_SHIFT) as u8)
    }

    /// Payload length in bytes.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(self) -> u32 {
        self.0 & LEN_MASK
    }

    /// Replaces the length, keeping the type.
    pub fn set_len(&mut self, len: u32) -> Result<()> {
        check_len(u64::from(len))?;
        self.0 = (self.0 & TYPE_MASK) | len;
        Ok(())
    }

    /// Replaces the type, keeping the length.
    pub fn set_kind(&mut self, kind: ItemType) {
        self.0 = type_bits(kind) | (self.0 & LEN_MASK);
    }

    /// On-page encoding.
    pub fn to_bytes(self) -> [u8; ITEM_HDR_LEN] {
        self.0.to_be_bytes()
    }

    /// Reads a header from its on-page encoding. Unused bits are dropped.
    pub fn from_bytes(bytes: [u8; ITEM_HDR_LEN]) -> Self {
        Self(u32::from_be_bytes(bytes) & (TYPE_MASK | LEN_MASK))
    }
}

const fn type_bits(kind: ItemType) -> u32 {
    (kind as u32) << TYPE_SHIFT
}

fn check_len(len: u64) -> Result<()> {
    if len > u64::from(ITEM_MAX_LEN) {
        return Err(BtPageError::ItemTooLarge { len });
    }
    Ok(())
}

/// On-page bytes taken by an item with a `len`-byte payload: header plus
/// payload, rounded up so the next header stays 4-byte aligned.
pub const fn footprint(len: u32) -> usize {
    let raw = ITEM_HDR_LEN as u64 + len as u64;
    ((raw + (ITEM_ALIGN as u64 - 1)) & !(ITEM_ALIGN as u64 - 1)) as usize
}

/// Encodes an item at the start of `dst`, zeroing the alignment padding.
///
/// Returns the footprint. Nothing is written if the payload is too large or
/// does not fit.
pub fn write_item(dst: &mut [u8], kind: ItemType, payload: &[u8]) -> Result<usize> {
    check_len(payload.len() as u64)?;
    let len = payload.len() as u32;
    let size = footprint(len);
    let slot = dst
        .get_mut(..size)
        .ok_or(BtPageError::Invalid("item does not fit"))?;
    let header = ItemHeader::pack(kind, len)?;
    slot[..ITEM_HDR_LEN].copy_from_slice(&header.to_bytes());
    let data_end = ITEM_HDR_LEN + payload.len();
    slot[ITEM_HDR_LEN..data_end].copy_from_slice(payload);
    slot[data_end..].fill(0);
    Ok(size)
}

/// A decoded item borrowing its payload from the page buffer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Item<'a> {
    /// Item type.
    pub kind: ItemType,
    /// Payload bytes following the header.
    pub data: &'a [u8],
    /// Offset of the item header, relative to where iteration started
    /// (the page start for [`ItemIter::for_page`]).
    pub offset: usize,
}

impl<'a> Item<'a> {
    /// On-page footprint of this item.
    pub fn footprint(&self) -> usize {
        footprint(self.data.len() as u32)
    }

    /// Decodes the payload of an off-page reference item.
    pub fn offpage(&self) -> Result<OffPageRef> {
        if self.kind != ItemType::OffPage {
            return Err(BtPageError::MalformedPage("expected an off-page reference"));
        }
        OffPageRef::decode(self.data)
    }

    /// Decodes the payload of an overflow item.
    pub fn overflow(&self) -> Result<OverflowRef> {
        if !self.kind.is_overflow() {
            return Err(BtPageError::MalformedPage("expected an overflow reference"));
        }
        OverflowRef::decode(self.data)
    }

    /// Address referenced by an overflow item, else [`Addr::INVALID`].
    pub fn overflow_addr(&self) -> Result<Addr> {
        if self.kind.is_overflow() {
            Ok(self.overflow()?.addr)
        } else {
            Ok(Addr::INVALID)
        }
    }
}

/// Forward-only walk over the items of a page region.
///
/// Yields exactly `entries` items in physical order, or stops at the first
/// item that would run past the region, yielding that error once. Creating
/// a new iterator over the same bytes always replays the same sequence.
#[derive(Clone, Debug)]
pub struct ItemIter<'a> {
    region: &'a [u8],
    base: usize,
    pos: usize,
    remaining: u32,
}

impl<'a> ItemIter<'a> {
    /// Walks `entries` items starting at the beginning of `region`.
    pub fn new(region: &'a [u8], entries: u32) -> Self {
        Self {
            region,
            base: 0,
            pos: 0,
            remaining: entries,
        }
    }

    /// Walks `entries` items of `region`, reporting offsets shifted by `base`.
    pub(crate) fn with_base(region: &'a [u8], base: usize, entries: u32) -> Self {
        Self {
            region,
            base,
            pos: 0,
            remaining: entries,
        }
    }

    /// Walks the items of the page at `addr`. Overflow pages hold raw data
    /// and yield nothing.
    pub fn for_page(page: &'a [u8], addr: Addr) -> Result<Self> {
        let header = PageHeader::decode(page)?;
        let base = first_item_offset(addr);
        let region = page
            .get(base..)
            .ok_or(BtPageError::CorruptHeader("page shorter than its fixed prefix"))?;
        let entries = if header.kind.holds_entries() {
            header.entries()?
        } else {
            0
        };
        Ok(Self::with_base(region, base, entries))
    }

    /// Items not yet produced.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Offset, relative to the iteration base, of the next item header.
    pub fn position(&self) -> usize {
        self.base + self.pos
    }

    /// Looks at the next item without consuming it.
    pub fn peek(&self) -> Option<Result<Item<'a>>> {
        self.clone().next()
    }

    fn decode_next(&mut self) -> Result<Item<'a>> {
        let raw = take_array::<ITEM_HDR_LEN>(self.region, self.pos)
            .ok_or(BtPageError::MalformedPage("item header past end of page"))?;
        let (kind, len) = ItemHeader::from_bytes(raw).unpack()?;
        let start = self.pos + ITEM_HDR_LEN;
        let data = self
            .region
            .get(start..start + len as usize)
            .ok_or(BtPageError::MalformedPage("item data past end of page"))?;
        let item = Item {
            kind,
            data,
            offset: self.base + self.pos,
        };
        self.pos = (self.pos + footprint(len)).min(self.region.len());
        Ok(item)
    }
}

impl<'a> Iterator for ItemIter<'a> {
    type Item = Result<Item<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        match self.decode_next() {
            Ok(item) => {
                self.remaining -= 1;
                Some(Ok(item))
            }
            Err(err) => {
                self.remaining = 0;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TYPES: [ItemType; 7] = [
        ItemType::Key,
        ItemType::KeyOverflow,
        ItemType::Data,
        ItemType::DataOverflow,
        ItemType::Dup,
        ItemType::DupOverflow,
        ItemType::OffPage,
    ];

    #[test]
    fn pack_unpack_boundary_lengths() -> Result<()> {
        for kind in ALL_TYPES {
            for len in [0, 1, ITEM_MAX_LEN - 1, ITEM_MAX_LEN] {
                let hdr = ItemHeader::pack(kind, len)?;
                assert_eq!(hdr.unpack()?, (kind, len));
                assert_eq!(ItemHeader::from_bytes(hdr.to_bytes()).unpack()?, (kind, len));
            }
        }
        Ok(())
    }

    #[test]
    fn length_beyond_24_bits_is_rejected() {
        let err = ItemHeader::pack(ItemType::Data, ITEM_MAX_LEN + 1).unwrap_err();
        assert!(matches!(err, BtPageError::ItemTooLarge { len: 16_777_216 }));
    }

    #[test]
    fn type_occupies_bits_24_to_27() -> Result<()> {
        let hdr = ItemHeader::pack(ItemType::OffPage, 16)?;
        assert_eq!(hdr.to_bytes(), [0x07, 0x00, 0x00, 0x10]);
        let hdr = ItemHeader::pack(ItemType::Key, 0x00AB_CDEF)?;
        assert_eq!(hdr.to_bytes(), [0x01, 0xAB, 0xCD, 0xEF]);
        Ok(())
    }

    #[test]
    fn setters_preserve_the_other_field() -> Result<()> {
        let mut hdr = ItemHeader::pack(ItemType::Dup, 99)?;
        hdr.set_kind(ItemType::DupOverflow);
        assert_eq!(hdr.unpack()?, (ItemType::DupOverflow, 99));
        hdr.set_len(8)?;
        assert_eq!(hdr.unpack()?, (ItemType::DupOverflow, 8));
        assert!(hdr.set_len(ITEM_MAX_LEN + 1).is_err());
        assert_eq!(hdr.len(), 8);
        Ok(())
    }

    #[test]
    fn unknown_type_code_is_malformed() {
        let hdr = ItemHeader::from_bytes([0x08, 0, 0, 1]);
        assert!(matches!(hdr.kind(), Err(BtPageError::MalformedPage(_))));
        let hdr = ItemHeader::from_bytes([0x00, 0, 0, 1]);
        assert!(hdr.unpack().is_err());
    }

    #[test]
    fn footprint_is_aligned() {
        assert_eq!(footprint(0), 4);
        assert_eq!(footprint(1), 8);
        assert_eq!(footprint(4), 8);
        assert_eq!(footprint(5), 12);
        assert_eq!(footprint(ITEM_MAX_LEN), 16_777_220);
    }

    #[test]
    fn write_item_pads_with_zeroes() -> Result<()> {
        let mut buf = [0xFFu8; 12];
        let used = write_item(&mut buf, ItemType::Key, b"cat")?;
        assert_eq!(used, 8);
        assert_eq!(&buf[..8], &[0x01, 0, 0, 3, b'c', b'a', b't', 0]);
        assert_eq!(buf[8], 0xFF);
        assert!(write_item(&mut buf[..6], ItemType::Key, b"cat").is_err());
        Ok(())
    }

    #[test]
    fn iterator_walks_and_restarts() -> Result<()> {
        let mut region = vec![0u8; 64];
        let mut pos = write_item(&mut region, ItemType::Key, b"a")?;
        pos += write_item(&mut region[pos..], ItemType::Data, b"hello")?;
        write_item(&mut region[pos..], ItemType::Key, b"")?;

        let walk = |n| -> Result<Vec<(ItemType, Vec<u8>, usize)>> {
            ItemIter::new(&region, n)
                .map(|item| item.map(|it| (it.kind, it.data.to_vec(), it.offset)))
                .collect()
        };
        let items = walk(3)?;
        assert_eq!(
            items,
            vec![
                (ItemType::Key, b"a".to_vec(), 0),
                (ItemType::Data, b"hello".to_vec(), 8),
                (ItemType::Key, Vec::new(), 20),
            ]
        );
        assert_eq!(walk(3)?, items);
        assert_eq!(walk(2)?.len(), 2);
        Ok(())
    }

    #[test]
    fn iterator_stops_at_region_end() -> Result<()> {
        let mut region = vec![0u8; 12];
        write_item(&mut region, ItemType::Data, b"12345678")?;
        let mut iter = ItemIter::new(&region, 5);
        assert!(iter.next().unwrap().is_ok());
        assert!(matches!(
            iter.next(),
            Some(Err(BtPageError::MalformedPage(_)))
        ));
        assert!(iter.next().is_none());
        Ok(())
    }

    #[test]
    fn item_data_past_region_is_malformed() {
        let region = [0x03u8, 0, 0, 100, 1, 2, 3, 4];
        let mut iter = ItemIter::new(&region, 1);
        assert!(matches!(
            iter.next(),
            Some(Err(BtPageError::MalformedPage("item data past end of page")))
        ));
    }
}
