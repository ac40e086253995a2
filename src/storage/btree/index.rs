use std::cmp::Ordering;

use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::storage::btree::item::{Item, ItemIter, ItemType};
use crate::storage::btree::page::{first_item_offset, PageHeader, PageType};
use crate::storage::btree::refs::{OffPageRef, OverflowRef};
use crate::types::{Addr, BtPageError, Result};

const INLINE_INDEX_ENTRIES: usize = 16;

/// Flag bits carried by an [`IndexEntry`].
pub mod flags {
    /// The key bytes are an overflow reference.
    pub const KEY_OVERFLOW: u32 = 0x01;
    /// The data lives on overflow pages.
    pub const DATA_OVERFLOW: u32 = 0x02;
    /// The data is a run of on-page duplicates.
    pub const DUP_SET: u32 = 0x04;
    /// The data is an off-page subtree.
    pub const OFFPAGE: u32 = 0x08;
}

/// A run of consecutive duplicate items on a leaf page.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DupSet<'a> {
    tail: &'a [u8],
    base: usize,
    count: u32,
}

impl<'a> DupSet<'a> {
    /// Number of duplicates in the run.
    pub fn len(&self) -> u32 {
        self.count
    }

    /// Always `false` for a set produced by the index builder.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Walks the duplicates in on-page order. Offsets are page-relative.
    pub fn iter(&self) -> ItemIter<'a> {
        ItemIter::with_base(self.tail, self.base, self.count)
    }
}

/// On-page data paired with an index entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DataRef<'a> {
    /// Child subtree (internal pages, or an off-page duplicate tree on leaves).
    OffPage(OffPageRef),
    /// Data stored in the item itself.
    Inline(&'a [u8]),
    /// Data relocated to overflow pages.
    Overflow(OverflowRef),
    /// A run of on-page duplicates.
    Duplicates(DupSet<'a>),
    /// Off-page duplicate leaf pages: the data is the entry itself.
    SameAsKey,
}

/// One sorted entry of a page's in-memory index.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IndexEntry<'a> {
    /// Raw key bytes as stored on the page. For overflow keys this is the
    /// encoded [`OverflowRef`]; see [`IndexEntry::key_overflow`].
    pub key: &'a [u8],
    /// Child address on internal pages, overflow address of the key on leaf
    /// pages, overflow address of the data on duplicate leaf pages, else
    /// [`Addr::INVALID`].
    pub addr: Addr,
    /// Paired data.
    pub data: DataRef<'a>,
    /// See [`flags`].
    pub flags: u32,
    /// Page offset of the key item.
    pub offset: usize,
}

impl<'a> IndexEntry<'a> {
    /// Decoded overflow reference of an overflow key.
    pub fn key_overflow(&self) -> Result<Option<OverflowRef>> {
        if self.flags & flags::KEY_OVERFLOW == 0 {
            return Ok(None);
        }
        OverflowRef::decode(self.key).map(Some)
    }

    /// Records accounted to this entry.
    pub fn records(&self) -> u64 {
        match self.data {
            DataRef::OffPage(r) => r.records,
            DataRef::Duplicates(set) => u64::from(set.len()),
            DataRef::Inline(_) | DataRef::Overflow(_) | DataRef::SameAsKey => 1,
        }
    }
}

/// Sorted index over the items of one page, borrowing the page bytes.
///
/// Rebuild it whenever the page bytes change; the borrow keeps a stale index
/// from outliving the buffer it points into.
#[derive(Clone, Debug)]
pub struct PageIndex<'a> {
    kind: PageType,
    entries: SmallVec<[IndexEntry<'a>; INLINE_INDEX_ENTRIES]>,
    end: usize,
}

impl<'a> PageIndex<'a> {
    /// Scans the items of `page` (the page at `addr`, described by `header`)
    /// and pairs them according to the page type.
    pub fn build(page: &'a [u8], header: &PageHeader, addr: Addr) -> Result<Self> {
        match build_entries(page, header, addr) {
            Ok(index) => {
                trace!(
                    kind = %header.kind,
                    addr = %addr,
                    entries = index.entries.len(),
                    "built page index"
                );
                Ok(index)
            }
            Err(err) => {
                if let BtPageError::MalformedPage(reason) = &err {
                    warn!(kind = %header.kind, addr = %addr, reason, "malformed page");
                }
                Err(err)
            }
        }
    }

    /// Page type the index was built for.
    pub fn kind(&self) -> PageType {
        self.kind
    }

    /// Number of index entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the page has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in sort order.
    pub fn entries(&self) -> &[IndexEntry<'a>] {
        &self.entries
    }

    /// Entry at `idx`.
    pub fn get(&self, idx: usize) -> Option<&IndexEntry<'a>> {
        self.entries.get(idx)
    }

    /// Iterates entries in sort order.
    pub fn iter(&self) -> std::slice::Iter<'_, IndexEntry<'a>> {
        self.entries.iter()
    }

    /// Page offset just past the last item; the first free byte.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Records in this page and below.
    pub fn records(&self) -> u64 {
        self.entries.iter().map(IndexEntry::records).sum()
    }

    /// Binary search by raw key bytes, as [`slice::binary_search`].
    ///
    /// Overflow keys compare by their encoded reference; resolve them with
    /// [`PageIndex::search_by`] when that matters.
    pub fn search(&self, key: &[u8]) -> std::result::Result<usize, usize> {
        self.search_by(|entry| entry.key.cmp(key))
    }

    /// Binary search with a caller-supplied comparison.
    pub fn search_by<F>(&self, f: F) -> std::result::Result<usize, usize>
    where
        F: FnMut(&IndexEntry<'a>) -> Ordering,
    {
        self.entries.binary_search_by(f)
    }
}

impl<'a, 'i> IntoIterator for &'i PageIndex<'a> {
    type Item = &'i IndexEntry<'a>;
    type IntoIter = std::slice::Iter<'i, IndexEntry<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

fn build_entries<'a>(page: &'a [u8], header: &PageHeader, addr: Addr) -> Result<PageIndex<'a>> {
    let base = first_item_offset(addr);
    let mut index = PageIndex {
        kind: header.kind,
        entries: SmallVec::new(),
        end: base,
    };
    let mut items = match header.kind {
        PageType::Invalid => return Err(BtPageError::MalformedPage("page type is invalid")),
        PageType::Overflow => return Ok(index),
        _ => {
            let region = page
                .get(base..)
                .ok_or(BtPageError::MalformedPage("page shorter than its fixed prefix"))?;
            ItemIter::with_base(region, base, header.entries()?)
        }
    };
    while let Some(first) = items.next() {
        let first = first?;
        let entry = match header.kind {
            PageType::Internal | PageType::DupInternal => internal_entry(first, &mut items)?,
            PageType::Leaf => leaf_entry(first, &mut items, page)?,
            PageType::DupLeaf => dup_leaf_entry(first)?,
            PageType::Invalid | PageType::Overflow => unreachable!("handled above"),
        };
        index.entries.push(entry);
    }
    index.end = items.position();
    Ok(index)
}

fn key_entry<'a>(item: Item<'a>) -> Result<IndexEntry<'a>> {
    let flags = match item.kind {
        ItemType::Key => 0,
        ItemType::KeyOverflow => {
            OverflowRef::decode(item.data)?;
            flags::KEY_OVERFLOW
        }
        _ => return Err(BtPageError::MalformedPage("entry does not start with a key")),
    };
    Ok(IndexEntry {
        key: item.data,
        addr: Addr::INVALID,
        data: DataRef::SameAsKey,
        flags,
        offset: item.offset,
    })
}

fn paired<'a>(items: &mut ItemIter<'a>) -> Result<Item<'a>> {
    items
        .next()
        .ok_or(BtPageError::MalformedPage("key without a paired item"))?
}

fn internal_entry<'a>(key: Item<'a>, items: &mut ItemIter<'a>) -> Result<IndexEntry<'a>> {
    let mut entry = key_entry(key)?;
    let child = paired(items)?;
    if child.kind != ItemType::OffPage {
        return Err(BtPageError::MalformedPage(
            "internal key not followed by an off-page reference",
        ));
    }
    let child = child.offpage()?;
    entry.addr = child.addr;
    entry.data = DataRef::OffPage(child);
    entry.flags |= flags::OFFPAGE;
    Ok(entry)
}

fn leaf_entry<'a>(
    key: Item<'a>,
    items: &mut ItemIter<'a>,
    page: &'a [u8],
) -> Result<IndexEntry<'a>> {
    let mut entry = key_entry(key)?;
    if let Some(ovfl) = entry.key_overflow()? {
        entry.addr = ovfl.addr;
    }
    let data = paired(items)?;
    entry.data = match data.kind {
        ItemType::Data => DataRef::Inline(data.data),
        ItemType::DataOverflow => {
            entry.flags |= flags::DATA_OVERFLOW;
            DataRef::Overflow(data.overflow()?)
        }
        ItemType::OffPage => {
            entry.flags |= flags::OFFPAGE;
            DataRef::OffPage(data.offpage()?)
        }
        ItemType::Dup | ItemType::DupOverflow => {
            let mut count = 1u32;
            validate_dup(&data)?;
            while let Some(Ok(next)) = items.peek() {
                if !next.kind.is_dup() {
                    break;
                }
                validate_dup(&next)?;
                items.next();
                count += 1;
            }
            entry.flags |= flags::DUP_SET;
            let tail = page
                .get(data.offset..)
                .ok_or(BtPageError::MalformedPage("duplicate run past end of page"))?;
            DataRef::Duplicates(DupSet {
                tail,
                base: data.offset,
                count,
            })
        }
        ItemType::Key | ItemType::KeyOverflow => {
            return Err(BtPageError::MalformedPage("leaf key followed by another key"))
        }
    };
    Ok(entry)
}

fn validate_dup(item: &Item<'_>) -> Result<()> {
    if item.kind == ItemType::DupOverflow {
        item.overflow()?;
    }
    Ok(())
}

fn dup_leaf_entry(item: Item<'_>) -> Result<IndexEntry<'_>> {
    if !item.kind.is_dup() {
        return Err(BtPageError::MalformedPage(
            "duplicate leaf page holds a non-duplicate item",
        ));
    }
    let mut entry = IndexEntry {
        key: item.data,
        addr: Addr::INVALID,
        data: DataRef::SameAsKey,
        flags: 0,
        offset: item.offset,
    };
    if item.kind == ItemType::DupOverflow {
        entry.addr = item.overflow()?.addr;
        entry.flags |= flags::DATA_OVERFLOW;
    }
    Ok(entry)
}
