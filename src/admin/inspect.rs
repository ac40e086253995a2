use std::path::Path;

use serde::Serialize;

use crate::storage::btree::item::Item;
use crate::storage::btree::page;
use crate::storage::btree::{ItemIter, ItemType, PageType, PageView};
use crate::types::{Addr, BtPageError};

use crate::admin::error::Result;
use crate::admin::util::{hex_preview, PageFile};

/// Stored and recomputed checksum of a page.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChecksumStatus {
    /// Value in the page header.
    pub stored: u32,
    /// Value computed over the page bytes.
    pub computed: u32,
    /// Whether the two agree.
    pub ok: bool,
}

/// One item as found on the page.
#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    /// Page offset of the item header.
    pub offset: usize,
    /// Item type name.
    pub kind: &'static str,
    /// Payload length in bytes.
    pub len: usize,
    /// Hex of the leading payload bytes.
    pub preview: String,
    /// Decoded reference, for off-page and overflow items.
    pub reference: Option<String>,
}

/// Summary of the in-memory index built over a page.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IndexSummary {
    /// Number of index entries.
    pub entries: usize,
    /// Records in the page and below.
    pub records: u64,
    /// First unused byte.
    pub first_free: usize,
    /// Bytes left for items.
    pub space_avail: usize,
}

/// Decoded header, items, and index of one page.
#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    /// Address of the page.
    pub addr: u32,
    /// Byte offset of the page in the file.
    pub offset: u64,
    /// Page size in bytes, derived from the page type and level.
    pub size: u32,
    /// Page type name.
    pub kind: &'static str,
    /// Tree level.
    pub level: u8,
    /// LSN as `file/offset`.
    pub lsn: String,
    /// Item count, for pages that hold items.
    pub entries: Option<u32>,
    /// Data length, for overflow pages.
    pub data_len: Option<u32>,
    /// Parent address, if linked.
    pub parent: Option<u32>,
    /// Previous sibling, if linked.
    pub prev: Option<u32>,
    /// Next sibling, if linked.
    pub next: Option<u32>,
    /// Checksum verification result.
    pub checksum: ChecksumStatus,
    /// Items in on-page order.
    pub items: Vec<ItemReport>,
    /// Hex of the leading data bytes of an overflow page.
    pub overflow_preview: Option<String>,
    /// Index summary, when the index could be built.
    pub index: Option<IndexSummary>,
    /// Why the items or index could not be read, if they could not.
    pub error: Option<String>,
}

/// Decodes the page at `addr`.
///
/// A checksum mismatch is reported rather than returned as an error so that
/// damaged pages can still be examined.
pub fn inspect_page(path: impl AsRef<Path>, alloc_size: u32, addr: Addr) -> Result<PageReport> {
    let mut file = PageFile::open(path.as_ref(), alloc_size)?;
    let (_, opts) = file.descriptor()?;
    let (header, size) = file.probe(addr, &opts)?;
    let bytes = file.read_page(addr, size)?;

    let computed = page::compute_checksum(&bytes);
    let checksum = ChecksumStatus {
        stored: header.checksum,
        computed,
        ok: computed == header.checksum,
    };

    let mut error = None;
    let items = match collect_items(&bytes, addr) {
        Ok(items) => items,
        Err(err) => {
            error = Some(err.to_string());
            Vec::new()
        }
    };
    let index = match PageView::load_unverified(&bytes, addr) {
        Ok(view) => Some(IndexSummary {
            entries: view.index().len(),
            records: view.records(),
            first_free: view.first_free(),
            space_avail: view.space_avail(),
        }),
        Err(err) => {
            if error.is_none() {
                error = Some(err.to_string());
            }
            None
        }
    };
    let overflow_preview = match header.kind {
        PageType::Overflow => page::overflow_data(&bytes).ok().map(hex_preview),
        _ => None,
    };

    Ok(PageReport {
        addr: addr.0,
        offset: file.unit().to_offset(addr)?,
        size,
        kind: header.kind.name(),
        level: header.level,
        lsn: header.lsn.to_string(),
        entries: header.entries().ok(),
        data_len: header.data_len().ok(),
        parent: header.parent.valid().map(|a| a.0),
        prev: header.prev.valid().map(|a| a.0),
        next: header.next.valid().map(|a| a.0),
        checksum,
        items,
        overflow_preview,
        index,
        error,
    })
}

fn collect_items(bytes: &[u8], addr: Addr) -> std::result::Result<Vec<ItemReport>, BtPageError> {
    ItemIter::for_page(bytes, addr)?
        .map(|item| item.map(|item| describe(&item)))
        .collect()
}

fn describe(item: &Item<'_>) -> ItemReport {
    let reference = match item.kind {
        ItemType::OffPage => item.offpage().ok().map(|r| {
            format!("records={} addr={} level={}", r.records, r.addr, r.level)
        }),
        kind if kind.is_overflow() => item
            .overflow()
            .ok()
            .map(|r| format!("len={} addr={}", r.len, r.addr)),
        _ => None,
    };
    ItemReport {
        offset: item.offset,
        kind: item.kind.name(),
        len: item.data.len(),
        preview: hex_preview(item.data),
        reference,
    }
}
