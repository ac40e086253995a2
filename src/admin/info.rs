use std::path::Path;

use serde::Serialize;

use crate::storage::btree::page;

use crate::admin::error::Result;
use crate::admin::util::{display_path, PageFile};
use crate::types::Addr;

/// Descriptor contents of a database file.
#[derive(Debug, Clone, Serialize)]
pub struct InfoReport {
    /// Path of the inspected file.
    pub path: String,
    /// Size of the file on disk.
    pub file_size: u64,
    /// Major format version.
    pub major: u16,
    /// Minor format version.
    pub minor: u16,
    /// Leaf page size in bytes.
    pub leaf_page_size: u32,
    /// Internal page size in bytes.
    pub internal_page_size: u32,
    /// Record number of the first record.
    pub base_recno: u64,
    /// Root page address, if any.
    pub root_addr: Option<u32>,
    /// Head of the free list, if any.
    pub free_addr: Option<u32>,
    /// Whether the first page is a leaf that passes checksum verification.
    pub first_page_ok: bool,
}

/// Reads the descriptor from the page at address 0.
pub fn info(path: impl AsRef<Path>, alloc_size: u32) -> Result<InfoReport> {
    let path = path.as_ref();
    let mut file = PageFile::open(path, alloc_size)?;
    let (desc, opts) = file.descriptor()?;
    let first_page_ok = file
        .read_page(Addr::FIRST_PAGE, opts.leaf_page_size)
        .map(|bytes| {
            page::verify_page(&bytes).is_ok_and(|header| page::is_first_leaf(&header))
        })
        .unwrap_or(false);

    Ok(InfoReport {
        path: display_path(path),
        file_size: file.len(),
        major: desc.major,
        minor: desc.minor,
        leaf_page_size: desc.leaf_size,
        internal_page_size: desc.internal_size,
        base_recno: desc.base_recno,
        root_addr: desc.root_addr.valid().map(|addr| addr.0),
        free_addr: desc.free_addr.valid().map(|addr| addr.0),
        first_page_ok,
    })
}
