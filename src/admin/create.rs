use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::primitives::pager::{Descriptor, FormatOptions};
use crate::storage::btree::page::LEAF_LEVEL;
use crate::storage::btree::{PageHeader, PageType, PageWriter};
use crate::types::Addr;

use crate::admin::error::{AdminError, Result};
use crate::admin::util::display_path;

/// Summary of a newly created database file.
#[derive(Debug, Clone, Serialize)]
pub struct CreateReport {
    /// Path of the created file.
    pub path: String,
    /// Allocation unit size in bytes.
    pub alloc_size: u32,
    /// Leaf page size recorded in the descriptor.
    pub leaf_page_size: u32,
    /// Internal page size recorded in the descriptor.
    pub internal_page_size: u32,
    /// Size of the file on disk.
    pub file_size: u64,
    /// Checksum of the first page.
    pub checksum: u32,
}

/// Creates a database file holding a single empty root leaf at address 0.
///
/// The descriptor records the page sizes from `opts`; the root is the first
/// page and the free list is empty. Existing files are never overwritten.
pub fn create(path: impl AsRef<Path>, opts: &FormatOptions) -> Result<CreateReport> {
    let path = path.as_ref();
    opts.validate()?;
    if path.exists() {
        return Err(AdminError::AlreadyExists(path.to_path_buf()));
    }

    let mut page = vec![0u8; opts.leaf_page_size as usize];
    let desc = Descriptor::new(opts.leaf_page_size, opts.internal_page_size);
    let header = PageWriter::new(
        &mut page,
        Addr::FIRST_PAGE,
        PageHeader::new(PageType::Leaf, LEAF_LEVEL),
    )?
    .with_descriptor(&desc)?
    .finish()?;

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(&page)?;
    file.sync_all()?;
    info!(path = %path.display(), %desc, "created database");

    Ok(CreateReport {
        path: display_path(path),
        alloc_size: opts.alloc_size,
        leaf_page_size: opts.leaf_page_size,
        internal_page_size: opts.internal_page_size,
        file_size: page.len() as u64,
        checksum: header.checksum,
    })
}
