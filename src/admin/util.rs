use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::primitives::pager::{read_descriptor, AllocUnit, Descriptor, FormatOptions, DESC_LEN};
use crate::storage::btree::page::PAGE_HDR_LEN;
use crate::storage::btree::{PageHeader, PageType};
use crate::types::{Addr, BtPageError};

use crate::admin::error::{AdminError, Result};

/// Number of payload bytes shown in hex previews.
pub(crate) const PREVIEW_LEN: usize = 16;

/// Read-only access to the pages of a btree file.
pub(crate) struct PageFile {
    file: File,
    len: u64,
    unit: AllocUnit,
}

impl PageFile {
    pub(crate) fn open(path: &Path, alloc_size: u32) -> Result<Self> {
        if !path.exists() {
            return Err(AdminError::missing_database(path));
        }
        let unit = AllocUnit::new(alloc_size)?;
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, len, unit })
    }

    pub(crate) fn len(&self) -> u64 {
        self.len
    }

    pub(crate) fn unit(&self) -> AllocUnit {
        self.unit
    }

    pub(crate) fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let end = offset
            .checked_add(len as u64)
            .ok_or(BtPageError::OutOfRange("read past the addressable range"))?;
        if end > self.len {
            return Err(BtPageError::OutOfRange("page extends past end of file").into());
        }
        let mut buf = vec![0u8; len];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Descriptor from the page at address 0, plus the format it implies.
    pub(crate) fn descriptor(&mut self) -> Result<(Descriptor, FormatOptions)> {
        let prefix = self.read_at(0, PAGE_HDR_LEN + DESC_LEN)?;
        let desc = read_descriptor(&prefix)?;
        let opts = FormatOptions::from_descriptor(&desc, self.unit.size());
        opts.validate()?;
        Ok((desc, opts))
    }

    /// Header of the page at `addr` and the page's size, which depends on
    /// the page type and tree level.
    pub(crate) fn probe(&mut self, addr: Addr, opts: &FormatOptions) -> Result<(PageHeader, u32)> {
        let offset = self.unit.to_offset(addr)?;
        let raw = self.read_at(offset, PAGE_HDR_LEN)?;
        let header = PageHeader::decode(&raw)?;
        let size = match header.kind {
            PageType::Overflow => self.unit.overflow_bytes(header.data_len()?)?,
            _ => opts.page_size_for(header.level),
        };
        Ok((header, size))
    }

    pub(crate) fn read_page(&mut self, addr: Addr, size: u32) -> Result<Vec<u8>> {
        let offset = self.unit.to_offset(addr)?;
        self.read_at(offset, size as usize)
    }
}

pub(crate) fn hex_preview(bytes: &[u8]) -> String {
    let shown = &bytes[..bytes.len().min(PREVIEW_LEN)];
    let mut out = hex::encode(shown);
    if bytes.len() > PREVIEW_LEN {
        out.push_str("..");
    }
    out
}

pub(crate) fn display_path(path: &Path) -> String {
    path.display().to_string()
}
