use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::addr::AllocUnit;
use super::meta::{Descriptor, DESC_LEN};
use crate::storage::btree::page::{LEAF_LEVEL, PAGE_HDR_LEN};
use crate::types::{BtPageError, Result};

/// Format parameters fixed when a database file is created.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    /// Allocation unit size in bytes.
    pub alloc_size: u32,
    /// Leaf page size in bytes.
    pub leaf_page_size: u32,
    /// Internal page size in bytes.
    pub internal_page_size: u32,
    /// Extent size in bytes used when growing the file.
    pub extent_size: u32,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            alloc_size: 512,
            leaf_page_size: 8192,
            internal_page_size: 4096,
            extent_size: 64 * 1024,
        }
    }
}

impl FormatOptions {
    /// Sets the allocation unit size.
    pub fn alloc_size(mut self, bytes: u32) -> Self {
        self.alloc_size = bytes;
        self
    }

    /// Sets the leaf page size.
    pub fn leaf_page_size(mut self, bytes: u32) -> Self {
        self.leaf_page_size = bytes;
        self
    }

    /// Sets the internal page size.
    pub fn internal_page_size(mut self, bytes: u32) -> Self {
        self.internal_page_size = bytes;
        self
    }

    /// Sets the extent size.
    pub fn extent_size(mut self, bytes: u32) -> Self {
        self.extent_size = bytes;
        self
    }

    /// Rebuilds options for an opened file from its descriptor.
    pub fn from_descriptor(desc: &Descriptor, alloc_size: u32) -> Self {
        Self {
            alloc_size,
            leaf_page_size: desc.leaf_size,
            internal_page_size: desc.internal_size,
            ..Self::default()
        }
    }

    /// Parses options from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|_| BtPageError::Invalid("format options are not valid TOML"))
    }

    /// Loads options from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Checks the invariants every database open relies on.
    pub fn validate(&self) -> Result<AllocUnit> {
        let unit = AllocUnit::new(self.alloc_size)?;
        let multiple = |bytes: u32| bytes != 0 && bytes % self.alloc_size == 0;
        if !multiple(self.leaf_page_size) {
            return Err(BtPageError::Invalid(
                "leaf page size must be a multiple of the allocation unit",
            ));
        }
        if !multiple(self.internal_page_size) {
            return Err(BtPageError::Invalid(
                "internal page size must be a multiple of the allocation unit",
            ));
        }
        if !multiple(self.extent_size) {
            return Err(BtPageError::Invalid(
                "extent size must be a multiple of the allocation unit",
            ));
        }
        if (self.leaf_page_size as usize) < PAGE_HDR_LEN + DESC_LEN {
            return Err(BtPageError::Invalid("leaf page too small for the descriptor"));
        }
        Ok(unit)
    }

    /// Page size for a page at tree `level`.
    pub fn page_size_for(&self, level: u8) -> u32 {
        if level == LEAF_LEVEL {
            self.leaf_page_size
        } else {
            self.internal_page_size
        }
    }
}
