//! On-disk page and item encoding for a copy-on-write btree file.
//!
//! The crate decodes and encodes the fixed structures of a btree database
//! file (descriptor, page headers, items, and reference payloads), builds a
//! sorted in-memory index over a page, and ships a small inspection CLI.

#![warn(missing_docs)]

pub mod admin;
pub mod primitives;
pub mod storage;
pub mod types;

pub use primitives::pager::{AllocUnit, Descriptor, FormatOptions};
pub use storage::btree::{PageHeader, PageIndex, PageType, PageView, PageWriter};
pub use types::{Addr, BtPageError, Lsn, Result};
