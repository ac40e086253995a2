#![forbid(unsafe_code)]

//! On-page layout of btree pages: headers, items, references, and the
//! in-memory index built over a page's items.

/// Page header, page types, and checksums.
pub mod page;

/// Packed item headers and the item iterator.
pub mod item;

/// Off-page and overflow reference payloads.
pub mod refs;

/// Sorted in-memory index over a page's items.
pub mod index;
mod view;
mod writer;

pub use index::{flags, DataRef, DupSet, IndexEntry, PageIndex};
pub use item::{Item, ItemHeader, ItemIter, ItemType};
pub use page::{PageHeader, PageType};
pub use refs::{OffPageRef, OverflowRef};
pub use view::PageView;
pub use writer::{write_overflow_page, PageWriter};
