#![forbid(unsafe_code)]

mod addr;
mod frame;
mod meta;
mod options;

pub use addr::AllocUnit;
pub use frame::{Frame, FrameArena, FrameReadGuard, FrameWriteGuard, PageHandle};
pub use meta::{
    read_descriptor, write_descriptor, Descriptor, BTREE_MAGIC, DESC_LEN, MAJOR_VERSION,
    MINOR_VERSION,
};
pub use options::FormatOptions;
